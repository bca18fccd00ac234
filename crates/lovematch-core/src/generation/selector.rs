//! Entity selection for a round.
//!
//! Greedy and best-effort: couples are drawn in random order and accepted
//! while they (plus all of their exes) still fit on the grid. Every accepted
//! couple has to bring at least one ex along, so each round has something to
//! avoid as well as something to match. The rest of the grid is filled with
//! random leftovers.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::adjacency::PairKey;
use crate::catalog::{Catalog, Entity, EntityId};

/// Entities chosen for a round plus the relationships realized among them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Placed entities, at most `grid_size` of them.
    pub placed: Vec<EntityId>,
    /// Every couple with both members placed.
    pub couples: Vec<PairKey>,
    /// Every ex relationship with both ends placed.
    pub ex_pairs: Vec<PairKey>,
    /// Couples picked deliberately by the greedy pass.
    pub seeded_couples: usize,
}

/// Pick entities for a grid of `grid_size` cells with up to `target_couples` couples.
pub fn select_entities(
    catalog: &Catalog,
    grid_size: usize,
    target_couples: usize,
    rng: &mut impl Rng,
) -> Selection {
    let mut candidates: Vec<&Entity> = catalog
        .iter()
        .filter(|e| catalog.partner_of(e).is_some() && catalog.resolvable_exes(e).next().is_some())
        .collect();
    candidates.shuffle(rng);

    let mut placed: Vec<EntityId> = Vec::with_capacity(grid_size);
    let mut placed_set: HashSet<EntityId> = HashSet::with_capacity(grid_size);
    let mut seeded: Vec<PairKey> = Vec::new();

    while seeded.len() < target_couples {
        let Some(candidate) = candidates.pop() else {
            break;
        };
        let Some(group) = couple_group(catalog, candidate) else {
            continue;
        };
        let couple = PairKey::new(group[0], group[1]);
        if seeded.contains(&couple) {
            continue;
        }

        let new_members = group.iter().filter(|id| !placed_set.contains(*id)).count();
        if placed.len() + new_members > grid_size {
            continue;
        }

        for id in group {
            if placed_set.insert(id) {
                placed.push(id);
            }
        }
        seeded.push(couple);
    }

    if seeded.len() < target_couples {
        log::debug!(
            "Selected {} of {} requested couples for a grid of {}",
            seeded.len(),
            target_couples,
            grid_size
        );
    }

    // Fill the rest of the grid with random leftovers
    let mut fillers: Vec<EntityId> = catalog
        .iter()
        .map(|e| e.id)
        .filter(|id| !placed_set.contains(id))
        .collect();
    fillers.shuffle(rng);
    let room = grid_size.saturating_sub(placed.len());
    placed.extend(fillers.into_iter().take(room));

    let (couples, ex_pairs) = realized_relationships(catalog, &placed);

    Selection {
        placed,
        couples,
        ex_pairs,
        seeded_couples: seeded.len(),
    }
}

/// `[candidate, partner, exes...]`, or `None` if the couple brings no ex.
fn couple_group(catalog: &Catalog, candidate: &Entity) -> Option<Vec<EntityId>> {
    let partner_id = catalog.partner_of(candidate)?;
    let partner = catalog.get(partner_id)?;

    let mut group = vec![candidate.id, partner_id];
    for ex in catalog
        .resolvable_exes(candidate)
        .chain(catalog.resolvable_exes(partner))
    {
        if !group.contains(&ex) {
            group.push(ex);
        }
    }

    (group.len() > 2).then_some(group)
}

/// Every couple and ex-pair with both ends in `placed`.
///
/// Leftover fillers can complete relationships nobody selected on purpose,
/// so this is recomputed over the final set rather than tracked greedily.
/// A pair that is both a couple and an ex counts as a couple.
pub fn realized_relationships(
    catalog: &Catalog,
    placed: &[EntityId],
) -> (Vec<PairKey>, Vec<PairKey>) {
    let on_grid: HashSet<EntityId> = placed.iter().copied().collect();
    let mut couples = Vec::new();
    let mut seen_couples = HashSet::new();
    let mut ex_pairs = Vec::new();
    let mut seen_exes = HashSet::new();

    for entity in placed.iter().filter_map(|&id| catalog.get(id)) {
        if let Some(partner) = catalog.partner_of(entity).filter(|p| on_grid.contains(p)) {
            let key = PairKey::new(entity.id, partner);
            if seen_couples.insert(key) {
                couples.push(key);
            }
        }
    }

    for entity in placed.iter().filter_map(|&id| catalog.get(id)) {
        for ex in catalog.resolvable_exes(entity).filter(|ex| on_grid.contains(ex)) {
            let key = PairKey::new(entity.id, ex);
            if !seen_couples.contains(&key) && seen_exes.insert(key) {
                ex_pairs.push(key);
            }
        }
    }

    (couples, ex_pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Language;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_catalog() -> Catalog {
        Catalog::from_entities(vec![
            // Couple 1-2, 1 has ex 3
            Entity::new(1, "A").with_partner(2).with_exes(&[3]),
            Entity::new(2, "B").with_partner(1),
            Entity::new(3, "C"),
            // Couple 4-5 with no exes: never a candidate
            Entity::new(4, "D").with_partner(5),
            Entity::new(5, "E").with_partner(4),
            // Couple 6-7, exes 8 and 9 on both sides
            Entity::new(6, "F").with_partner(7).with_exes(&[8]),
            Entity::new(7, "G").with_partner(6).with_exes(&[9]),
            Entity::new(8, "H"),
            Entity::new(9, "I"),
            Entity::new(10, "J"),
        ])
        .unwrap()
    }

    #[test]
    fn test_selection_fills_grid() {
        let catalog = small_catalog();
        let mut rng = StdRng::seed_from_u64(1);
        let selection = select_entities(&catalog, 9, 2, &mut rng);

        assert_eq!(selection.placed.len(), 9);
        assert_eq!(selection.seeded_couples, 2);
        let unique: HashSet<_> = selection.placed.iter().collect();
        assert_eq!(unique.len(), 9);
    }

    #[test]
    fn test_couples_bring_their_exes() {
        let catalog = small_catalog();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection = select_entities(&catalog, 4, 1, &mut rng);
            assert_eq!(selection.seeded_couples, 1);
            assert!(!selection.ex_pairs.is_empty());
            for key in &selection.ex_pairs {
                assert!(selection.placed.contains(&key.first()));
                assert!(selection.placed.contains(&key.second()));
            }
        }
    }

    #[test]
    fn test_capacity_respected() {
        let catalog = small_catalog();
        // Couple 6-7 needs 4 slots, couple 1-2 needs 3: only one fits in 4
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection = select_entities(&catalog, 4, 2, &mut rng);
            assert_eq!(selection.seeded_couples, 1);
            assert!(selection.placed.len() <= 4);
        }
    }

    #[test]
    fn test_pads_when_catalog_small() {
        let catalog = small_catalog();
        let mut rng = StdRng::seed_from_u64(3);
        let selection = select_entities(&catalog, 16, 4, &mut rng);
        // Only two candidate couples exist; every entity gets placed
        assert_eq!(selection.seeded_couples, 2);
        assert_eq!(selection.placed.len(), 10);
    }

    #[test]
    fn test_fillers_can_complete_couples() {
        let catalog = small_catalog();
        let mut rng = StdRng::seed_from_u64(5);
        let selection = select_entities(&catalog, 16, 0, &mut rng);
        // No seeded couples, but 1-2, 4-5 and 6-7 all end up on the grid
        assert_eq!(selection.seeded_couples, 0);
        assert_eq!(selection.couples.len(), 3);
        assert_eq!(selection.ex_pairs.len(), 3);
    }

    #[test]
    fn test_realized_relationships_dedup() {
        let catalog = small_catalog();
        let placed: Vec<EntityId> = [2, 1, 3].into_iter().map(EntityId).collect();
        let (couples, exes) = realized_relationships(&catalog, &placed);
        assert_eq!(couples, vec![PairKey::new(EntityId(1), EntityId(2))]);
        assert_eq!(exes, vec![PairKey::new(EntityId(1), EntityId(3))]);
    }

    #[test]
    fn test_bundled_catalog_selection() {
        let catalog = Catalog::bundled(Language::En).unwrap();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection = select_entities(&catalog, 16, 4, &mut rng);
            assert_eq!(selection.placed.len(), 16);
            assert!(selection.seeded_couples >= 1);
            assert!(selection.couples.len() >= selection.seeded_couples);
        }
    }
}
