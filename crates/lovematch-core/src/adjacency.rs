//! Adjacency engine - scores a grid after every mutation.
//!
//! Each unordered pair of neighbouring, occupied cells is looked at once.
//! A couple only matches when both cells are still unmatched. Ex conflicts
//! count for every occupied pair, so a matched cell still fights an ex moved
//! next to it.
//!
//! Conflicts are charged once per *episode*. An episode opens the first time
//! an ex-pair is seen adjacent and closes on the first evaluation where it no
//! longer is; a later re-occurrence opens a new, chargeable episode.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::EntityId;
use crate::config::{EX_PENALTY, MATCH_REWARD};
use crate::generation::RoundRules;
use crate::grid::{CellId, Grid};

/// Unordered entity pair, stored smaller id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey(EntityId, EntityId);

impl PairKey {
    pub fn new(a: EntityId, b: EntityId) -> Self {
        if a <= b {
            PairKey(a, b)
        } else {
            PairKey(b, a)
        }
    }

    pub fn first(&self) -> EntityId {
        self.0
    }

    pub fn second(&self) -> EntityId {
        self.1
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.0 == id || self.1 == id
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.0, self.1)
    }
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Cells matched by this pass (not previously matched).
    pub newly_matched: BTreeSet<CellId>,
    /// Cells currently adjacent to an ex. A snapshot, not sticky.
    pub fighting: BTreeSet<CellId>,
    /// Ex-pairs currently adjacent.
    pub conflicts: BTreeSet<PairKey>,
    /// Conflicts that opened a new episode and were charged.
    pub newly_penalized: Vec<PairKey>,
    /// Episodes that were active and are no longer adjacent.
    pub ended_conflicts: Vec<PairKey>,
    pub score_delta: i32,
}

impl Evaluation {
    pub fn matched_pairs(&self) -> usize {
        self.newly_matched.len() / 2
    }
}

/// One continuous span of an ex-pair being adjacent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    /// Move count when the episode was charged.
    pub opened_at_move: u32,
}

/// Active conflict episodes keyed by pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEpisodes {
    active: BTreeMap<PairKey, Episode>,
}

impl ConflictEpisodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, key: &PairKey) -> bool {
        self.active.contains_key(key)
    }

    pub fn get(&self, key: &PairKey) -> Option<&Episode> {
        self.active.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PairKey> {
        self.active.keys()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Open episodes charged by `eval`, close the ones it ended.
    pub fn apply(&mut self, eval: &Evaluation, move_count: u32) {
        for key in &eval.ended_conflicts {
            self.active.remove(key);
        }
        for key in &eval.newly_penalized {
            self.active.insert(
                *key,
                Episode {
                    opened_at_move: move_count,
                },
            );
        }
    }
}

/// Score `grid` against the round's couples and ex-pairs.
///
/// Pure: the caller folds the result into its state (matched set, episodes,
/// score). Calling twice with the same inputs yields the same result.
pub fn evaluate(
    grid: &Grid,
    rules: &RoundRules,
    matched: &BTreeSet<CellId>,
    episodes: &ConflictEpisodes,
) -> Evaluation {
    let mut eval = Evaluation::default();
    let cells = grid.cells();

    for (a, b) in grid.adjacent_pairs() {
        let (Some(entity_a), Some(entity_b)) = (cells[a].entity(), cells[b].entity()) else {
            continue;
        };
        let (id_a, id_b) = (cells[a].id(), cells[b].id());
        let key = PairKey::new(entity_a, entity_b);
        let unmatched = !matched.contains(&id_a) && !matched.contains(&id_b);

        if unmatched
            && rules.is_couple(&key)
            && !eval.newly_matched.contains(&id_a)
            && !eval.newly_matched.contains(&id_b)
        {
            eval.newly_matched.insert(id_a);
            eval.newly_matched.insert(id_b);
            eval.score_delta += MATCH_REWARD;
        }

        if rules.is_ex_pair(&key) {
            eval.fighting.insert(id_a);
            eval.fighting.insert(id_b);
            eval.conflicts.insert(key);
        }
    }

    for key in &eval.conflicts {
        if !episodes.is_active(key) {
            eval.newly_penalized.push(*key);
            eval.score_delta -= EX_PENALTY;
        }
    }

    eval.ended_conflicts = episodes
        .keys()
        .filter(|key| !eval.conflicts.contains(*key))
        .copied()
        .collect();

    eval
}
