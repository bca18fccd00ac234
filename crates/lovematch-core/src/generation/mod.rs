//! Generation - picking a round's entities and laying them out.

mod selector;
mod layout;

pub use selector::*;
pub use layout::*;

use std::collections::HashSet;

use crate::adjacency::PairKey;
use crate::catalog::EntityId;

/// The authoritative couples and ex-pairs of a round.
///
/// Layout validation and adjacency scoring only ever consult these lists,
/// never the catalog directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundRules {
    couples: Vec<PairKey>,
    ex_pairs: Vec<PairKey>,
    couple_set: HashSet<PairKey>,
    ex_set: HashSet<PairKey>,
}

impl RoundRules {
    pub fn new(couples: Vec<PairKey>, ex_pairs: Vec<PairKey>) -> Self {
        let couple_set = couples.iter().copied().collect();
        let ex_set = ex_pairs.iter().copied().collect();
        Self {
            couples,
            ex_pairs,
            couple_set,
            ex_set,
        }
    }

    pub fn couples(&self) -> &[PairKey] {
        &self.couples
    }

    pub fn ex_pairs(&self) -> &[PairKey] {
        &self.ex_pairs
    }

    pub fn couple_count(&self) -> usize {
        self.couples.len()
    }

    pub fn is_couple(&self, key: &PairKey) -> bool {
        self.couple_set.contains(key)
    }

    pub fn is_ex_pair(&self, key: &PairKey) -> bool {
        self.ex_set.contains(key)
    }

    /// Must these two entities be kept apart in the initial layout?
    pub fn are_related(&self, a: EntityId, b: EntityId) -> bool {
        let key = PairKey::new(a, b);
        self.is_couple(&key) || self.is_ex_pair(&key)
    }

    /// Number of couples and ex-pairs `entity` takes part in.
    pub fn relation_count(&self, entity: EntityId) -> usize {
        self.couples
            .iter()
            .chain(self.ex_pairs.iter())
            .filter(|key| key.contains(entity))
            .count()
    }
}

impl From<&Selection> for RoundRules {
    fn from(selection: &Selection) -> Self {
        RoundRules::new(selection.couples.clone(), selection.ex_pairs.clone())
    }
}
