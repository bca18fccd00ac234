//! Grid - square board of cells with 4-neighbour adjacency.
//!
//! Positions are row-major indices. Neighbours never wrap across row
//! boundaries. Cells carry a `CellId` that survives swaps, so matched sets and
//! drag tracking refer to cells rather than positions.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::catalog::EntityId;
use crate::config::{integer_sqrt, SwapMode};

/// Identity of a cell, independent of where it sits on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub u32);

/// A grid slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Occupied {
        id: CellId,
        entity: EntityId,
        /// Name visible to the player.
        revealed: bool,
    },
    Empty {
        id: CellId,
    },
}

impl Cell {
    pub fn id(&self) -> CellId {
        match self {
            Cell::Occupied { id, .. } | Cell::Empty { id } => *id,
        }
    }

    pub fn entity(&self) -> Option<EntityId> {
        match self {
            Cell::Occupied { entity, .. } => Some(*entity),
            Cell::Empty { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty { .. })
    }

    pub fn is_revealed(&self) -> bool {
        matches!(self, Cell::Occupied { revealed: true, .. })
    }
}

/// Square grid of cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Build a grid. Returns `None` unless the cell count is a non-zero perfect square.
    pub fn new(cells: Vec<Cell>) -> Option<Self> {
        let width = integer_sqrt(cells.len());
        if width == 0 || width * width != cells.len() {
            return None;
        }
        Some(Self { width, cells })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn get(&self, pos: usize) -> Option<&Cell> {
        self.cells.get(pos)
    }

    /// In-bounds neighbours of `pos`: left, right, up, down.
    pub fn neighbors(&self, pos: usize) -> Vec<usize> {
        neighbors_of(pos, self.width, self.cells.len())
    }

    pub fn are_adjacent(&self, a: usize, b: usize) -> bool {
        self.neighbors(a).contains(&b)
    }

    /// Every unordered adjacent position pair `(a, b)` with `a < b`, once.
    pub fn adjacent_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let w = self.width;
        let n = self.cells.len();
        (0..n).flat_map(move |pos| {
            let right = (pos % w + 1 < w).then_some((pos, pos + 1));
            let down = (pos + w < n).then_some((pos, pos + w));
            right.into_iter().chain(down)
        })
    }

    pub fn position_of(&self, id: CellId) -> Option<usize> {
        self.cells.iter().position(|c| c.id() == id)
    }

    /// Exchange two positions. Out-of-bounds positions are ignored.
    pub fn swap(&mut self, a: usize, b: usize) {
        if a < self.cells.len() && b < self.cells.len() {
            self.cells.swap(a, b);
        }
    }

    /// Uniformly random permutation of all cells.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cells.shuffle(rng);
    }

    /// Sorted cell ids; constant across swaps.
    pub fn cell_ids(&self) -> Vec<CellId> {
        let mut ids: Vec<CellId> = self.cells.iter().map(Cell::id).collect();
        ids.sort();
        ids
    }

    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_empty()).count()
    }

    /// Mark the given cells' names as visible.
    pub fn set_revealed<'a>(&mut self, ids: impl IntoIterator<Item = &'a CellId>) {
        let ids: BTreeSet<CellId> = ids.into_iter().copied().collect();
        for cell in &mut self.cells {
            if let Cell::Occupied { id, revealed, .. } = cell {
                if ids.contains(id) {
                    *revealed = true;
                }
            }
        }
    }

    /// Can any swap still be made?
    ///
    /// A swap needs two distinct positions, neither holding a matched cell,
    /// and not both empty.
    pub fn has_legal_swap(&self, matched: &BTreeSet<CellId>, mode: SwapMode) -> bool {
        let movable = |pos: usize| !matched.contains(&self.cells[pos].id());
        let useful = |a: usize, b: usize| !(self.cells[a].is_empty() && self.cells[b].is_empty());

        match mode {
            SwapMode::Adjacent => self
                .adjacent_pairs()
                .any(|(a, b)| movable(a) && movable(b) && useful(a, b)),
            SwapMode::Anywhere => {
                let free: Vec<usize> = (0..self.cells.len()).filter(|&p| movable(p)).collect();
                free.len() >= 2 && free.iter().any(|&p| !self.cells[p].is_empty())
            }
        }
    }
}

/// Neighbours of `pos` in a row-major grid of `len` cells, `width` wide.
pub fn neighbors_of(pos: usize, width: usize, len: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(4);
    if pos >= len || width == 0 {
        return out;
    }
    let col = pos % width;
    if col > 0 {
        out.push(pos - 1);
    }
    if col + 1 < width {
        out.push(pos + 1);
    }
    if pos >= width {
        out.push(pos - width);
    }
    if pos + width < len {
        out.push(pos + width);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_of(n: usize) -> Grid {
        let cells = (0..n as u32)
            .map(|i| Cell::Occupied {
                id: CellId(i),
                entity: EntityId(i + 1),
                revealed: false,
            })
            .collect();
        Grid::new(cells).unwrap()
    }

    #[test]
    fn test_rejects_non_square() {
        let cells = (0..15).map(|i| Cell::Empty { id: CellId(i) }).collect();
        assert!(Grid::new(cells).is_none());
        assert!(Grid::new(Vec::new()).is_none());
    }

    #[test]
    fn test_neighbors_no_wraparound() {
        let grid = grid_of(16);
        // Left edge has no left neighbour
        assert_eq!(grid.neighbors(4), vec![5, 0, 8]);
        // Right edge has no right neighbour
        assert_eq!(grid.neighbors(3), vec![2, 7]);
        // Corner
        assert_eq!(grid.neighbors(15), vec![14, 11]);
        // Interior
        assert_eq!(grid.neighbors(5), vec![4, 6, 1, 9]);
        assert!(!grid.are_adjacent(3, 4));
        assert!(grid.neighbors(16).is_empty());
    }

    #[test]
    fn test_adjacent_pairs_count() {
        // 2 * w * (w - 1) edges in a w x w grid
        assert_eq!(grid_of(16).adjacent_pairs().count(), 24);
        assert_eq!(grid_of(9).adjacent_pairs().count(), 12);
        assert_eq!(grid_of(1).adjacent_pairs().count(), 0);
        assert!(grid_of(16).adjacent_pairs().all(|(a, b)| a < b));
    }

    #[test]
    fn test_swap_preserves_cell_ids() {
        let mut grid = grid_of(9);
        let before = grid.cell_ids();
        grid.swap(0, 8);
        grid.swap(4, 5);
        assert_eq!(grid.cell_ids(), before);
        assert_eq!(grid.position_of(CellId(0)), Some(8));
        assert_eq!(grid.position_of(CellId(8)), Some(0));
    }

    #[test]
    fn test_set_revealed() {
        let mut grid = grid_of(4);
        grid.set_revealed(&[CellId(1), CellId(2)]);
        assert!(!grid.cells()[0].is_revealed());
        assert!(grid.cells()[1].is_revealed());
        assert!(grid.cells()[2].is_revealed());
    }

    #[test]
    fn test_has_legal_swap() {
        let grid = grid_of(4);
        let mut matched = BTreeSet::new();
        assert!(grid.has_legal_swap(&matched, SwapMode::Adjacent));

        // Only cells 0 and 3 free: diagonal, not adjacent
        matched.insert(CellId(1));
        matched.insert(CellId(2));
        assert!(!grid.has_legal_swap(&matched, SwapMode::Adjacent));
        assert!(grid.has_legal_swap(&matched, SwapMode::Anywhere));

        matched.insert(CellId(3));
        assert!(!grid.has_legal_swap(&matched, SwapMode::Anywhere));
    }

    #[test]
    fn test_two_empties_are_not_a_move() {
        let cells = vec![
            Cell::Empty { id: CellId(0) },
            Cell::Empty { id: CellId(1) },
            Cell::Occupied {
                id: CellId(2),
                entity: EntityId(1),
                revealed: false,
            },
            Cell::Occupied {
                id: CellId(3),
                entity: EntityId(2),
                revealed: false,
            },
        ];
        let grid = Grid::new(cells).unwrap();
        let matched: BTreeSet<CellId> = [CellId(2), CellId(3)].into_iter().collect();
        assert!(!grid.has_legal_swap(&matched, SwapMode::Adjacent));
        assert!(!grid.has_legal_swap(&matched, SwapMode::Anywhere));
    }
}
