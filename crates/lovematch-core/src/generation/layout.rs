//! Initial layout - no couple and no ex-pair may start side by side.
//!
//! The primary strategy is rejection sampling over uniform shuffles, capped
//! at a fixed number of attempts. `spread_layout` is the constructive
//! fallback for dense rounds where random shuffles rarely succeed.

use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Reverse;

use super::RoundRules;
use crate::catalog::EntityId;
use crate::grid::{neighbors_of, Cell, CellId, Grid};

/// Layout generation failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Cell count is not a non-zero perfect square.
    NotSquare(usize),
    /// No valid shuffle found within the attempt cap.
    Exhausted { attempts: u32 },
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutError::NotSquare(n) => write!(f, "{} cells do not form a square grid", n),
            LayoutError::Exhausted { attempts } => {
                write!(f, "No valid layout found in {} attempts", attempts)
            }
        }
    }
}

impl std::error::Error for LayoutError {}

/// One cell per placed entity, padded with empties up to `grid_size`.
///
/// Cell ids are assigned in order and never change afterwards.
pub fn build_cells(placed: &[EntityId], grid_size: usize, revealed: bool) -> Vec<Cell> {
    (0..grid_size)
        .map(|i| {
            let id = CellId(i as u32);
            match placed.get(i) {
                Some(&entity) => Cell::Occupied {
                    id,
                    entity,
                    revealed,
                },
                None => Cell::Empty { id },
            }
        })
        .collect()
}

/// True when no couple and no ex-pair are adjacent.
pub fn is_valid_layout(grid: &Grid, rules: &RoundRules) -> bool {
    let cells = grid.cells();
    grid.adjacent_pairs().all(|(a, b)| {
        match (cells[a].entity(), cells[b].entity()) {
            (Some(x), Some(y)) => !rules.are_related(x, y),
            _ => true,
        }
    })
}

/// Shuffle until the layout is valid, giving up after `max_attempts`.
pub fn shuffle_layout(
    cells: Vec<Cell>,
    rules: &RoundRules,
    max_attempts: u32,
    rng: &mut impl Rng,
) -> Result<Grid, LayoutError> {
    let len = cells.len();
    let mut grid = Grid::new(cells).ok_or(LayoutError::NotSquare(len))?;

    for attempt in 1..=max_attempts {
        grid.shuffle(rng);
        if is_valid_layout(&grid, rules) {
            log::debug!("Layout found after {} attempt(s)", attempt);
            return Ok(grid);
        }
    }

    Err(LayoutError::Exhausted {
        attempts: max_attempts,
    })
}

/// Constructive placement that spreads related entities apart.
///
/// The most-related cells are placed first; each goes to the free position
/// with the fewest related neighbours already placed (ties broken randomly).
/// Not guaranteed valid: check with [`is_valid_layout`].
pub fn spread_layout(
    cells: Vec<Cell>,
    rules: &RoundRules,
    rng: &mut impl Rng,
) -> Result<Grid, LayoutError> {
    let len = cells.len();
    let width = Grid::new(cells.clone())
        .ok_or(LayoutError::NotSquare(len))?
        .width();

    let mut order = cells;
    order.shuffle(rng);
    order.sort_by_key(|cell| Reverse(cell.entity().map_or(0, |e| rules.relation_count(e))));

    let mut free: Vec<usize> = (0..len).collect();
    free.shuffle(rng);
    let mut slots: Vec<Option<Cell>> = vec![None; len];

    for cell in order {
        let clashes = |pos: usize| -> usize {
            let Some(entity) = cell.entity() else {
                return 0;
            };
            neighbors_of(pos, width, len)
                .into_iter()
                .filter_map(|n| slots[n].as_ref().and_then(Cell::entity))
                .filter(|&other| rules.are_related(entity, other))
                .count()
        };

        // min_by_key keeps the first minimum, so the shuffled order breaks ties
        let Some(slot) = (0..free.len()).min_by_key(|&i| clashes(free[i])) else {
            break;
        };
        let pos = free.swap_remove(slot);
        slots[pos] = Some(cell);
    }

    let placed: Vec<Cell> = slots.into_iter().flatten().collect();
    Grid::new(placed).ok_or(LayoutError::NotSquare(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjacency::PairKey;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ids(raw: &[u32]) -> Vec<EntityId> {
        raw.iter().map(|&id| EntityId(id)).collect()
    }

    fn rules() -> RoundRules {
        RoundRules::new(
            vec![
                PairKey::new(EntityId(1), EntityId(2)),
                PairKey::new(EntityId(3), EntityId(4)),
            ],
            vec![
                PairKey::new(EntityId(1), EntityId(5)),
                PairKey::new(EntityId(3), EntityId(6)),
                PairKey::new(EntityId(4), EntityId(7)),
            ],
        )
    }

    #[test]
    fn test_build_cells_pads_with_empty() {
        let cells = build_cells(&ids(&[1, 2, 3]), 4, true);
        assert_eq!(cells.len(), 4);
        assert!(cells[0].is_revealed());
        assert!(cells[3].is_empty());
        assert_eq!(cells[3].id(), CellId(3));
    }

    #[test]
    fn test_shuffle_layout_valid() {
        let rules = rules();
        let placed = ids(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let cells = build_cells(&placed, 16, false);
            let grid = shuffle_layout(cells, &rules, 10_000, &mut rng).unwrap();
            assert!(is_valid_layout(&grid, &rules));
            assert_eq!(grid.len(), 16);
        }
    }

    #[test]
    fn test_shuffle_layout_not_square() {
        let mut rng = StdRng::seed_from_u64(0);
        let cells = build_cells(&ids(&[1, 2]), 3, false);
        assert_eq!(
            shuffle_layout(cells, &rules(), 10, &mut rng),
            Err(LayoutError::NotSquare(3))
        );
    }

    #[test]
    fn test_impossible_layout_exhausts() {
        // In a 2x2 grid every cell touches two others; 1 is related to 2, 3 and 4
        let rules = RoundRules::new(
            vec![PairKey::new(EntityId(1), EntityId(2))],
            vec![
                PairKey::new(EntityId(1), EntityId(3)),
                PairKey::new(EntityId(1), EntityId(4)),
            ],
        );
        let mut rng = StdRng::seed_from_u64(9);
        let cells = build_cells(&ids(&[1, 2, 3, 4]), 4, false);
        assert_eq!(
            shuffle_layout(cells.clone(), &rules, 50, &mut rng),
            Err(LayoutError::Exhausted { attempts: 50 })
        );

        // The constructive fallback still produces a full grid
        let grid = spread_layout(cells, &rules, &mut rng).unwrap();
        assert_eq!(grid.cell_ids(), (0..4).map(CellId).collect::<Vec<_>>());
        assert!(!is_valid_layout(&grid, &rules));
    }

    #[test]
    fn test_spread_layout_keeps_every_cell() {
        let rules = rules();
        let placed = ids(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let cells = build_cells(&placed, 9, false);
            let grid = spread_layout(cells, &rules, &mut rng).unwrap();
            assert_eq!(grid.len(), 9);
            assert_eq!(grid.cell_ids(), (0..9).map(CellId).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_invalid_layout_detected() {
        let rules = rules();
        let cells = build_cells(&ids(&[1, 2, 8, 9]), 4, false);
        let grid = Grid::new(cells).unwrap();
        // 1 and 2 sit at positions 0 and 1
        assert!(!is_valid_layout(&grid, &rules));
    }
}
