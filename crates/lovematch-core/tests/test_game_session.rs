//! Integration tests for full rounds against the bundled catalog.
//!
//! Exercises: Catalog → selection → layout → GameSession → swaps/undo
//! → terminal status → Leaderboard
//!
//! Seeded loops stand in for property tests.

use std::collections::{BTreeMap, BTreeSet};

use lovematch_core::adjacency::evaluate;
use lovematch_core::generation::is_valid_layout;
use lovematch_core::persistence::Leaderboard;
use lovematch_core::prelude::*;
use lovematch_core::session::{MoveRejection, UndoRejection};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ── Helpers ────────────────────────────────────────────────────────────

fn bundled() -> Catalog {
    Catalog::bundled(Language::En).expect("bundled catalog parses")
}

const DIFFICULTIES: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard];

/// Position of every matched cell.
fn matched_positions(session: &GameSession) -> BTreeMap<CellId, usize> {
    session
        .matched()
        .iter()
        .map(|&id| (id, session.grid().position_of(id).unwrap()))
        .collect()
}

/// A random neighbour pair of positions.
fn random_adjacent(grid: &Grid, rng: &mut impl Rng) -> (usize, usize) {
    let pos = rng.gen_range(0..grid.len());
    let neighbors = grid.neighbors(pos);
    (pos, neighbors[rng.gen_range(0..neighbors.len())])
}

// ── Setup ──────────────────────────────────────────────────────────────

#[test]
fn initial_rounds_start_clean() {
    let catalog = bundled();
    for difficulty in DIFFICULTIES {
        for seed in 0..30 {
            let config = GameConfig::for_difficulty(difficulty).with_seed(seed);
            let session = GameSession::setup(&catalog, config.clone()).unwrap();

            assert_eq!(session.grid().len(), config.grid_size);
            assert!(is_valid_layout(session.grid(), session.rules()));
            assert!(session.matched().is_empty());
            assert!(session.fighting().is_empty());
            assert!(session.episodes().is_empty());
            assert_eq!(session.score(), 0);
            assert_eq!(session.move_count(), 0);
            assert_eq!(session.status(), TerminalStatus::Ongoing);
            assert!(session.has_puzzle());

            let fresh = evaluate(
                session.grid(),
                session.rules(),
                &BTreeSet::new(),
                &ConflictEpisodes::new(),
            );
            assert!(fresh.newly_matched.is_empty());
            assert!(fresh.fighting.is_empty());
        }
    }
}

#[test]
fn relationships_are_among_placed_entities() {
    let catalog = bundled();
    for seed in 0..30 {
        let session = GameSession::setup(&catalog, GameConfig::default().with_seed(seed)).unwrap();
        let placed: BTreeSet<EntityId> = session.placed().iter().copied().collect();
        assert_eq!(placed.len(), session.placed().len());

        for key in session.couples().iter().chain(session.ex_pairs()) {
            assert!(placed.contains(&key.first()));
            assert!(placed.contains(&key.second()));
        }
        for key in session.ex_pairs() {
            assert!(!session.rules().is_couple(key));
        }
    }
}

#[test]
fn names_hidden_only_on_hard() {
    let catalog = bundled();
    for difficulty in DIFFICULTIES {
        let session =
            GameSession::setup(&catalog, GameConfig::for_difficulty(difficulty).with_seed(3))
                .unwrap();
        let any_revealed = session.grid().cells().iter().any(Cell::is_revealed);
        assert_eq!(any_revealed, difficulty.show_names());
        assert_eq!(
            session.visible_couple_hints().len() == session.couples().len(),
            difficulty.hints_unlocked()
        );
    }
}

#[test]
fn filler_only_catalog_has_no_puzzle() {
    let fillers = (1..=20).map(|i| Entity::new(i, format!("F{}", i))).collect();
    let catalog = Catalog::from_entities(fillers).unwrap();
    let mut session = GameSession::setup(&catalog, GameConfig::default().with_seed(1)).unwrap();
    assert!(!session.has_puzzle());
    assert_eq!(session.status(), TerminalStatus::Stuck);
    assert_eq!(session.swap(0, 1), Err(MoveRejection::GameOver));
}

#[test]
fn small_catalog_pads_with_empty_cells() {
    let catalog = Catalog::from_entities(vec![
        Entity::new(1, "A").with_partner(2).with_exes(&[3]),
        Entity::new(2, "B").with_partner(1),
        Entity::new(3, "C"),
        Entity::new(4, "D"),
        Entity::new(5, "E"),
    ])
    .unwrap();
    let config = GameConfig {
        grid_size: 9,
        couple_count: 1,
        ..Default::default()
    };
    for seed in 0..20 {
        let session = GameSession::setup(&catalog, config.clone().with_seed(seed)).unwrap();
        assert_eq!(session.grid().empty_count(), 4);
        assert_eq!(session.couples().len(), 1);
        assert!(is_valid_layout(session.grid(), session.rules()));
    }
}

#[test]
fn impossible_layout_falls_back_without_scoring() {
    // In a 2x2 grid A has two neighbours but three relatives
    let catalog = Catalog::from_entities(vec![
        Entity::new(1, "A").with_partner(2).with_exes(&[3, 4]),
        Entity::new(2, "B").with_partner(1),
        Entity::new(3, "C"),
        Entity::new(4, "D"),
    ])
    .unwrap();
    let config = GameConfig {
        grid_size: 4,
        couple_count: 1,
        layout_attempts: 25,
        ..Default::default()
    };
    for seed in 0..10 {
        let session = GameSession::setup(&catalog, config.clone().with_seed(seed)).unwrap();
        assert_eq!(session.grid().len(), 4);
        assert_eq!(session.score(), 0);
        assert!(!is_valid_layout(session.grid(), session.rules()));
    }
}

// ── Play ───────────────────────────────────────────────────────────────

#[test]
fn random_play_keeps_invariants() {
    let catalog = bundled();
    for seed in 0..40 {
        let config = GameConfig::default().with_seed(seed);
        let mut session = GameSession::setup(&catalog, config).unwrap();
        let mut rng = StdRng::seed_from_u64(seed + 1000);
        let cell_ids = session.grid().cell_ids();
        let mut frozen = matched_positions(&session);
        let mut expected_score = 0;

        for _ in 0..400 {
            if session.status().is_terminal() {
                break;
            }
            let (a, b) = random_adjacent(session.grid(), &mut rng);
            let before_moves = session.move_count();
            match session.swap(a, b) {
                Ok(report) => {
                    expected_score += report.evaluation.score_delta;
                    assert_eq!(session.move_count(), before_moves + 1);
                }
                Err(_) => assert_eq!(session.move_count(), before_moves),
            }

            // Swaps permute cells, never create or destroy them
            assert_eq!(session.grid().cell_ids(), cell_ids);
            assert_eq!(session.score(), expected_score);

            // Matched cells stay matched and never move
            let now = matched_positions(&session);
            for (id, pos) in &frozen {
                assert_eq!(now.get(id), Some(pos));
            }
            frozen = now;

            // Re-evaluating the unchanged grid changes nothing
            let again = evaluate(
                session.grid(),
                session.rules(),
                session.matched(),
                session.episodes(),
            );
            assert_eq!(again.score_delta, 0);
            assert!(again.newly_matched.is_empty());
            assert_eq!(&again.fighting, session.fighting());
        }
    }
}

#[test]
fn swap_then_undo_restores_grid() {
    let catalog = bundled();
    let mut checked = 0;
    for seed in 0..40 {
        let mut session =
            GameSession::setup(&catalog, GameConfig::default().with_seed(seed)).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let before = session.grid().clone();
        let (a, b) = random_adjacent(session.grid(), &mut rng);

        if session.swap(a, b).is_err() {
            continue;
        }
        if session.matched().is_empty() {
            session.undo().unwrap();
            assert_eq!(session.grid(), &before);
            assert_eq!(session.move_count(), 0);
            checked += 1;
        } else if session.status() != TerminalStatus::Won {
            // The new match involves a moved cell
            assert_eq!(session.undo(), Err(UndoRejection::WouldMoveMatched));
        }
    }
    assert!(checked > 0);
}

#[test]
fn frozen_cells_reject_swaps() {
    let catalog = bundled();
    for seed in 0..20 {
        let mut session =
            GameSession::setup(&catalog, GameConfig::default().with_seed(seed)).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);

        // Play until something matches
        for _ in 0..2000 {
            if !session.matched().is_empty() || session.status().is_terminal() {
                break;
            }
            let (a, b) = random_adjacent(session.grid(), &mut rng);
            let _ = session.swap(a, b);
        }
        let Some(&id) = session.matched().iter().next() else {
            continue;
        };
        if session.status().is_terminal() {
            continue;
        }

        let pos = session.grid().position_of(id).unwrap();
        let grid = session.grid().clone();
        let moves = session.move_count();
        for neighbor in grid.neighbors(pos) {
            assert!(session.swap(pos, neighbor).is_err());
            assert!(session.swap(neighbor, pos).is_err());
        }
        assert_eq!(session.grid(), &grid);
        assert_eq!(session.move_count(), moves);
    }
}

// ── Outcomes ───────────────────────────────────────────────────────────

#[test]
fn finished_rounds_reach_the_leaderboard() {
    let catalog = bundled();
    let mut board = Leaderboard::new(5);
    let mut finished = 0;

    for seed in 0..30 {
        let config = GameConfig {
            swap_mode: SwapMode::Anywhere,
            ..GameConfig::for_difficulty(Difficulty::Easy)
        }
        .with_seed(seed);
        let mut session = GameSession::setup(&catalog, config).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);

        for _ in 0..3000 {
            if session.status().is_terminal() {
                break;
            }
            let a = rng.gen_range(0..session.grid().len());
            let b = rng.gen_range(0..session.grid().len());
            let _ = session.swap(a, b);
        }

        for key in session.couples() {
            let both = [key.first(), key.second()]
                .iter()
                .all(|&e| session.cell_of(e).is_some_and(|c| session.matched().contains(&c)));
            if session.status() == TerminalStatus::Won {
                assert!(both);
            }
        }

        if let Some(summary) = session.record_result("sim", &mut board) {
            assert_eq!(summary.couples_total, session.couples().len());
            assert!(summary.status.is_terminal());
            finished += 1;
        }
    }

    assert!(finished > 0);
    assert!(board.len() <= 5);
    let scores: Vec<i32> = board.entries().iter().map(|e| e.score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}
