//! Love Match Headless Harness
//!
//! Validates the catalog, round generation and scoring end to end.
//! Runs entirely in-process, no UI.
//!
//! Usage:
//!   cargo run -p lovematch-simtest
//!   cargo run -p lovematch-simtest -- --verbose
//!   cargo run -p lovematch-simtest -- --json

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashSet};

use lovematch_core::adjacency::{evaluate, ConflictEpisodes, PairKey};
use lovematch_core::catalog::{Catalog, Entity, EntityId, Language};
use lovematch_core::config::{
    validate_config, Difficulty, GameConfig, SwapMode, EX_PENALTY, MATCH_REWARD,
};
use lovematch_core::generation::{
    build_cells, is_valid_layout, select_entities, shuffle_layout, spread_layout, RoundRules,
};
use lovematch_core::grid::{Cell, CellId, Grid};
use lovematch_core::persistence::{Leaderboard, RoundSummary, ScoreSink};
use lovematch_core::session::{GameSession, MoveRejection, TerminalStatus};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// ── Catalog (same JSON the core bundles) ────────────────────────────────
const CATALOG_JSON: &str = include_str!("../../../data/celebrities.json");

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct RawRecord {
    id: u32,
    name: serde_json::Value,
    image: String,
    #[serde(default)]
    partner: Option<serde_json::Value>,
    #[serde(default)]
    exes: Vec<serde_json::Value>,
}

const DIFFICULTIES: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard];

// ── Test harness ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

#[derive(Serialize)]
struct Report<'a> {
    passed: usize,
    failed: usize,
    results: &'a [TestResult],
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    let json = std::env::args().any(|a| a == "--json");
    println!("=== Love Match Harness ===\n");

    let catalog = match Catalog::bundled(Language::En) {
        Ok(c) => c,
        Err(e) => {
            println!("  ✗ catalog_load: {}", e);
            std::process::exit(1);
        }
    };

    let mut results = Vec::new();

    // 1. Raw data and catalog resolution
    results.extend(validate_catalog(&catalog, verbose));

    // 2. Selection sweep
    results.extend(validate_selection(&catalog, verbose));

    // 3. Layout sweep
    results.extend(validate_layout(&catalog, verbose));

    // 4. Adjacency scenarios
    results.extend(validate_adjacency(verbose));

    // 5. Random play
    results.extend(validate_play(&catalog, verbose));

    // 6. Leaderboard
    results.extend(validate_leaderboard(&catalog, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if json {
        let report = Report {
            passed,
            failed,
            results: &results,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => println!("JSON report failed: {}", e),
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Catalog ──────────────────────────────────────────────────────────

fn validate_catalog(catalog: &Catalog, verbose: bool) -> Vec<TestResult> {
    println!("--- Catalog ---");
    let mut results = Vec::new();

    let raw: Vec<RawRecord> = match serde_json::from_str(CATALOG_JSON) {
        Ok(r) => r,
        Err(e) => {
            results.push(TestResult {
                name: "catalog_parse".into(),
                passed: false,
                detail: format!("JSON parse error: {}", e),
            });
            return results;
        }
    };

    results.push(TestResult {
        name: "catalog_loaded".into(),
        passed: catalog.len() == raw.len() && catalog.len() >= 50,
        detail: format!("{} records, {} entities", raw.len(), catalog.len()),
    });

    let ids: HashSet<u32> = raw.iter().map(|r| r.id).collect();
    results.push(TestResult {
        name: "catalog_unique_ids".into(),
        passed: ids.len() == raw.len(),
        detail: format!("{} unique ids", ids.len()),
    });

    let missing_images = raw.iter().filter(|r| r.image.is_empty()).count();
    results.push(TestResult {
        name: "catalog_images".into(),
        passed: missing_images == 0,
        detail: format!("{} records without an image", missing_images),
    });

    // Partners should point back
    let one_sided: Vec<String> = catalog
        .iter()
        .filter(|e| {
            catalog
                .partner_of(e)
                .and_then(|p| catalog.get(p))
                .is_some_and(|p| catalog.partner_of(p) != Some(e.id))
        })
        .map(|e| e.name.clone())
        .collect();
    results.push(TestResult {
        name: "catalog_partners_mutual".into(),
        passed: one_sided.is_empty(),
        detail: if one_sided.is_empty() {
            "every resolvable partner is mutual".into()
        } else {
            format!("one-sided: {}", one_sided.join(", "))
        },
    });

    let candidates = catalog
        .iter()
        .filter(|e| catalog.partner_of(e).is_some() && catalog.resolvable_exes(e).next().is_some())
        .count();
    let fillers = catalog.iter().filter(|e| e.is_filler()).count();
    results.push(TestResult {
        name: "catalog_enough_candidates".into(),
        passed: candidates >= 10,
        detail: format!("{} candidate couples, {} fillers", candidates, fillers),
    });

    let russian = Catalog::from_json(CATALOG_JSON, Language::Ru);
    let same_shape = russian.as_ref().is_ok_and(|ru| {
        ru.len() == catalog.len()
            && ru.iter().zip(catalog.iter()).all(|(a, b)| {
                a.id == b.id && a.partner == b.partner && a.exes == b.exes
            })
    });
    results.push(TestResult {
        name: "catalog_language_independent".into(),
        passed: same_shape,
        detail: "relationships identical in every language".into(),
    });

    if verbose {
        println!("  {} entities, {} candidate couples", catalog.len(), candidates);
        for entity in catalog.iter().take(3) {
            let partner = catalog
                .partner_of(entity)
                .map_or_else(|| "-".to_string(), |p| catalog.display_name(p));
            println!("  {} + {}", entity.name, partner);
        }
    }

    results
}

// ── 2. Selection ────────────────────────────────────────────────────────

fn validate_selection(catalog: &Catalog, verbose: bool) -> Vec<TestResult> {
    println!("--- Selection Sweep ---");
    let mut results = Vec::new();
    let seeds = 200u64;

    for difficulty in DIFFICULTIES {
        let config = GameConfig::for_difficulty(difficulty);
        let mut bad_size = 0;
        let mut duplicates = 0;
        let mut short = 0;
        let mut lonely_couples = 0;
        let mut stray_pairs = 0;

        for seed in 0..seeds {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection =
                select_entities(catalog, config.grid_size, config.couple_count, &mut rng);

            if selection.placed.len() != config.grid_size {
                bad_size += 1;
            }
            let unique: HashSet<EntityId> = selection.placed.iter().copied().collect();
            if unique.len() != selection.placed.len() {
                duplicates += 1;
            }
            if selection.seeded_couples < config.couple_count {
                short += 1;
            }
            if selection.seeded_couples > 0 && selection.ex_pairs.is_empty() {
                lonely_couples += 1;
            }
            let on_grid =
                |key: &PairKey| unique.contains(&key.first()) && unique.contains(&key.second());
            stray_pairs += selection
                .couples
                .iter()
                .chain(&selection.ex_pairs)
                .filter(|key| !on_grid(*key))
                .count();
        }

        let label = format!("{:?}", difficulty).to_lowercase();
        results.push(TestResult {
            name: format!("select_{}_fills_grid", label),
            passed: bad_size == 0 && duplicates == 0,
            detail: format!(
                "{} seeds: {} wrong size, {} with duplicates",
                seeds, bad_size, duplicates
            ),
        });
        results.push(TestResult {
            name: format!("select_{}_relationships_on_grid", label),
            passed: stray_pairs == 0 && lonely_couples == 0,
            detail: format!(
                "{} stray pairs, {} rounds without ex-pairs",
                stray_pairs, lonely_couples
            ),
        });
        results.push(TestResult {
            name: format!("select_{}_reaches_target", label),
            passed: short * 10 < seeds,
            detail: format!(
                "{}/{} seeds short of {} couples",
                short, seeds, config.couple_count
            ),
        });
    }

    if verbose {
        println!("  {} seeds per difficulty", seeds);
    }

    results
}

// ── 3. Layout ───────────────────────────────────────────────────────────

fn validate_layout(catalog: &Catalog, verbose: bool) -> Vec<TestResult> {
    println!("--- Layout Sweep ---");
    let mut results = Vec::new();
    let seeds = 200u64;

    for difficulty in DIFFICULTIES {
        let config = GameConfig::for_difficulty(difficulty);
        let mut exhausted = 0;
        let mut invalid = 0;
        let mut ids_changed = 0;
        let mut spread_valid = 0;

        for seed in 0..seeds {
            let mut rng = StdRng::seed_from_u64(seed);
            let selection =
                select_entities(catalog, config.grid_size, config.couple_count, &mut rng);
            let rules = RoundRules::from(&selection);
            let cells = build_cells(&selection.placed, config.grid_size, false);
            let expected_ids: Vec<CellId> = cells.iter().map(Cell::id).collect();

            match shuffle_layout(cells.clone(), &rules, config.layout_attempts, &mut rng) {
                Ok(grid) => {
                    if !is_valid_layout(&grid, &rules) {
                        invalid += 1;
                    }
                    let fresh = evaluate(&grid, &rules, &BTreeSet::new(), &ConflictEpisodes::new());
                    if !fresh.newly_matched.is_empty() || !fresh.fighting.is_empty() {
                        invalid += 1;
                    }
                    if grid.cell_ids() != expected_ids {
                        ids_changed += 1;
                    }
                }
                Err(_) => exhausted += 1,
            }

            if let Ok(grid) = spread_layout(cells, &rules, &mut rng) {
                if is_valid_layout(&grid, &rules) {
                    spread_valid += 1;
                }
            }
        }

        let label = format!("{:?}", difficulty).to_lowercase();
        results.push(TestResult {
            name: format!("layout_{}_clean_start", label),
            passed: invalid == 0 && ids_changed == 0 && exhausted == 0,
            detail: format!(
                "{} seeds: {} invalid, {} id changes, {} exhausted",
                seeds, invalid, ids_changed, exhausted
            ),
        });
        results.push(TestResult {
            name: format!("layout_{}_spread_fallback", label),
            passed: spread_valid * 10 >= seeds * 9,
            detail: format!("{}/{} constructive layouts valid", spread_valid, seeds),
        });
    }

    // Over-constrained board: every shuffle fails, the session still starts
    let dense = dense_catalog();
    let config = GameConfig {
        grid_size: 4,
        couple_count: 1,
        layout_attempts: 50,
        ..Default::default()
    };
    let outcome = GameSession::setup(&dense, config.with_seed(1));
    results.push(TestResult {
        name: "layout_fallback_accepts_dense_round".into(),
        passed: outcome.as_ref().is_ok_and(|s| s.score() == 0 && s.grid().len() == 4),
        detail: match &outcome {
            Ok(s) => format!(
                "started with {} matched cells, score {}",
                s.matched().len(),
                s.score()
            ),
            Err(e) => e.to_string(),
        },
    });

    let bad = GameConfig {
        grid_size: 15,
        couple_count: 9,
        ..Default::default()
    };
    let errors = validate_config(&bad);
    results.push(TestResult {
        name: "config_rejects_bad_grid".into(),
        passed: errors.len() == 2 && GameSession::setup(&dense, bad).is_err(),
        detail: errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; "),
    });

    if verbose {
        println!("  {} seeds per difficulty", seeds);
    }

    results
}

fn dense_catalog() -> Catalog {
    Catalog::from_entities(vec![
        Entity::new(1, "A").with_partner(2).with_exes(&[3, 4]),
        Entity::new(2, "B").with_partner(1),
        Entity::new(3, "C"),
        Entity::new(4, "D"),
    ])
    .unwrap_or_default()
}

// ── 4. Adjacency ────────────────────────────────────────────────────────

/// 4x4 grid with the given entities placed, fillers (100 + pos) elsewhere.
fn scenario_grid(placed: &[(usize, u32)]) -> Option<Grid> {
    let cells = (0..16u32)
        .map(|pos| {
            let entity = placed
                .iter()
                .find(|(p, _)| *p == pos as usize)
                .map_or(100 + pos, |&(_, e)| e);
            Cell::Occupied {
                id: CellId(pos),
                entity: EntityId(entity),
                revealed: false,
            }
        })
        .collect();
    Grid::new(cells)
}

fn validate_adjacency(verbose: bool) -> Vec<TestResult> {
    println!("--- Adjacency Scenarios ---");
    let mut results = Vec::new();

    let (a, b, c) = (EntityId(1), EntityId(2), EntityId(3));
    let rules = RoundRules::new(vec![PairKey::new(a, b)], vec![PairKey::new(a, c)]);
    let none = BTreeSet::new();

    // Couple side by side
    let matched = scenario_grid(&[(0, 1), (1, 2)]).map(|grid| {
        let eval = evaluate(&grid, &rules, &none, &ConflictEpisodes::new());
        eval.newly_matched == [CellId(0), CellId(1)].into_iter().collect::<BTreeSet<_>>()
            && eval.score_delta == MATCH_REWARD
    });
    results.push(TestResult {
        name: "adjacency_couple_matches".into(),
        passed: matched == Some(true),
        detail: format!("+{} for an adjacent couple", MATCH_REWARD),
    });

    // Ex side by side, then the same conflict again
    let charged_once = scenario_grid(&[(0, 1), (1, 3)]).map(|grid| {
        let mut episodes = ConflictEpisodes::new();
        let first = evaluate(&grid, &rules, &none, &episodes);
        episodes.apply(&first, 1);
        let second = evaluate(&grid, &rules, &none, &episodes);
        first.score_delta == -EX_PENALTY
            && first.newly_penalized == vec![PairKey::new(a, c)]
            && second.score_delta == 0
            && second.fighting == first.fighting
    });
    results.push(TestResult {
        name: "adjacency_conflict_charged_once".into(),
        passed: charged_once == Some(true),
        detail: format!("-{} per conflict episode", EX_PENALTY),
    });

    // Row boundaries do not wrap
    let no_wrap = scenario_grid(&[(3, 1), (4, 2)]).map(|grid| {
        evaluate(&grid, &rules, &none, &ConflictEpisodes::new())
            .newly_matched
            .is_empty()
    });
    results.push(TestResult {
        name: "adjacency_no_wraparound".into(),
        passed: no_wrap == Some(true),
        detail: "positions 3 and 4 are not neighbours".into(),
    });

    // Frozen cells
    let frozen = scenario_grid(&[(0, 1), (2, 2)]).map(|grid| {
        let mut session = GameSession::with_layout(GameConfig::default(), grid, rules.clone());
        let matched = session.swap(1, 2).is_ok() && session.matched().len() == 2;
        let before = session.grid().clone();
        let rejected = session.swap(0, 4) == Err(MoveRejection::Frozen(0));
        matched && rejected && session.grid() == &before && session.move_count() == 1
    });
    results.push(TestResult {
        name: "session_matched_cells_frozen".into(),
        passed: frozen == Some(true),
        detail: "swaps touching matched cells are rejected".into(),
    });

    // An ex moved next to a matched cell still fights
    let wall = scenario_grid(&[(0, 1), (2, 2), (5, 3)]).map(|grid| {
        let mut session = GameSession::with_layout(GameConfig::default(), grid, rules.clone());
        let matched = session.swap(1, 2).is_ok();
        let charged = session
            .swap(4, 5)
            .is_ok_and(|report| report.evaluation.score_delta == -EX_PENALTY);
        matched && charged && session.fighting().contains(&CellId(0))
    });
    results.push(TestResult {
        name: "session_matched_cell_fights_ex".into(),
        passed: wall == Some(true),
        detail: format!("-{} for an ex beside a matched cell", EX_PENALTY),
    });

    if verbose {
        println!("  5 scenarios");
    }

    results
}

// ── 5. Random play ──────────────────────────────────────────────────────

fn validate_play(catalog: &Catalog, verbose: bool) -> Vec<TestResult> {
    println!("--- Random Play ---");
    let mut results = Vec::new();
    let rounds = 50u64;

    for difficulty in DIFFICULTIES {
        let mut won = 0;
        let mut stuck = 0;
        let mut violations = Vec::new();
        let mut total_score = 0i64;

        for seed in 0..rounds {
            let config = GameConfig {
                swap_mode: SwapMode::Anywhere,
                ..GameConfig::for_difficulty(difficulty)
            }
            .with_seed(seed);
            let mut session = match GameSession::setup(catalog, config) {
                Ok(s) => s,
                Err(e) => {
                    violations.push(format!("seed {}: {}", seed, e));
                    continue;
                }
            };
            let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
            let ids = session.grid().cell_ids();

            for _ in 0..5000 {
                if session.status().is_terminal() {
                    break;
                }
                let len = session.grid().len();
                let (p, q) = (rng.gen_range(0..len), rng.gen_range(0..len));
                let before: Vec<(CellId, Option<usize>)> = session
                    .matched()
                    .iter()
                    .map(|&id| (id, session.grid().position_of(id)))
                    .collect();

                if session.swap(p, q).is_err() {
                    continue;
                }
                if session.grid().cell_ids() != ids {
                    violations.push(format!("seed {}: cell ids changed", seed));
                    break;
                }
                let moved = before.iter().any(|(id, pos)| {
                    !session.matched().contains(id) || session.grid().position_of(*id) != *pos
                });
                if moved {
                    violations.push(format!("seed {}: matched cell moved", seed));
                    break;
                }
                let again = evaluate(
                    session.grid(),
                    session.rules(),
                    session.matched(),
                    session.episodes(),
                );
                if again.score_delta != 0 || !again.newly_matched.is_empty() {
                    violations.push(format!("seed {}: re-evaluation not idempotent", seed));
                    break;
                }
            }

            match session.status() {
                TerminalStatus::Won => won += 1,
                TerminalStatus::Stuck => stuck += 1,
                TerminalStatus::Ongoing => {}
            }
            total_score += i64::from(session.score());
        }

        let label = format!("{:?}", difficulty).to_lowercase();
        results.push(TestResult {
            name: format!("play_{}_invariants", label),
            passed: violations.is_empty(),
            detail: if violations.is_empty() {
                format!("{} rounds clean", rounds)
            } else {
                violations.join("; ")
            },
        });
        results.push(TestResult {
            name: format!("play_{}_terminates", label),
            passed: won + stuck == rounds as usize,
            detail: format!(
                "{} won, {} stuck, avg score {}",
                won,
                stuck,
                total_score / rounds as i64
            ),
        });
    }

    if verbose {
        println!("  {} rounds per difficulty", rounds);
    }

    results
}

// ── 6. Leaderboard ──────────────────────────────────────────────────────

fn validate_leaderboard(catalog: &Catalog, verbose: bool) -> Vec<TestResult> {
    println!("--- Leaderboard ---");
    let mut results = Vec::new();

    let mut board = Leaderboard::new(5);
    let mut recorded = 0;
    for seed in 0..20u64 {
        let config = GameConfig {
            swap_mode: SwapMode::Anywhere,
            ..GameConfig::for_difficulty(Difficulty::Easy)
        }
        .with_seed(seed);
        let Ok(mut session) = GameSession::setup(catalog, config) else {
            continue;
        };
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..5000 {
            if session.status().is_terminal() {
                break;
            }
            let len = session.grid().len();
            let _ = session.swap(rng.gen_range(0..len), rng.gen_range(0..len));
        }
        if session.record_result(&format!("sim{}", seed), &mut board).is_some() {
            recorded += 1;
        }
    }

    let sorted = board
        .entries()
        .windows(2)
        .all(|w| (w[0].score, Reverse(w[0].moves)) >= (w[1].score, Reverse(w[1].moves)));
    results.push(TestResult {
        name: "leaderboard_sorted_and_bounded".into(),
        passed: recorded > 0 && board.len() <= 5 && sorted,
        detail: format!("{} rounds recorded, {} kept", recorded, board.len()),
    });

    let mut buffer = Vec::new();
    let roundtrip = board
        .save(&mut buffer)
        .and_then(|_| Leaderboard::load(&buffer[..]));
    results.push(TestResult {
        name: "leaderboard_save_load".into(),
        passed: roundtrip.as_ref().is_ok_and(|loaded| loaded == &board),
        detail: match &roundtrip {
            Ok(_) => format!("{} bytes", buffer.len()),
            Err(e) => e.to_string(),
        },
    });

    // Any sink works, not just the bundled board
    let mut forwarded: Vec<RoundSummary> = Vec::new();
    if let Some(best) = board.best() {
        forwarded.record(best.clone());
    }
    results.push(TestResult {
        name: "leaderboard_custom_sink".into(),
        passed: forwarded.len() == usize::from(!board.is_empty()),
        detail: format!("{} summaries forwarded", forwarded.len()),
    });

    if verbose {
        if let Some(best) = board.best() {
            println!("  best: {} with {} in {} moves", best.player, best.score, best.moves);
        }
    }

    results
}
