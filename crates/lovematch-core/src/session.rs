//! Game session - one round of play
//!
//! `GameSession` owns the grid, the round's couples and ex-pairs, and all
//! match state. Every command is atomic: it either applies completely and
//! re-evaluates adjacency, or is rejected with no state change.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::adjacency::{evaluate, ConflictEpisodes, Evaluation, PairKey};
use crate::catalog::{Catalog, EntityId};
use crate::config::{
    validate_config, ConfigError, GameConfig, SwapMode, COUPLE_HINT_COST, EX_HINT_COST,
};
use crate::generation::{
    build_cells, is_valid_layout, select_entities, shuffle_layout, spread_layout, LayoutError,
    RoundRules,
};
use crate::grid::{CellId, Grid};
use crate::persistence::{RoundSummary, ScoreSink};

/// Where the round stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TerminalStatus {
    #[default]
    Ongoing,
    Won,
    /// Not won and nothing useful left to do.
    Stuck,
}

impl TerminalStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TerminalStatus::Ongoing)
    }
}

/// What an accepted swap or undo did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveReport {
    pub evaluation: Evaluation,
    pub score: i32,
    pub status: TerminalStatus,
}

/// Setup refused the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidConfig(pub Vec<ConfigError>);

impl std::fmt::Display for InvalidConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid game configuration")?;
        for (i, error) in self.0.iter().enumerate() {
            write!(f, "{} {}", if i == 0 { ":" } else { ";" }, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidConfig {}

/// Why a swap was refused. No state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    SamePosition,
    OutOfBounds(usize),
    /// Adjacent-only mode and the positions are not neighbours.
    NotAdjacent,
    /// The position holds a matched cell.
    Frozen(usize),
    BothEmpty,
    GameOver,
}

impl std::fmt::Display for MoveRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveRejection::SamePosition => write!(f, "Cannot swap a cell with itself"),
            MoveRejection::OutOfBounds(pos) => write!(f, "Position {} is outside the grid", pos),
            MoveRejection::NotAdjacent => write!(f, "Positions are not adjacent"),
            MoveRejection::Frozen(pos) => write!(f, "Position {} holds a matched cell", pos),
            MoveRejection::BothEmpty => write!(f, "Both positions are empty"),
            MoveRejection::GameOver => write!(f, "The round is over"),
        }
    }
}

impl std::error::Error for MoveRejection {}

/// Why an undo was refused. No state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoRejection {
    NothingToUndo,
    /// Restoring the snapshot would move a matched cell.
    WouldMoveMatched,
    GameWon,
}

impl std::fmt::Display for UndoRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UndoRejection::NothingToUndo => write!(f, "No move to undo"),
            UndoRejection::WouldMoveMatched => write!(f, "Undo would move a matched cell"),
            UndoRejection::GameWon => write!(f, "The round is already won"),
        }
    }
}

impl std::error::Error for UndoRejection {}

/// Why a hint unlock was refused. Nothing was charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintRejection {
    NothingLeft,
    InsufficientScore { cost: i32, score: i32 },
    GameOver,
}

impl std::fmt::Display for HintRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HintRejection::NothingLeft => write!(f, "Every hint is already visible"),
            HintRejection::InsufficientScore { cost, score } => {
                write!(f, "Hint costs {} but the score is {}", cost, score)
            }
            HintRejection::GameOver => write!(f, "The round is over"),
        }
    }
}

impl std::error::Error for HintRejection {}

/// One round of play.
#[derive(Debug, Clone)]
pub struct GameSession {
    config: GameConfig,
    rules: RoundRules,
    grid: Grid,
    /// Entities on the grid, in cell id order
    placed: Vec<EntityId>,
    cell_of: HashMap<EntityId, CellId>,

    matched: BTreeSet<CellId>,
    fighting: BTreeSet<CellId>,
    episodes: ConflictEpisodes,
    score: i32,
    move_count: u32,
    /// Pre-move snapshots, most recent last
    history: Vec<Grid>,
    status: TerminalStatus,

    couple_hints: usize,
    ex_hints: usize,
    recorded: bool,
}

impl GameSession {
    /// Set up a new round, seeded from `config.seed` or from entropy.
    pub fn setup(catalog: &Catalog, config: GameConfig) -> Result<Self, InvalidConfig> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::setup_with_rng(catalog, config, &mut rng)
    }

    /// Set up a new round using the caller's random source.
    ///
    /// Layout fallback chain: capped shuffling, then constructive placement,
    /// then a fresh selection with one couple fewer. If even a round without
    /// seeded couples cannot be laid out cleanly, the constructive grid is
    /// used as is and whatever it starts with is absorbed unscored.
    pub fn setup_with_rng(
        catalog: &Catalog,
        config: GameConfig,
        rng: &mut impl Rng,
    ) -> Result<Self, InvalidConfig> {
        let errors = validate_config(&config);
        if !errors.is_empty() {
            return Err(InvalidConfig(errors));
        }

        let revealed = config.difficulty.show_names();
        let mut target = config.couple_count;

        loop {
            let selection = select_entities(catalog, config.grid_size, target, rng);
            let rules = RoundRules::from(&selection);
            let cells = build_cells(&selection.placed, config.grid_size, revealed);

            if selection.seeded_couples < config.couple_count {
                log::warn!(
                    "Only {} of {} couples fit this round",
                    selection.seeded_couples,
                    config.couple_count
                );
            }

            match shuffle_layout(cells.clone(), &rules, config.layout_attempts, rng) {
                Ok(grid) => return Ok(Self::with_layout(config, grid, rules)),
                Err(LayoutError::Exhausted { attempts }) => {
                    log::warn!(
                        "No clean shuffle in {} attempts, placing constructively",
                        attempts
                    );
                }
                Err(LayoutError::NotSquare(n)) => {
                    return Err(InvalidConfig(vec![ConfigError::GridNotSquare(n)]));
                }
            }

            let grid = spread_layout(cells, &rules, rng)
                .map_err(|_| InvalidConfig(vec![ConfigError::GridNotSquare(config.grid_size)]))?;
            if is_valid_layout(&grid, &rules) {
                return Ok(Self::with_layout(config, grid, rules));
            }

            if selection.seeded_couples == 0 {
                log::warn!("Accepting a layout with related cells already adjacent");
                return Ok(Self::with_layout(config, grid, rules));
            }
            target = selection.seeded_couples - 1;
            log::warn!("Retrying selection with {} couples", target);
        }
    }

    /// Start a round on a prepared grid.
    ///
    /// Any match or conflict already present is absorbed without scoring.
    pub fn with_layout(config: GameConfig, grid: Grid, rules: RoundRules) -> Self {
        let mut pairs: Vec<(CellId, EntityId)> = grid
            .cells()
            .iter()
            .filter_map(|c| c.entity().map(|e| (c.id(), e)))
            .collect();
        pairs.sort();
        let placed = pairs.iter().map(|&(_, e)| e).collect();
        let cell_of = pairs.iter().map(|&(c, e)| (e, c)).collect();

        let hints_unlocked = config.difficulty.hints_unlocked();
        let mut session = Self {
            couple_hints: if hints_unlocked { rules.couples().len() } else { 0 },
            ex_hints: if hints_unlocked { rules.ex_pairs().len() } else { 0 },
            config,
            rules,
            grid,
            placed,
            cell_of,
            matched: BTreeSet::new(),
            fighting: BTreeSet::new(),
            episodes: ConflictEpisodes::new(),
            score: 0,
            move_count: 0,
            history: Vec::new(),
            status: TerminalStatus::Ongoing,
            recorded: false,
        };

        let initial = evaluate(&session.grid, &session.rules, &session.matched, &session.episodes);
        if !initial.newly_matched.is_empty() || !initial.conflicts.is_empty() {
            log::warn!(
                "Round starts with {} matched cells and {} conflicts",
                initial.newly_matched.len(),
                initial.conflicts.len()
            );
        }
        session.fold(&initial, false);

        if !session.has_puzzle() {
            log::warn!("Round has no couples; no puzzle possible");
        }
        log::info!(
            "Round set up: {} cells, {} couples, {} ex-pairs, {:?}",
            session.grid.len(),
            session.rules.couple_count(),
            session.rules.ex_pairs().len(),
            session.config.difficulty
        );
        session
    }

    /// Swap the cells at two positions.
    pub fn swap(&mut self, pos1: usize, pos2: usize) -> Result<MoveReport, MoveRejection> {
        if let Err(rejection) = self.check_swap(pos1, pos2) {
            log::debug!("Swap {} <-> {} rejected: {}", pos1, pos2, rejection);
            return Err(rejection);
        }

        self.history.push(self.grid.clone());
        self.grid.swap(pos1, pos2);
        self.move_count += 1;
        self.score -= self.config.move_cost;

        Ok(self.reevaluate())
    }

    fn check_swap(&self, pos1: usize, pos2: usize) -> Result<(), MoveRejection> {
        if self.status.is_terminal() {
            return Err(MoveRejection::GameOver);
        }
        for pos in [pos1, pos2] {
            if self.grid.get(pos).is_none() {
                return Err(MoveRejection::OutOfBounds(pos));
            }
        }
        if pos1 == pos2 {
            return Err(MoveRejection::SamePosition);
        }

        let cells = self.grid.cells();
        for pos in [pos1, pos2] {
            if self.matched.contains(&cells[pos].id()) {
                return Err(MoveRejection::Frozen(pos));
            }
        }
        if cells[pos1].is_empty() && cells[pos2].is_empty() {
            return Err(MoveRejection::BothEmpty);
        }
        if self.config.swap_mode == SwapMode::Adjacent
            && !self.grid.are_adjacent(pos1, pos2)
        {
            return Err(MoveRejection::NotAdjacent);
        }
        Ok(())
    }

    /// Restore the grid from before the last accepted swap.
    ///
    /// Score is not restored; `undo_penalty` is charged on top.
    pub fn undo(&mut self) -> Result<MoveReport, UndoRejection> {
        if let Err(rejection) = self.check_undo() {
            log::debug!("Undo rejected: {}", rejection);
            return Err(rejection);
        }
        let Some(snapshot) = self.history.pop() else {
            return Err(UndoRejection::NothingToUndo);
        };

        self.grid = snapshot;
        self.grid.set_revealed(&self.matched);
        self.move_count = self.move_count.saturating_sub(1);
        self.score -= self.config.undo_penalty;

        Ok(self.reevaluate())
    }

    fn check_undo(&self) -> Result<(), UndoRejection> {
        if self.status == TerminalStatus::Won {
            return Err(UndoRejection::GameWon);
        }
        let snapshot = self.history.last().ok_or(UndoRejection::NothingToUndo)?;
        let moves_matched = self
            .matched
            .iter()
            .any(|&id| snapshot.position_of(id) != self.grid.position_of(id));
        if moves_matched {
            return Err(UndoRejection::WouldMoveMatched);
        }
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.check_undo().is_ok()
    }

    /// Reveal one more couple hint at `COUPLE_HINT_COST`.
    pub fn unlock_couple_hint(&mut self) -> Result<PairKey, HintRejection> {
        let key = self.next_hint(self.rules.couples(), self.couple_hints, COUPLE_HINT_COST)?;
        self.couple_hints += 1;
        self.score -= COUPLE_HINT_COST;
        Ok(key)
    }

    /// Reveal one more ex-pair hint at `EX_HINT_COST`.
    pub fn unlock_ex_hint(&mut self) -> Result<PairKey, HintRejection> {
        let key = self.next_hint(self.rules.ex_pairs(), self.ex_hints, EX_HINT_COST)?;
        self.ex_hints += 1;
        self.score -= EX_HINT_COST;
        Ok(key)
    }

    fn next_hint(
        &self,
        pairs: &[PairKey],
        shown: usize,
        cost: i32,
    ) -> Result<PairKey, HintRejection> {
        if self.status.is_terminal() {
            return Err(HintRejection::GameOver);
        }
        let key = *pairs.get(shown).ok_or(HintRejection::NothingLeft)?;
        if self.score < cost {
            return Err(HintRejection::InsufficientScore {
                cost,
                score: self.score,
            });
        }
        Ok(key)
    }

    pub fn visible_couple_hints(&self) -> &[PairKey] {
        &self.rules.couples()[..self.couple_hints]
    }

    pub fn visible_ex_hints(&self) -> &[PairKey] {
        &self.rules.ex_pairs()[..self.ex_hints]
    }

    /// Drop the fighting indicator, normally [`FIGHT_INDICATOR_SECS`] after a
    /// conflict shows up. Episodes are unaffected.
    ///
    /// [`FIGHT_INDICATOR_SECS`]: crate::config::FIGHT_INDICATOR_SECS
    pub fn clear_fighting(&mut self) {
        self.fighting.clear();
    }

    /// Summary of the round so far.
    pub fn summary(&self, player: &str) -> RoundSummary {
        RoundSummary {
            player: player.to_string(),
            score: self.score,
            moves: self.move_count,
            couples_matched: self.couples_matched(),
            couples_total: self.rules.couple_count(),
            status: self.status,
            difficulty: self.config.difficulty,
        }
    }

    /// Write the finished round to `sink`, once. `None` while ongoing or already recorded.
    pub fn record_result(
        &mut self,
        player: &str,
        sink: &mut impl ScoreSink,
    ) -> Option<RoundSummary> {
        if !self.status.is_terminal() || self.recorded {
            return None;
        }
        let summary = self.summary(player);
        sink.record(summary.clone());
        self.recorded = true;
        log::info!(
            "Recorded {:?} round for {}: score {} in {} moves",
            summary.status,
            summary.player,
            summary.score,
            summary.moves
        );
        Some(summary)
    }

    fn reevaluate(&mut self) -> MoveReport {
        let evaluation = evaluate(&self.grid, &self.rules, &self.matched, &self.episodes);
        self.fold(&evaluation, true);
        log::debug!(
            "Move {}: {} new matches, {:+} -> score {}, {:?}",
            self.move_count,
            evaluation.matched_pairs(),
            evaluation.score_delta,
            self.score,
            self.status
        );
        MoveReport {
            evaluation,
            score: self.score,
            status: self.status,
        }
    }

    fn fold(&mut self, evaluation: &Evaluation, scored: bool) {
        self.matched.extend(evaluation.newly_matched.iter().copied());
        self.grid.set_revealed(&evaluation.newly_matched);
        self.episodes.apply(evaluation, self.move_count);
        self.fighting = evaluation.fighting.clone();
        if scored {
            self.score += evaluation.score_delta;
        }
        self.status = self.compute_status();
    }

    fn compute_status(&self) -> TerminalStatus {
        if !self.has_puzzle() {
            return TerminalStatus::Stuck;
        }
        let all_matched = self.couples_matched() == self.rules.couple_count();
        if self.config.win_policy.is_won(all_matched, self.score) {
            TerminalStatus::Won
        } else if all_matched || !self.grid.has_legal_swap(&self.matched, self.config.swap_mode) {
            TerminalStatus::Stuck
        } else {
            TerminalStatus::Ongoing
        }
    }

    /// Couples with both cells matched.
    pub fn couples_matched(&self) -> usize {
        self.rules
            .couples()
            .iter()
            .filter(|key| {
                [key.first(), key.second()].iter().all(|e| {
                    self.cell_of
                        .get(e)
                        .is_some_and(|cell| self.matched.contains(cell))
                })
            })
            .count()
    }

    /// False for a round that ended up with no couples at all.
    pub fn has_puzzle(&self) -> bool {
        self.rules.couple_count() > 0
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn rules(&self) -> &RoundRules {
        &self.rules
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn placed(&self) -> &[EntityId] {
        &self.placed
    }

    pub fn cell_of(&self, entity: EntityId) -> Option<CellId> {
        self.cell_of.get(&entity).copied()
    }

    pub fn couples(&self) -> &[PairKey] {
        self.rules.couples()
    }

    pub fn ex_pairs(&self) -> &[PairKey] {
        self.rules.ex_pairs()
    }

    pub fn matched(&self) -> &BTreeSet<CellId> {
        &self.matched
    }

    pub fn fighting(&self) -> &BTreeSet<CellId> {
        &self.fighting
    }

    pub fn episodes(&self) -> &ConflictEpisodes {
        &self.episodes
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn status(&self) -> TerminalStatus {
        self.status
    }
}
