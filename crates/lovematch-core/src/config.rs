//! Round configuration and scoring constants.
//!
//! A `GameConfig` is passed to `GameSession::setup`. Presets are derived from
//! a `Difficulty`; any field can be overridden afterwards and the result
//! checked with [`validate_config`].
//!
//! ```
//! use lovematch_core::config::{validate_config, Difficulty, GameConfig};
//!
//! let mut config = GameConfig::for_difficulty(Difficulty::Hard);
//! config.seed = Some(7);
//! assert!(validate_config(&config).is_empty());
//! ```

use serde::{Deserialize, Serialize};

/// Points for bringing a couple together.
pub const MATCH_REWARD: i32 = 100;
/// One-time penalty per conflict episode.
pub const EX_PENALTY: i32 = 25;
/// Score cost of revealing one more couple hint.
pub const COUPLE_HINT_COST: i32 = 50;
/// Score cost of revealing one more ex-pair hint.
pub const EX_HINT_COST: i32 = 25;
/// How long the presentation layer shows the fighting indicator.
pub const FIGHT_INDICATOR_SECS: f32 = 1.0;
/// Rejection-sampling cap for the initial layout.
pub const DEFAULT_LAYOUT_ATTEMPTS: u32 = 10_000;

/// Smallest and largest supported grid edge.
pub const MIN_GRID_WIDTH: usize = 2;
pub const MAX_GRID_WIDTH: usize = 16;

/// Difficulty presets. Only affects how much the player is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    /// Cells start with names visible.
    pub fn show_names(self) -> bool {
        !matches!(self, Difficulty::Hard)
    }

    /// All couple and ex hints visible from the start.
    pub fn hints_unlocked(self) -> bool {
        matches!(self, Difficulty::Easy)
    }
}

/// When a round counts as won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WinPolicy {
    /// Every couple matched.
    AllCouples,
    /// Every couple matched and the score ended above zero.
    #[default]
    AllCouplesPositiveScore,
    /// Score reached the threshold.
    ScoreThreshold(i32),
    /// Every couple matched or the score reached the threshold.
    Either(i32),
}

impl WinPolicy {
    pub fn is_won(self, all_matched: bool, score: i32) -> bool {
        match self {
            WinPolicy::AllCouples => all_matched,
            WinPolicy::AllCouplesPositiveScore => all_matched && score > 0,
            WinPolicy::ScoreThreshold(threshold) => score >= threshold,
            WinPolicy::Either(threshold) => all_matched || score >= threshold,
        }
    }
}

/// Which position pairs a swap may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SwapMode {
    /// Only grid neighbours (click-to-select).
    #[default]
    Adjacent,
    /// Any two positions (drag-and-drop).
    Anywhere,
}

/// Everything `GameSession::setup` needs besides the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Total cells, must be a perfect square.
    pub grid_size: usize,
    /// Couples the selector tries to place.
    pub couple_count: usize,
    pub difficulty: Difficulty,
    pub win_policy: WinPolicy,
    pub swap_mode: SwapMode,
    /// Score charged for every accepted swap.
    pub move_cost: i32,
    /// Score charged for every undo.
    pub undo_penalty: i32,
    /// Rejection-sampling attempts before falling back.
    pub layout_attempts: u32,
    /// Random seed (None = entropy).
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_size: 16,
            couple_count: 4,
            difficulty: Difficulty::Normal,
            win_policy: WinPolicy::default(),
            swap_mode: SwapMode::default(),
            move_cost: 0,
            undo_penalty: 0,
            layout_attempts: DEFAULT_LAYOUT_ATTEMPTS,
            seed: None,
        }
    }
}

impl GameConfig {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        let (grid_size, couple_count) = match difficulty {
            Difficulty::Easy => (16, 3),
            Difficulty::Normal => (16, 4),
            Difficulty::Hard => (25, 5),
        };
        Self {
            grid_size,
            couple_count,
            difficulty,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Edge length of the grid (floor of the square root).
    pub fn grid_width(&self) -> usize {
        integer_sqrt(self.grid_size)
    }
}

/// Floor of the square root.
pub fn integer_sqrt(n: usize) -> usize {
    let mut root = (n as f64).sqrt() as usize;
    while root * root > n {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= n {
        root += 1;
    }
    root
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Grid size is not a perfect square.
    GridNotSquare(usize),
    /// Grid edge shorter than `MIN_GRID_WIDTH`.
    GridTooSmall(usize),
    /// Grid edge longer than `MAX_GRID_WIDTH`.
    GridTooLarge(usize),
    /// More couples requested than the grid can hold.
    TooManyCouples { requested: usize, max: usize },
    /// Layout attempts must be at least one.
    NoLayoutAttempts,
    /// A score threshold at or below zero is met before the first move.
    NonPositiveWinScore(i32),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::GridNotSquare(n) => write!(f, "Grid size {} is not a perfect square", n),
            ConfigError::GridTooSmall(n) => write!(f, "Grid size {} is below the minimum", n),
            ConfigError::GridTooLarge(n) => write!(f, "Grid size {} is above the maximum", n),
            ConfigError::TooManyCouples { requested, max } => {
                write!(f, "{} couples requested, at most {} fit", requested, max)
            }
            ConfigError::NoLayoutAttempts => write!(f, "Layout attempts must be at least 1"),
            ConfigError::NonPositiveWinScore(t) => {
                write!(f, "Win score threshold {} must be above zero", t)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Validate a game configuration, returning all errors found.
pub fn validate_config(config: &GameConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    let width = config.grid_width();
    if width * width != config.grid_size {
        errors.push(ConfigError::GridNotSquare(config.grid_size));
    }
    if width < MIN_GRID_WIDTH {
        errors.push(ConfigError::GridTooSmall(config.grid_size));
    }
    if width > MAX_GRID_WIDTH {
        errors.push(ConfigError::GridTooLarge(config.grid_size));
    }

    let max_couples = config.grid_size / 2;
    if config.couple_count > max_couples {
        errors.push(ConfigError::TooManyCouples {
            requested: config.couple_count,
            max: max_couples,
        });
    }

    if config.layout_attempts == 0 {
        errors.push(ConfigError::NoLayoutAttempts);
    }

    if let WinPolicy::ScoreThreshold(t) | WinPolicy::Either(t) = config.win_policy {
        if t <= 0 {
            errors.push(ConfigError::NonPositiveWinScore(t));
        }
    }

    errors
}
