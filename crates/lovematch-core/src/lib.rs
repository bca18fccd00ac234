//! Love Match Core - grid puzzle engine
//!
//! Celebrities are placed on a square grid. The player swaps cells to bring
//! couples next to each other (scoring points) while keeping exes apart
//! (losing points).
//!
//! # Architecture
//!
//! Data flows one way through the crate:
//! - **Catalog**: read-only entity records with partner/ex references
//! - **Generation**: picks the entities for a round and shuffles them into a
//!   grid where nothing starts matched or fighting
//! - **Adjacency**: scores a grid - new matches, conflicts, penalties
//! - **Session**: owns one round, applies swaps/undo/hints and tracks the
//!   terminal status
//! - **Persistence**: leaderboard sink for finished rounds
//!
//! # Example
//!
//! ```rust,no_run
//! use lovematch_core::prelude::*;
//!
//! let catalog = Catalog::bundled(Language::En).unwrap();
//! let mut session = GameSession::setup(&catalog, GameConfig::default()).unwrap();
//!
//! // Swap two horizontally adjacent cells
//! if let Ok(report) = session.swap(0, 1) {
//!     println!("score {} -> {:?}", report.score, report.status);
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod grid;
pub mod generation;
pub mod adjacency;
pub mod session;
pub mod persistence;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::adjacency::{ConflictEpisodes, Evaluation, PairKey};
    pub use crate::catalog::{Catalog, Entity, EntityId, Language};
    pub use crate::config::{Difficulty, GameConfig, SwapMode, WinPolicy};
    pub use crate::generation::RoundRules;
    pub use crate::grid::{Cell, CellId, Grid};
    pub use crate::persistence::{Leaderboard, RoundSummary, ScoreSink};
    pub use crate::session::{GameSession, MoveReport, TerminalStatus};
}
