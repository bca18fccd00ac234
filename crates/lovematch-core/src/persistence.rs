//! Leaderboard - sink for finished rounds
//!
//! The core only ever writes `RoundSummary` values into a `ScoreSink`. The
//! bundled `Leaderboard` keeps the best entries in memory and can persist
//! them with bincode.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::io::{Read, Write};

use crate::config::Difficulty;
use crate::session::TerminalStatus;

/// Version number for save file format (increment when format changes)
const SAVE_VERSION: u32 = 1;

/// Default number of entries a leaderboard keeps
pub const DEFAULT_LEADERBOARD_CAPACITY: usize = 10;

/// Outcome of one finished round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub player: String,
    pub score: i32,
    pub moves: u32,
    pub couples_matched: usize,
    pub couples_total: usize,
    pub status: TerminalStatus,
    pub difficulty: Difficulty,
}

/// Anything that accepts finished-round summaries.
pub trait ScoreSink {
    fn record(&mut self, summary: RoundSummary);
}

impl ScoreSink for Vec<RoundSummary> {
    fn record(&mut self, summary: RoundSummary) {
        self.push(summary);
    }
}

/// Best rounds, highest score first, fewer moves breaking ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    entries: Vec<RoundSummary>,
    capacity: usize,
}

impl Default for Leaderboard {
    fn default() -> Self {
        Self::new(DEFAULT_LEADERBOARD_CAPACITY)
    }
}

impl Leaderboard {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn entries(&self) -> &[RoundSummary] {
        &self.entries
    }

    pub fn best(&self) -> Option<&RoundSummary> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Would a round with this score and move count make the board?
    pub fn qualifies(&self, score: i32, moves: u32) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.entries.len() < self.capacity {
            return true;
        }
        self.entries.last().is_some_and(|last| {
            (score, Reverse(moves)) > (last.score, Reverse(last.moves))
        })
    }

    /// Save the leaderboard to a writer
    pub fn save<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        let save_data = LeaderboardSave {
            version: SAVE_VERSION,
            board: self.clone(),
        };
        bincode::serialize_into(writer, &save_data)?;
        Ok(())
    }

    /// Load a leaderboard from a reader
    pub fn load<R: Read>(reader: R) -> Result<Self, SaveError> {
        let save_data: LeaderboardSave = bincode::deserialize_from(reader)?;

        if save_data.version != SAVE_VERSION {
            return Err(SaveError::VersionMismatch {
                expected: SAVE_VERSION,
                found: save_data.version,
            });
        }

        Ok(save_data.board)
    }
}

impl ScoreSink for Leaderboard {
    fn record(&mut self, summary: RoundSummary) {
        // Insert after every entry that ranks at least as high, so earlier rounds win ties
        let at = self
            .entries
            .iter()
            .position(|e| (summary.score, e.moves) > (e.score, summary.moves))
            .unwrap_or(self.entries.len());
        self.entries.insert(at, summary);
        self.entries.truncate(self.capacity);
    }
}

#[derive(Serialize, Deserialize)]
struct LeaderboardSave {
    version: u32,
    board: Leaderboard,
}

/// Errors that can occur during save/load
#[derive(Debug)]
pub enum SaveError {
    Io(std::io::Error),
    Bincode(Box<bincode::ErrorKind>),
    VersionMismatch { expected: u32, found: u32 },
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for SaveError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SaveError::Bincode(e)
    }
}

impl std::fmt::Display for SaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::Io(e) => write!(f, "IO error: {}", e),
            SaveError::Bincode(e) => write!(f, "Serialization error: {}", e),
            SaveError::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Save version mismatch: expected {}, found {}",
                    expected, found
                )
            }
        }
    }
}

impl std::error::Error for SaveError {}
