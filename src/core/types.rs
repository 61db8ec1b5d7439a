// Core event and position types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use crate::db::ExitReason;

/// A freshly launched token, enriched with what we know about its creator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTokenEvent {
    pub mint: String,
    pub name: String,
    pub symbol: String,
    pub creator: String,
    pub uri: Option<String>,
    pub creator_tokens: u32,
    pub creator_score: f64,
    pub creator_blacklisted: bool,
    pub timestamp: DateTime<Utc>,
}

/// In-memory view of an open paper trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub trade_id: i64,
    pub mint: String,
    pub creator: String,
    pub entry_price: f64,
    pub amount_sol: f64,
    pub creator_score: f64,
    pub entry_time: String,
}

impl OpenPosition {
    /// Percent move from entry to `price`
    pub fn change_percent(&self, price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        (price - self.entry_price) / self.entry_price * 100.0
    }
}

/// First entry rule that failed, in evaluation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntryRejection {
    TradingDisabled,
    Paused,
    CreatorBlacklisted,
    CreatorNotWhitelisted,
    ScoreTooLow { score: f64, min: f64 },
    TooFewTokens { tokens: u32, min: u32 },
    MaxPositions { open: usize, max: usize },
    AlreadyOpen,
    InsufficientBalance { required: f64, available: f64 },
}

impl fmt::Display for EntryRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryRejection::TradingDisabled => write!(f, "trading disabled"),
            EntryRejection::Paused => write!(f, "new trades paused"),
            EntryRejection::CreatorBlacklisted => write!(f, "creator blacklisted"),
            EntryRejection::CreatorNotWhitelisted => write!(f, "creator not on whitelist"),
            EntryRejection::ScoreTooLow { score, min } => {
                write!(f, "creator score {:.1} below {:.1}", score, min)
            }
            EntryRejection::TooFewTokens { tokens, min } => {
                write!(f, "creator has {} tokens, needs {}", tokens, min)
            }
            EntryRejection::MaxPositions { open, max } => {
                write!(f, "{} of {} positions open", open, max)
            }
            EntryRejection::AlreadyOpen => write!(f, "position already open"),
            EntryRejection::InsufficientBalance { required, available } => {
                write!(f, "balance {:.4} SOL below size {:.4} SOL", available, required)
            }
        }
    }
}
