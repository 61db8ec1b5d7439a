// Paper Sniper Library
//
// Paper-trades pump.fun token launches from a live websocket feed under
// hot-reloadable risk controls

pub mod clients;
pub mod config;
pub mod control;     // Hot-reloadable overrides
pub mod core;
pub mod db;          // SQLite ledger
pub mod error;       // Unified error handling

// Re-export core trading types
pub use core::{
    CreatorScorer, EngineSettings, EntryRejection, EventDispatcher, ExitReason, NewTokenEvent,
    OpenPosition, PositionEngine, StatusReporter, StatusSnapshot, StoredScoreScorer,
};

// Re-export error types
pub use error::{TradingError, TradingResult};

// Re-export client types
pub use clients::{FeedCommand, FrameHandler, StopHandle, StreamClient, StreamSettings};

// Re-export configuration
pub use config::{Config, ConfigError, FeedConfig, TradingConfig};
pub use control::{ControlError, ControlPlane, ControlSnapshot, ControlSource, FileControlSource, StaticControlSource};

// Re-export database types
pub use db::{Creator, Ledger, LedgerStats, PaperTrade, Portfolio, SqliteLedger};
