// Core trading logic modules

pub mod dispatcher;
pub mod position_engine;
pub mod scoring;
pub mod sizing;
pub mod status;
pub mod sweep;
pub mod types;

// Re-export commonly used types
pub use dispatcher::{DispatchStats, EventDispatcher};
pub use position_engine::{EngineSettings, PositionEngine};
pub use scoring::{CreatorScorer, FixedScorer, StoredScoreScorer};
pub use sizing::position_size;
pub use status::{StatusReporter, StatusSnapshot};
pub use sweep::{run_exit_sweep, sweep_once};
pub use types::{EntryRejection, ExitReason, NewTokenEvent, OpenPosition};
