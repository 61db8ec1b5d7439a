//! Unified error handling for the paper sniper
//!
//! One error type for the whole crate, grouped by category so the stream loop
//! and the engine can decide what is recoverable without string matching.

use std::fmt;
use std::io;

/// Main error type for the paper sniper
#[derive(Debug)]
pub enum TradingError {
    // Configuration errors
    ConfigNotFound(String),
    ConfigParse(String),
    ConfigValidation(String),

    // Database errors
    DatabaseConnection(String),
    DatabaseQuery(String),
    DatabaseMigration(String),
    DatabaseConstraint(String),

    // Event feed errors
    FeedConnection(String),
    FeedProtocol(String),
    FeedTimeout(String),

    // Control plane errors
    ControlSource(String),

    // Trading errors
    InvalidParameter(String, String), // (parameter_name, reason)
    InsufficientFunds(f64, f64),      // (required, available)
    DuplicatePosition(String),

    // IO errors
    FileNotFound(String),
    FileRead(String),
    FileWrite(String),

    // General errors
    Internal(String),
}

impl TradingError {
    /// Get a user-friendly error message with helpful context
    pub fn user_message(&self) -> String {
        match self {
            TradingError::ConfigNotFound(path) => {
                format!(
                    "Configuration file not found: {}\n\n\
                    💡 Quick fix:\n\
                    1. Run: paper-sniper init\n\
                    2. Adjust config.toml if needed\n\
                    3. Try again",
                    path
                )
            }
            TradingError::ConfigValidation(msg) => {
                format!(
                    "Configuration validation error: {}\n\n\
                    💡 Check config.toml for:\n\
                    - Positive balances and position sizes\n\
                    - Non-zero intervals\n\
                    - ping_timeout_secs below ping_interval_secs",
                    msg
                )
            }
            TradingError::DatabaseConnection(msg) => {
                format!(
                    "Database connection failed: {}\n\n\
                    💡 Try:\n\
                    1. Check the data/ directory permissions\n\
                    2. Ensure disk space is available\n\
                    3. Point database.db_path somewhere writable",
                    msg
                )
            }
            TradingError::InsufficientFunds(required, available) => {
                format!(
                    "Insufficient paper balance\n\
                    Required: {:.4} SOL\n\
                    Available: {:.4} SOL\n\n\
                    💡 Either:\n\
                    - Wait for open positions to close\n\
                    - Lower max_position_size in control.json",
                    required, available
                )
            }
            TradingError::ControlSource(msg) => {
                format!(
                    "Control file problem: {}\n\n\
                    💡 The bot keeps its last good settings.\n\
                    Inspect with: paper-sniper control show",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TradingError::FeedConnection(_)
                | TradingError::FeedTimeout(_)
                | TradingError::FeedProtocol(_)
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TradingError::ConfigNotFound(_)
            | TradingError::ConfigParse(_)
            | TradingError::ConfigValidation(_) => "config",

            TradingError::DatabaseConnection(_)
            | TradingError::DatabaseQuery(_)
            | TradingError::DatabaseMigration(_)
            | TradingError::DatabaseConstraint(_) => "database",

            TradingError::FeedConnection(_)
            | TradingError::FeedProtocol(_)
            | TradingError::FeedTimeout(_) => "feed",

            TradingError::ControlSource(_) => "control",

            TradingError::InvalidParameter(_, _)
            | TradingError::InsufficientFunds(_, _)
            | TradingError::DuplicatePosition(_) => "trading",

            TradingError::FileNotFound(_)
            | TradingError::FileRead(_)
            | TradingError::FileWrite(_) => "io",

            TradingError::Internal(_) => "internal",
        }
    }
}

impl fmt::Display for TradingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path)
            }
            TradingError::ConfigParse(msg) => {
                write!(f, "Configuration parse error: {}", msg)
            }
            TradingError::ConfigValidation(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }

            TradingError::DatabaseConnection(msg) => {
                write!(f, "Database connection error: {}", msg)
            }
            TradingError::DatabaseQuery(msg) => {
                write!(f, "Database query error: {}", msg)
            }
            TradingError::DatabaseMigration(msg) => {
                write!(f, "Database migration error: {}", msg)
            }
            TradingError::DatabaseConstraint(msg) => {
                write!(f, "Database constraint violation: {}", msg)
            }

            TradingError::FeedConnection(msg) => {
                write!(f, "Feed connection error: {}", msg)
            }
            TradingError::FeedProtocol(msg) => {
                write!(f, "Feed protocol error: {}", msg)
            }
            TradingError::FeedTimeout(msg) => {
                write!(f, "Feed timeout: {}", msg)
            }

            TradingError::ControlSource(msg) => {
                write!(f, "Control source error: {}", msg)
            }

            TradingError::InvalidParameter(param, reason) => {
                write!(f, "Invalid parameter '{}': {}", param, reason)
            }
            TradingError::InsufficientFunds(required, available) => {
                write!(
                    f,
                    "Insufficient funds: required {:.4} SOL, available {:.4} SOL",
                    required, available
                )
            }
            TradingError::DuplicatePosition(mint) => {
                write!(f, "Position already open for mint: {}", mint)
            }

            TradingError::FileNotFound(path) => {
                write!(f, "File not found: {}", path)
            }
            TradingError::FileRead(msg) => {
                write!(f, "File read error: {}", msg)
            }
            TradingError::FileWrite(msg) => {
                write!(f, "File write error: {}", msg)
            }

            TradingError::Internal(msg) => {
                write!(f, "Internal error: {}", msg)
            }
        }
    }
}

impl std::error::Error for TradingError {}

// Conversion implementations for common error types

impl From<io::Error> for TradingError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => TradingError::FileNotFound(err.to_string()),
            io::ErrorKind::PermissionDenied => TradingError::FileRead(err.to_string()),
            io::ErrorKind::TimedOut => TradingError::FeedTimeout(err.to_string()),
            io::ErrorKind::ConnectionRefused => TradingError::FeedConnection(err.to_string()),
            _ => TradingError::Internal(format!("IO error: {}", err)),
        }
    }
}

impl From<rusqlite::Error> for TradingError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE constraint") || msg.contains("FOREIGN KEY constraint") {
                    TradingError::DatabaseConstraint(msg)
                } else {
                    TradingError::DatabaseQuery(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => {
                TradingError::DatabaseQuery("Query returned no rows".to_string())
            }
            _ => TradingError::DatabaseQuery(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for TradingError {
    fn from(err: serde_json::Error) -> Self {
        TradingError::FeedProtocol(format!("JSON error: {}", err))
    }
}

impl From<toml::de::Error> for TradingError {
    fn from(err: toml::de::Error) -> Self {
        TradingError::ConfigParse(format!("TOML parse error: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TradingError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                TradingError::FeedConnection("connection closed".to_string())
            }
            WsError::Io(e) if e.kind() == io::ErrorKind::TimedOut => TradingError::FeedTimeout(e.to_string()),
            WsError::Io(e) => TradingError::FeedConnection(e.to_string()),
            WsError::Protocol(e) => TradingError::FeedProtocol(e.to_string()),
            other @ (WsError::Utf8 | WsError::Capacity(_)) => TradingError::FeedProtocol(other.to_string()),
            // A malformed feed URL will not fix itself
            WsError::Url(e) => TradingError::ConfigValidation(format!("feed url: {}", e)),
            other => TradingError::FeedConnection(other.to_string()),
        }
    }
}

impl From<crate::config::ConfigError> for TradingError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::FileRead(msg) => TradingError::ConfigNotFound(msg),
            ConfigError::FileWrite(msg) => TradingError::FileWrite(msg),
            ConfigError::Parse(msg) | ConfigError::Serialize(msg) => TradingError::ConfigParse(msg),
            ConfigError::Validation(msg) => TradingError::ConfigValidation(msg),
        }
    }
}

impl From<crate::control::ControlError> for TradingError {
    fn from(err: crate::control::ControlError) -> Self {
        TradingError::ControlSource(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for TradingError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        TradingError::Internal(format!("lock poisoned: {}", err))
    }
}

impl From<String> for TradingError {
    fn from(msg: String) -> Self {
        TradingError::Internal(msg)
    }
}

impl From<&str> for TradingError {
    fn from(msg: &str) -> Self {
        TradingError::Internal(msg.to_string())
    }
}

/// Result type alias using TradingError
pub type TradingResult<T> = Result<T, TradingError>;
