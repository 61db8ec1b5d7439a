//! Database module for the SQLite paper-trading ledger

use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{TradingError, TradingResult};

pub mod creator;
pub mod ledger;
pub mod portfolio;
pub mod token;
pub mod trade;

pub use creator::Creator;
pub use ledger::{Ledger, LedgerStats, SqliteLedger};
pub use portfolio::Portfolio;
pub use token::{Token, TokenStatus};
pub use trade::{ClosedTrade, ExitReason, NewTrade, PaperTrade, TradeStatus};

/// Shared SQLite connection
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file, creating parent directories as needed
    pub fn new<P: AsRef<Path>>(path: P) -> TradingResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| TradingError::DatabaseConnection(e.to_string()))?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| TradingError::DatabaseConnection(e.to_string()))?;

        // Enable foreign keys
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing)
    pub fn new_in_memory() -> TradingResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TradingError::DatabaseConnection(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run migrations to set up or update the schema
    pub fn run_migrations(&self) -> TradingResult<()> {
        let conn = lock(&self.conn)?;

        let migration_sql = include_str!("migrations/V1__initial_schema.sql");
        conn.execute_batch(migration_sql)
            .map_err(|e| TradingError::DatabaseMigration(e.to_string()))?;

        Ok(())
    }

    /// Get a reference to the connection (for custom queries)
    pub fn get_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Check database health
    pub fn health_check(&self) -> TradingResult<bool> {
        let conn = lock(&self.conn)?;
        let result: i32 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
        Ok(result == 1)
    }
}

/// Lock the connection, surfacing a poisoned mutex as an error
pub(crate) fn lock(conn: &Mutex<Connection>) -> TradingResult<MutexGuard<'_, Connection>> {
    conn.lock().map_err(TradingError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_creation() {
        let db = Database::new_in_memory().unwrap();
        assert!(db.health_check().unwrap());
    }

    #[test]
    fn test_migrations() {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();
        // Idempotent
        db.run_migrations().unwrap();

        let conn = db.conn.lock().unwrap();
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |row| row.get(0)
        ).unwrap();

        assert_eq!(count, 5); // tokens, creators, price_history, paper_trades, paper_portfolio
    }

    #[test]
    fn test_file_database_creates_parent_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data").join("ledger.db");
        let db = Database::new(&path).unwrap();
        db.run_migrations().unwrap();
        assert!(path.exists());
    }
}
