//! Token database operations

use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TokenStatus {
    Active,
    Graduated,
    Delisted,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Active => "active",
            TokenStatus::Graduated => "graduated",
            TokenStatus::Delisted => "delisted",
        }
    }

    fn from_string(s: &str) -> Self {
        match s {
            "graduated" => TokenStatus::Graduated,
            "delisted" => TokenStatus::Delisted,
            _ => TokenStatus::Active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub mint: String,
    pub name: String,
    pub symbol: String,
    pub creator: String,
    pub uri: Option<String>,
    pub created_at: String,
    pub initial_market_cap: f64,
    pub current_market_cap: f64,
    pub peak_market_cap: f64,
    pub current_price: f64,
    pub peak_price: f64,
    pub status: TokenStatus,
}

impl Token {
    pub fn new(mint: &str, name: &str, symbol: &str, creator: &str, uri: Option<&str>, created_at: &str) -> Self {
        Token {
            mint: mint.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            creator: creator.to_string(),
            uri: uri.map(str::to_string),
            created_at: created_at.to_string(),
            initial_market_cap: 0.0,
            current_market_cap: 0.0,
            peak_market_cap: 0.0,
            current_price: 0.0,
            peak_price: 0.0,
            status: TokenStatus::Active,
        }
    }

    fn from_row(row: &Row) -> SqlResult<Self> {
        Ok(Token {
            mint: row.get(0)?,
            name: row.get(1)?,
            symbol: row.get(2)?,
            creator: row.get(3)?,
            uri: row.get(4)?,
            created_at: row.get(5)?,
            initial_market_cap: row.get(6)?,
            current_market_cap: row.get(7)?,
            peak_market_cap: row.get(8)?,
            current_price: row.get(9)?,
            peak_price: row.get(10)?,
            status: TokenStatus::from_string(&row.get::<_, String>(11)?),
        })
    }

    /// Insert the token unless the mint is already known.
    /// Returns true when a new row was written.
    pub fn insert_if_new(&self, conn: &Connection) -> SqlResult<bool> {
        let changed = conn.execute(
            "INSERT OR IGNORE INTO tokens (
                mint, name, symbol, creator, uri, created_at,
                initial_market_cap, current_market_cap, peak_market_cap, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?7, ?8)",
            params![
                self.mint,
                self.name,
                self.symbol,
                self.creator,
                self.uri,
                self.created_at,
                self.initial_market_cap,
                self.status.as_str(),
            ],
        )?;
        Ok(changed == 1)
    }

    /// Find token by mint
    pub fn find(conn: &Connection, mint: &str) -> SqlResult<Option<Self>> {
        conn.query_row(
            "SELECT mint, name, symbol, creator, uri, created_at,
                    initial_market_cap, current_market_cap, peak_market_cap,
                    current_price, peak_price, status
             FROM tokens WHERE mint = ?1",
            params![mint],
            |row| Self::from_row(row),
        )
        .optional()
    }

    /// Record a tick: current values, max-tracked peaks, and a history row.
    /// Returns false for an unknown mint, which is left untouched.
    pub fn update_price(
        conn: &Connection,
        mint: &str,
        price: f64,
        market_cap: f64,
        timestamp: &str,
    ) -> SqlResult<bool> {
        let changed = conn.execute(
            "UPDATE tokens SET
                current_price = ?2,
                peak_price = MAX(peak_price, ?2),
                current_market_cap = ?3,
                peak_market_cap = MAX(peak_market_cap, ?3),
                last_update = ?4
             WHERE mint = ?1",
            params![mint, price, market_cap, timestamp],
        )?;

        if changed == 0 {
            return Ok(false);
        }

        conn.execute(
            "INSERT INTO price_history (mint, timestamp, price, market_cap) VALUES (?1, ?2, ?3, ?4)",
            params![mint, timestamp, price, market_cap],
        )?;
        Ok(true)
    }

    /// Move an active token to a terminal status. Terminal statuses never change.
    #[cfg(test)]
    pub fn set_status(conn: &Connection, mint: &str, status: TokenStatus) -> SqlResult<bool> {
        let changed = conn.execute(
            "UPDATE tokens SET status = ?2 WHERE mint = ?1 AND status = 'active'",
            params![mint, status.as_str()],
        )?;
        Ok(changed == 1)
    }

    #[cfg(test)]
    pub fn price_history_len(conn: &Connection, mint: &str) -> SqlResult<i64> {
        conn.query_row(
            "SELECT COUNT(*) FROM price_history WHERE mint = ?1",
            params![mint],
            |row| row.get(0),
        )
    }

    /// Total and active token counts
    pub fn counts(conn: &Connection) -> SqlResult<(i64, i64)> {
        conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0) FROM tokens",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup() -> Database {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();
        db
    }

    #[test]
    fn test_insert_is_idempotent() {
        let db = setup();
        let conn = db.get_connection();
        let conn = conn.lock().unwrap();

        let token = Token::new("Mint1", "Dog", "DOG", "Creator1", None, "2024-01-01T00:00:00Z");
        assert!(token.insert_if_new(&conn).unwrap());
        assert!(!token.insert_if_new(&conn).unwrap());

        let loaded = Token::find(&conn, "Mint1").unwrap().unwrap();
        assert_eq!(loaded.symbol, "DOG");
        assert_eq!(loaded.status, TokenStatus::Active);
    }

    #[test]
    fn test_peaks_track_maximum() {
        let db = setup();
        let conn = db.get_connection();
        let conn = conn.lock().unwrap();

        Token::new("Mint1", "Dog", "DOG", "Creator1", None, "t0").insert_if_new(&conn).unwrap();
        Token::update_price(&conn, "Mint1", 2.0, 60.0, "t1").unwrap();
        Token::update_price(&conn, "Mint1", 1.0, 30.0, "t2").unwrap();

        let token = Token::find(&conn, "Mint1").unwrap().unwrap();
        assert_eq!(token.current_price, 1.0);
        assert_eq!(token.peak_price, 2.0);
        assert_eq!(token.peak_market_cap, 60.0);
        assert_eq!(Token::price_history_len(&conn, "Mint1").unwrap(), 2);
    }

    #[test]
    fn test_unknown_mint_price_update_is_ignored() {
        let db = setup();
        let conn = db.get_connection();
        let conn = conn.lock().unwrap();

        assert!(!Token::update_price(&conn, "Nope", 1.0, 1.0, "t").unwrap());
        assert_eq!(Token::price_history_len(&conn, "Nope").unwrap(), 0);
    }

    #[test]
    fn test_status_is_monotonic() {
        let db = setup();
        let conn = db.get_connection();
        let conn = conn.lock().unwrap();

        Token::new("Mint1", "Dog", "DOG", "Creator1", None, "t0").insert_if_new(&conn).unwrap();
        assert!(Token::set_status(&conn, "Mint1", TokenStatus::Graduated).unwrap());
        assert!(!Token::set_status(&conn, "Mint1", TokenStatus::Delisted).unwrap());

        let token = Token::find(&conn, "Mint1").unwrap().unwrap();
        assert_eq!(token.status, TokenStatus::Graduated);
    }
}
