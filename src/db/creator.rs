//! Creator database operations

use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TRUST_SCORE: f64 = 50.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creator {
    pub wallet: String,
    pub first_seen: String,
    pub last_seen: String,
    pub tokens_created: i64,
    pub tokens_graduated: i64,
    pub trust_score: f64,
    pub risk_level: String,
    pub is_blacklisted: bool,
    pub blacklist_reason: Option<String>,
}

const COLUMNS: &str = "wallet, first_seen, last_seen, tokens_created, tokens_graduated,
                       trust_score, risk_level, is_blacklisted, blacklist_reason";

impl Creator {
    fn from_row(row: &Row) -> SqlResult<Self> {
        Ok(Creator {
            wallet: row.get(0)?,
            first_seen: row.get(1)?,
            last_seen: row.get(2)?,
            tokens_created: row.get(3)?,
            tokens_graduated: row.get(4)?,
            trust_score: row.get(5)?,
            risk_level: row.get(6)?,
            is_blacklisted: row.get::<_, i64>(7)? != 0,
            blacklist_reason: row.get(8)?,
        })
    }

    /// Count one more token for the wallet, creating the creator on first sight
    pub fn record_token(conn: &Connection, wallet: &str, timestamp: &str) -> SqlResult<()> {
        conn.execute(
            "INSERT INTO creators (wallet, first_seen, last_seen, tokens_created)
             VALUES (?1, ?2, ?2, 1)
             ON CONFLICT(wallet) DO UPDATE SET
                tokens_created = tokens_created + 1,
                last_seen = excluded.last_seen",
            params![wallet, timestamp],
        )?;
        Ok(())
    }

    /// Find creator by wallet
    pub fn find(conn: &Connection, wallet: &str) -> SqlResult<Option<Self>> {
        conn.query_row(
            &format!("SELECT {} FROM creators WHERE wallet = ?1", COLUMNS),
            params![wallet],
            |row| Self::from_row(row),
        )
        .optional()
    }

    pub fn update_score(conn: &Connection, wallet: &str, score: f64, risk_level: &str) -> SqlResult<bool> {
        let changed = conn.execute(
            "UPDATE creators SET trust_score = ?2, risk_level = ?3 WHERE wallet = ?1",
            params![wallet, score, risk_level],
        )?;
        Ok(changed == 1)
    }

    /// Flag a wallet, creating its row if it has not launched anything yet
    pub fn blacklist(conn: &Connection, wallet: &str, reason: &str, timestamp: &str) -> SqlResult<()> {
        conn.execute(
            "INSERT INTO creators (wallet, first_seen, last_seen, tokens_created, is_blacklisted, blacklist_reason)
             VALUES (?1, ?3, ?3, 0, 1, ?2)
             ON CONFLICT(wallet) DO UPDATE SET
                is_blacklisted = 1,
                blacklist_reason = excluded.blacklist_reason",
            params![wallet, reason, timestamp],
        )?;
        Ok(())
    }

    /// Best non-blacklisted repeat creators by trust score
    pub fn leaderboard(conn: &Connection, limit: usize) -> SqlResult<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM creators
             WHERE is_blacklisted = 0 AND tokens_created >= 2
             ORDER BY trust_score DESC, tokens_created DESC
             LIMIT ?1",
            COLUMNS
        ))?;

        let rows = stmt.query_map(params![limit as i64], |row| Self::from_row(row))?;
        rows.collect()
    }

    /// Repeat creators (two or more tokens) and their average score
    pub fn tracked_stats(conn: &Connection) -> SqlResult<(i64, f64)> {
        conn.query_row(
            "SELECT COUNT(*), COALESCE(AVG(trust_score), 0.0) FROM creators WHERE tokens_created >= 2",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
    }
}
