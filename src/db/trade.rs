//! Paper trade database operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeStatus {
    Open,
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "open",
            TradeStatus::Closed => "closed",
        }
    }

    fn from_string(s: &str) -> Self {
        match s {
            "closed" => TradeStatus::Closed,
            _ => TradeStatus::Open,
        }
    }
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    EmergencyClose,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::EmergencyClose => "emergency_close",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "stop_loss" => Some(ExitReason::StopLoss),
            "take_profit" => Some(ExitReason::TakeProfit),
            "emergency_close" => Some(ExitReason::EmergencyClose),
            _ => None,
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry snapshot for a position about to be opened
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrade {
    pub mint: String,
    pub creator: String,
    pub entry_price: f64,
    pub entry_market_cap: f64,
    pub amount_sol: f64,
    pub creator_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperTrade {
    pub id: i64,
    pub mint: String,
    pub creator: String,
    pub entry_time: String,
    pub entry_price: f64,
    pub entry_market_cap: f64,
    pub amount_sol: f64,
    pub creator_score: f64,
    pub status: TradeStatus,
    pub exit_time: Option<String>,
    pub exit_price: Option<f64>,
    pub exit_amount_sol: Option<f64>,
    pub exit_reason: Option<ExitReason>,
    pub profit_sol: Option<f64>,
    pub profit_percent: Option<f64>,
    pub hold_seconds: Option<i64>,
}

/// Result of a successful close
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClosedTrade {
    pub trade_id: i64,
    pub mint: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub amount_sol: f64,
    pub exit_amount_sol: f64,
    pub profit_sol: f64,
    pub profit_percent: f64,
    pub reason: ExitReason,
    pub hold_seconds: i64,
}

const COLUMNS: &str = "id, mint, creator, entry_time, entry_price, entry_market_cap, amount_sol,
                       creator_score, status, exit_time, exit_price, exit_amount_sol, exit_reason,
                       profit_sol, profit_percent, hold_seconds";

impl PaperTrade {
    fn from_row(row: &Row) -> SqlResult<Self> {
        Ok(PaperTrade {
            id: row.get(0)?,
            mint: row.get(1)?,
            creator: row.get(2)?,
            entry_time: row.get(3)?,
            entry_price: row.get(4)?,
            entry_market_cap: row.get(5)?,
            amount_sol: row.get(6)?,
            creator_score: row.get(7)?,
            status: TradeStatus::from_string(&row.get::<_, String>(8)?),
            exit_time: row.get(9)?,
            exit_price: row.get(10)?,
            exit_amount_sol: row.get(11)?,
            exit_reason: row
                .get::<_, Option<String>>(12)?
                .and_then(|s| ExitReason::from_string(&s)),
            profit_sol: row.get(13)?,
            profit_percent: row.get(14)?,
            hold_seconds: row.get(15)?,
        })
    }

    /// Insert an open trade and return its id
    pub fn insert_open(conn: &Connection, trade: &NewTrade, timestamp: &str) -> SqlResult<i64> {
        conn.execute(
            "INSERT INTO paper_trades (
                mint, creator, entry_time, entry_price, entry_market_cap,
                amount_sol, creator_score, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'open')",
            params![
                trade.mint,
                trade.creator,
                timestamp,
                trade.entry_price,
                trade.entry_market_cap,
                trade.amount_sol,
                trade.creator_score,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Find trade by ID
    pub fn find(conn: &Connection, id: i64) -> SqlResult<Option<Self>> {
        conn.query_row(
            &format!("SELECT {} FROM paper_trades WHERE id = ?1", COLUMNS),
            params![id],
            |row| Self::from_row(row),
        )
        .optional()
    }

    pub fn list_open(conn: &Connection) -> SqlResult<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM paper_trades WHERE status = 'open' ORDER BY id",
            COLUMNS
        ))?;
        let rows = stmt.query_map([], |row| Self::from_row(row))?;
        rows.collect()
    }

    /// Close an open trade at `exit_price`.
    ///
    /// Returns `None` without touching anything when the trade is unknown or
    /// already closed.
    pub fn close(
        conn: &Connection,
        id: i64,
        exit_price: f64,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> SqlResult<Option<ClosedTrade>> {
        let trade = match Self::find(conn, id)? {
            Some(trade) if trade.status == TradeStatus::Open => trade,
            _ => return Ok(None),
        };

        let change = if trade.entry_price > 0.0 {
            (exit_price - trade.entry_price) / trade.entry_price
        } else {
            0.0
        };
        let exit_amount = trade.amount_sol * (1.0 + change);
        let profit = exit_amount - trade.amount_sol;
        let hold_seconds = DateTime::parse_from_rfc3339(&trade.entry_time)
            .map(|entry| (now - entry.with_timezone(&Utc)).num_seconds().max(0))
            .unwrap_or(0);

        let changed = conn.execute(
            "UPDATE paper_trades SET
                status = 'closed',
                exit_time = ?2,
                exit_price = ?3,
                exit_amount_sol = ?4,
                exit_reason = ?5,
                profit_sol = ?6,
                profit_percent = ?7,
                hold_seconds = ?8
             WHERE id = ?1 AND status = 'open'",
            params![
                id,
                now.to_rfc3339(),
                exit_price,
                exit_amount,
                reason.as_str(),
                profit,
                change * 100.0,
                hold_seconds,
            ],
        )?;

        if changed == 0 {
            return Ok(None);
        }

        Ok(Some(ClosedTrade {
            trade_id: id,
            mint: trade.mint,
            entry_price: trade.entry_price,
            exit_price,
            amount_sol: trade.amount_sol,
            exit_amount_sol: exit_amount,
            profit_sol: profit,
            profit_percent: change * 100.0,
            reason,
            hold_seconds,
        }))
    }

    /// Closed trade count, winners and average profit percent
    pub fn closed_stats(conn: &Connection) -> SqlResult<(i64, i64, f64)> {
        conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN profit_sol > 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(AVG(profit_percent), 0.0)
             FROM paper_trades WHERE status = 'closed'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
    }
}
