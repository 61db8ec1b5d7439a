//! Ledger contract and its SQLite implementation
//!
//! The engine and dispatcher only see `Ledger`; the SQLite store is the
//! system of record for tokens, creators, trades and the portfolio.

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{lock, ClosedTrade, Creator, Database, ExitReason, NewTrade, PaperTrade, Portfolio, Token};
use crate::error::{TradingError, TradingResult};

/// Aggregate figures for status output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerStats {
    pub tokens_total: i64,
    pub tokens_active: i64,
    pub creators_tracked: i64,
    pub avg_creator_score: f64,
    pub closed_trades: i64,
    pub winning_trades: i64,
    pub avg_profit_percent: f64,
    pub open_trades: i64,
    pub portfolio: Option<Portfolio>,
}

/// Persistence used by the dispatcher and position engine
pub trait Ledger: Send + Sync {
    /// Register a token and credit its creator. Returns true if the mint was already known.
    fn add_token(
        &self,
        mint: &str,
        name: &str,
        symbol: &str,
        creator: &str,
        uri: Option<&str>,
    ) -> TradingResult<bool>;

    fn get_creator(&self, wallet: &str) -> TradingResult<Option<Creator>>;

    fn find_token(&self, mint: &str) -> TradingResult<Option<Token>>;

    fn update_token_price(&self, mint: &str, price: f64, market_cap: f64) -> TradingResult<()>;

    /// Create the portfolio if none exists
    fn init_portfolio(&self, initial_balance: f64) -> TradingResult<()>;

    fn get_portfolio(&self) -> TradingResult<Option<Portfolio>>;

    /// Persist an open trade and debit the balance atomically. Returns the
    /// stored row, so callers share its id and entry time.
    fn open_trade(&self, trade: &NewTrade) -> TradingResult<PaperTrade>;

    /// Close an open trade and credit the balance atomically.
    /// `None` means the trade was not open and nothing changed.
    fn close_trade(
        &self,
        trade_id: i64,
        exit_price: f64,
        reason: ExitReason,
    ) -> TradingResult<Option<ClosedTrade>>;

    fn get_open_trades(&self) -> TradingResult<Vec<PaperTrade>>;

    fn update_creator_score(&self, wallet: &str, score: f64, risk_level: &str) -> TradingResult<()>;

    fn blacklist_creator(&self, wallet: &str, reason: &str) -> TradingResult<()>;

    fn creator_leaderboard(&self, limit: usize) -> TradingResult<Vec<Creator>>;

    fn stats(&self) -> TradingResult<LedgerStats>;
}

pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open the ledger file and bring the schema up to date
    pub fn open<P: AsRef<Path>>(path: P) -> TradingResult<Self> {
        let db = Database::new(path)?;
        db.run_migrations()?;
        Ok(Self { conn: db.get_connection() })
    }

    pub fn in_memory() -> TradingResult<Self> {
        let db = Database::new_in_memory()?;
        db.run_migrations()?;
        Ok(Self { conn: db.get_connection() })
    }

    pub fn find_trade(&self, trade_id: i64) -> TradingResult<Option<PaperTrade>> {
        let conn = lock(&self.conn)?;
        Ok(PaperTrade::find(&conn, trade_id)?)
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl Ledger for SqliteLedger {
    fn add_token(
        &self,
        mint: &str,
        name: &str,
        symbol: &str,
        creator: &str,
        uri: Option<&str>,
    ) -> TradingResult<bool> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let timestamp = now();

        let token = Token::new(mint, name, symbol, creator, uri, &timestamp);
        let inserted = token.insert_if_new(&tx)?;
        if inserted {
            Creator::record_token(&tx, creator, &timestamp)?;
        }
        tx.commit()?;

        if !inserted {
            debug!("token {} already registered", mint);
        }
        Ok(!inserted)
    }

    fn get_creator(&self, wallet: &str) -> TradingResult<Option<Creator>> {
        let conn = lock(&self.conn)?;
        Ok(Creator::find(&conn, wallet)?)
    }

    fn find_token(&self, mint: &str) -> TradingResult<Option<Token>> {
        let conn = lock(&self.conn)?;
        Ok(Token::find(&conn, mint)?)
    }

    fn update_token_price(&self, mint: &str, price: f64, market_cap: f64) -> TradingResult<()> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let known = Token::update_price(&tx, mint, price, market_cap, &now())?;
        tx.commit()?;

        if !known {
            debug!("price update for untracked mint {}", mint);
        }
        Ok(())
    }

    fn init_portfolio(&self, initial_balance: f64) -> TradingResult<()> {
        let conn = lock(&self.conn)?;
        Portfolio::init(&conn, initial_balance, &now())?;
        Ok(())
    }

    fn get_portfolio(&self) -> TradingResult<Option<Portfolio>> {
        let conn = lock(&self.conn)?;
        Ok(Portfolio::get(&conn)?)
    }

    fn open_trade(&self, trade: &NewTrade) -> TradingResult<PaperTrade> {
        if trade.amount_sol <= 0.0 {
            return Err(TradingError::InvalidParameter(
                "amount_sol".to_string(),
                "must be positive".to_string(),
            ));
        }

        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let timestamp = now();

        let portfolio = Portfolio::get(&tx)?
            .ok_or_else(|| TradingError::DatabaseQuery("portfolio not initialized".to_string()))?;
        if portfolio.balance_sol < trade.amount_sol {
            return Err(TradingError::InsufficientFunds(trade.amount_sol, portfolio.balance_sol));
        }

        let id = PaperTrade::insert_open(&tx, trade, &timestamp).map_err(|e| {
            match TradingError::from(e) {
                TradingError::DatabaseConstraint(_) => TradingError::DuplicatePosition(trade.mint.clone()),
                other => other,
            }
        })?;
        Portfolio::debit(&tx, trade.amount_sol, &timestamp)?;
        let stored = PaperTrade::find(&tx, id)?
            .ok_or_else(|| TradingError::Internal(format!("trade #{} missing after insert", id)))?;
        tx.commit()?;

        Ok(stored)
    }

    fn close_trade(
        &self,
        trade_id: i64,
        exit_price: f64,
        reason: ExitReason,
    ) -> TradingResult<Option<ClosedTrade>> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        let closed = match PaperTrade::close(&tx, trade_id, exit_price, reason, now)? {
            Some(closed) => closed,
            None => return Ok(None),
        };
        Portfolio::credit_close(&tx, closed.exit_amount_sol, closed.profit_sol, &now.to_rfc3339())?;
        tx.commit()?;

        Ok(Some(closed))
    }

    fn get_open_trades(&self) -> TradingResult<Vec<PaperTrade>> {
        let conn = lock(&self.conn)?;
        Ok(PaperTrade::list_open(&conn)?)
    }

    fn update_creator_score(&self, wallet: &str, score: f64, risk_level: &str) -> TradingResult<()> {
        let conn = lock(&self.conn)?;
        Creator::update_score(&conn, wallet, score, risk_level)?;
        Ok(())
    }

    fn blacklist_creator(&self, wallet: &str, reason: &str) -> TradingResult<()> {
        let conn = lock(&self.conn)?;
        Creator::blacklist(&conn, wallet, reason, &now())?;
        Ok(())
    }

    fn creator_leaderboard(&self, limit: usize) -> TradingResult<Vec<Creator>> {
        let conn = lock(&self.conn)?;
        Ok(Creator::leaderboard(&conn, limit)?)
    }

    fn stats(&self) -> TradingResult<LedgerStats> {
        let conn = lock(&self.conn)?;
        let (tokens_total, tokens_active) = Token::counts(&conn)?;
        let (creators_tracked, avg_creator_score) = Creator::tracked_stats(&conn)?;
        let (closed_trades, winning_trades, avg_profit_percent) = PaperTrade::closed_stats(&conn)?;
        let open_trades = PaperTrade::list_open(&conn)?.len() as i64;

        Ok(LedgerStats {
            tokens_total,
            tokens_active,
            creators_tracked,
            avg_creator_score,
            closed_trades,
            winning_trades,
            avg_profit_percent,
            open_trades,
            portfolio: Portfolio::get(&conn)?,
        })
    }
}
