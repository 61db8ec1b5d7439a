//! Paper portfolio (single row)

use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Portfolio {
    pub balance_sol: f64,
    pub total_profit_sol: f64,
    pub total_trades: i64,
    pub winning_trades: i64,
    pub losing_trades: i64,
    pub updated_at: String,
}

impl Portfolio {
    pub fn win_rate(&self) -> f64 {
        self.winning_trades as f64 / self.total_trades.max(1) as f64 * 100.0
    }

    /// Create the row with a starting balance. Returns false if it already existed.
    pub fn init(conn: &Connection, initial_balance: f64, timestamp: &str) -> SqlResult<bool> {
        let changed = conn.execute(
            "INSERT OR IGNORE INTO paper_portfolio (id, balance_sol, updated_at) VALUES (1, ?1, ?2)",
            params![initial_balance, timestamp],
        )?;
        Ok(changed == 1)
    }

    pub fn get(conn: &Connection) -> SqlResult<Option<Self>> {
        conn.query_row(
            "SELECT balance_sol, total_profit_sol, total_trades, winning_trades, losing_trades, updated_at
             FROM paper_portfolio WHERE id = 1",
            [],
            |row| {
                Ok(Portfolio {
                    balance_sol: row.get(0)?,
                    total_profit_sol: row.get(1)?,
                    total_trades: row.get(2)?,
                    winning_trades: row.get(3)?,
                    losing_trades: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            },
        )
        .optional()
    }

    /// Take `amount` out of the balance
    pub fn debit(conn: &Connection, amount: f64, timestamp: &str) -> SqlResult<usize> {
        conn.execute(
            "UPDATE paper_portfolio SET balance_sol = balance_sol - ?1, updated_at = ?2 WHERE id = 1",
            params![amount, timestamp],
        )
    }

    /// Return the exit proceeds and book the realized result
    pub fn credit_close(conn: &Connection, exit_amount: f64, profit: f64, timestamp: &str) -> SqlResult<usize> {
        let win = if profit > 0.0 { 1 } else { 0 };
        conn.execute(
            "UPDATE paper_portfolio SET
                balance_sol = balance_sol + ?1,
                total_profit_sol = total_profit_sol + ?2,
                total_trades = total_trades + 1,
                winning_trades = winning_trades + ?3,
                losing_trades = losing_trades + (1 - ?3),
                updated_at = ?4
             WHERE id = 1",
            params![exit_amount, profit, win, timestamp],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_init_once() {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();
        let conn = db.get_connection();
        let conn = conn.lock().unwrap();

        assert!(Portfolio::init(&conn, 1.0, "t0").unwrap());
        assert!(!Portfolio::init(&conn, 5.0, "t1").unwrap());
        assert_eq!(Portfolio::get(&conn).unwrap().unwrap().balance_sol, 1.0);
    }

    #[test]
    fn test_win_rate_with_no_trades() {
        let portfolio = Portfolio {
            balance_sol: 1.0,
            total_profit_sol: 0.0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            updated_at: String::new(),
        };
        assert_eq!(portfolio.win_rate(), 0.0);
    }
}
