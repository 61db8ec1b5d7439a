// Periodic read-only status reporting

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::clients::StopHandle;
use crate::core::dispatcher::lock_engine;
use crate::core::position_engine::PositionEngine;
use crate::db::Ledger;
use crate::error::TradingResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub balance_sol: f64,
    pub total_profit_sol: f64,
    pub total_trades: i64,
    pub wins: i64,
    pub losses: i64,
    pub win_rate: f64,
    pub open_positions: usize,
    pub max_positions: usize,
    pub tokens_tracked: i64,
    pub creators_tracked: i64,
    pub avg_creator_score: f64,
    pub avg_profit_percent: f64,
}

pub struct StatusReporter {
    ledger: Arc<dyn Ledger>,
    engine: Option<Arc<Mutex<PositionEngine>>>,
    max_positions: usize,
}

impl StatusReporter {
    pub fn new(ledger: Arc<dyn Ledger>, max_positions: usize) -> Self {
        Self { ledger, engine: None, max_positions }
    }

    /// Read open positions from the live engine instead of the ledger
    pub fn with_engine(mut self, engine: Arc<Mutex<PositionEngine>>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn snapshot(&self) -> TradingResult<StatusSnapshot> {
        let stats = self.ledger.stats()?;
        let portfolio = stats.portfolio.clone().unwrap_or_default();

        let open_positions = match &self.engine {
            Some(engine) => lock_engine(engine)
                .map(|engine| engine.open_count())
                .unwrap_or(stats.open_trades as usize),
            None => stats.open_trades as usize,
        };

        Ok(StatusSnapshot {
            balance_sol: portfolio.balance_sol,
            total_profit_sol: portfolio.total_profit_sol,
            total_trades: portfolio.total_trades,
            wins: portfolio.winning_trades,
            losses: portfolio.losing_trades,
            win_rate: portfolio.win_rate(),
            open_positions,
            max_positions: self.max_positions,
            tokens_tracked: stats.tokens_total,
            creators_tracked: stats.creators_tracked,
            avg_creator_score: stats.avg_creator_score,
            avg_profit_percent: stats.avg_profit_percent,
        })
    }

    pub fn log_snapshot(&self) {
        let status = match self.snapshot() {
            Ok(status) => status,
            Err(e) => {
                error!("💥 Failed to build status: {}", e);
                return;
            }
        };

        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("📊 PAPER TRADING STATUS");
        info!("💰 Balance: {:.4} SOL | P/L: {:+.4} SOL", status.balance_sol, status.total_profit_sol);
        info!(
            "📈 Trades: {} | Wins: {} | Losses: {} | Win rate: {:.1}%",
            status.total_trades, status.wins, status.losses, status.win_rate
        );
        info!("📂 Open positions: {}/{}", status.open_positions, status.max_positions);
        info!(
            "🪙 Tokens: {} | Creators (2+ tokens): {} | Avg score: {:.1}",
            status.tokens_tracked, status.creators_tracked, status.avg_creator_score
        );
        if status.total_trades > 0 {
            info!("📉 Avg closed-trade result: {:+.1}%", status.avg_profit_percent);
        }
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    pub fn log_leaderboard(&self, limit: usize) {
        let creators = match self.ledger.creator_leaderboard(limit) {
            Ok(creators) => creators,
            Err(e) => {
                error!("💥 Failed to load creator leaderboard: {}", e);
                return;
            }
        };

        info!("🏆 TOP CREATORS");
        if creators.is_empty() {
            info!("   (no repeat creators yet)");
            return;
        }
        for (rank, creator) in creators.iter().enumerate() {
            info!(
                "   {:>2}. {} | score {:.1} | tokens {} | graduated {} | risk {}",
                rank + 1,
                creator.wallet,
                creator.trust_score,
                creator.tokens_created,
                creator.tokens_graduated,
                creator.risk_level
            );
        }
    }

    /// Log a snapshot every `every` until stopped
    pub async fn run(&self, every: Duration, stop: StopHandle) {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop.stopped() => break,
                _ = ticker.tick() => self.log_snapshot(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ExitReason, NewTrade, SqliteLedger};

    #[test]
    fn test_snapshot_from_ledger() {
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        ledger.init_portfolio(1.0).unwrap();
        let trade = NewTrade {
            mint: "M1".to_string(),
            creator: "C".to_string(),
            entry_price: 1.0,
            entry_market_cap: 30_000.0,
            amount_sol: 0.1,
            creator_score: 50.0,
        };
        let id = ledger.open_trade(&trade).unwrap().id;
        ledger.close_trade(id, 0.5, ExitReason::StopLoss).unwrap();

        let reporter = StatusReporter::new(ledger, 5);
        let status = reporter.snapshot().unwrap();
        assert_eq!(status.total_trades, 1);
        assert_eq!(status.losses, 1);
        assert_eq!(status.win_rate, 0.0);
        assert_eq!(status.open_positions, 0);
        assert!((status.balance_sol - 0.95).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_run_stops() {
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        let reporter = StatusReporter::new(ledger, 5);
        let stop = StopHandle::new();
        stop.stop();
        tokio::time::timeout(Duration::from_secs(1), reporter.run(Duration::from_millis(10), stop))
            .await
            .unwrap();
    }
}
