// Paper position lifecycle: entry rules, sizing, open, exit rules, close

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::TradingConfig;
use crate::control::{ControlPlane, ControlSnapshot};
use crate::core::sizing::position_size;
use crate::core::types::{EntryRejection, ExitReason, NewTokenEvent, OpenPosition};
use crate::db::{ClosedTrade, Ledger, NewTrade};
use crate::error::{TradingError, TradingResult};

/// Compiled-in trading defaults; control overrides sit on top per decision
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub initial_balance: f64,
    pub max_position_size: f64,
    pub max_open_positions: usize,
    pub stop_loss_percent: f64,
    pub take_profit_percent: f64,
    pub min_creator_score: f64,
    pub min_creator_tokens: u32,
    pub entry_price: f64,
    pub entry_market_cap: f64,
}

impl From<&TradingConfig> for EngineSettings {
    fn from(config: &TradingConfig) -> Self {
        Self {
            initial_balance: config.initial_balance,
            max_position_size: config.max_position_size,
            max_open_positions: config.max_open_positions,
            stop_loss_percent: config.stop_loss_percent,
            take_profit_percent: config.take_profit_percent,
            min_creator_score: config.min_creator_score,
            min_creator_tokens: config.min_creator_tokens,
            entry_price: config.entry_price,
            entry_market_cap: config.entry_market_cap,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&TradingConfig::default())
    }
}

pub struct PositionEngine {
    ledger: Arc<dyn Ledger>,
    control: Arc<ControlPlane>,
    settings: EngineSettings,
    positions: HashMap<String, OpenPosition>,
    last_prices: HashMap<String, f64>,
}

impl PositionEngine {
    pub fn new(ledger: Arc<dyn Ledger>, control: Arc<ControlPlane>, settings: EngineSettings) -> Self {
        Self {
            ledger,
            control,
            settings,
            positions: HashMap::new(),
            last_prices: HashMap::new(),
        }
    }

    /// Create the portfolio if needed and rebuild the index from open trades.
    /// The last stored token price seeds the price cache, so an emergency
    /// close right after a restart does not settle at zero.
    pub fn initialize(&mut self) -> TradingResult<usize> {
        self.ledger.init_portfolio(self.settings.initial_balance)?;

        self.positions.clear();
        self.last_prices.clear();
        for trade in self.ledger.get_open_trades()? {
            if let Some(token) = self.ledger.find_token(&trade.mint)? {
                if token.current_price > 0.0 {
                    self.last_prices.insert(trade.mint.clone(), token.current_price);
                }
            }
            self.positions.insert(
                trade.mint.clone(),
                OpenPosition {
                    trade_id: trade.id,
                    mint: trade.mint,
                    creator: trade.creator,
                    entry_price: trade.entry_price,
                    amount_sol: trade.amount_sol,
                    creator_score: trade.creator_score,
                    entry_time: trade.entry_time,
                },
            );
        }

        info!("📂 Restored {} open positions", self.positions.len());
        Ok(self.positions.len())
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    pub fn has_position(&self, mint: &str) -> bool {
        self.positions.contains_key(mint)
    }

    pub fn position(&self, mint: &str) -> Option<&OpenPosition> {
        self.positions.get(mint)
    }

    pub fn open_mints(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    pub fn last_price(&self, mint: &str) -> Option<f64> {
        self.last_prices.get(mint).copied()
    }

    /// Current paper balance; 0 when the ledger cannot say
    pub fn available_balance(&self) -> f64 {
        match self.ledger.get_portfolio() {
            Ok(Some(portfolio)) => portfolio.balance_sol,
            Ok(None) => 0.0,
            Err(e) => {
                error!("💥 Failed to read portfolio: {}", e);
                0.0
            }
        }
    }

    /// Run the entry rules and return the size to open, or the first rule that failed
    pub fn assess(&self, event: &NewTokenEvent) -> Result<f64, EntryRejection> {
        let snapshot = self.control.snapshot();
        self.assess_with(&snapshot, event)
    }

    pub fn evaluate(&self, event: &NewTokenEvent) -> bool {
        self.assess(event).is_ok()
    }

    fn assess_with(&self, snapshot: &ControlSnapshot, event: &NewTokenEvent) -> Result<f64, EntryRejection> {
        if !snapshot.trading_enabled() {
            return Err(EntryRejection::TradingDisabled);
        }
        if snapshot.pause_new_trades() {
            return Err(EntryRejection::Paused);
        }

        if event.creator_blacklisted || snapshot.is_blacklisted(&event.creator) {
            return Err(EntryRejection::CreatorBlacklisted);
        }
        if !snapshot.is_allowed(&event.creator) {
            return Err(EntryRejection::CreatorNotWhitelisted);
        }

        let min_score = snapshot.min_creator_score(self.settings.min_creator_score);
        if event.creator_score < min_score {
            return Err(EntryRejection::ScoreTooLow { score: event.creator_score, min: min_score });
        }

        let min_tokens = snapshot.min_creator_tokens(self.settings.min_creator_tokens);
        if event.creator_tokens < min_tokens {
            return Err(EntryRejection::TooFewTokens { tokens: event.creator_tokens, min: min_tokens });
        }

        if self.positions.len() >= self.settings.max_open_positions {
            return Err(EntryRejection::MaxPositions {
                open: self.positions.len(),
                max: self.settings.max_open_positions,
            });
        }

        if self.positions.contains_key(&event.mint) {
            return Err(EntryRejection::AlreadyOpen);
        }

        let size = position_size(
            event.creator_score,
            self.settings.max_position_size,
            snapshot.max_position_size(),
        );
        let available = self.available_balance();
        if available < size {
            return Err(EntryRejection::InsufficientBalance { required: size, available });
        }

        Ok(size)
    }

    /// Evaluate and open as one step. Callers hold the engine lock across both.
    pub fn try_enter(&mut self, event: &NewTokenEvent) -> TradingResult<Option<OpenPosition>> {
        match self.assess(event) {
            Ok(size) => self.open_position(event, size).map(Some),
            Err(rejection) => {
                debug!("⏭️  Skipping {} ({}): {}", event.symbol, event.mint, rejection);
                Ok(None)
            }
        }
    }

    /// Persist an open trade at the simulated entry price and index it
    pub fn open_position(&mut self, event: &NewTokenEvent, size: f64) -> TradingResult<OpenPosition> {
        if self.positions.contains_key(&event.mint) {
            return Err(TradingError::DuplicatePosition(event.mint.clone()));
        }
        if size <= 0.0 {
            return Err(TradingError::InvalidParameter(
                "size".to_string(),
                "must be positive".to_string(),
            ));
        }

        let available = self.available_balance();
        if available < size {
            return Err(TradingError::InsufficientFunds(size, available));
        }

        let trade = NewTrade {
            mint: event.mint.clone(),
            creator: event.creator.clone(),
            entry_price: self.settings.entry_price,
            entry_market_cap: self.settings.entry_market_cap,
            amount_sol: size,
            creator_score: event.creator_score,
        };
        let stored = self.ledger.open_trade(&trade)?;
        let trade_id = stored.id;

        let position = OpenPosition {
            trade_id,
            mint: stored.mint,
            creator: stored.creator,
            entry_price: stored.entry_price,
            amount_sol: stored.amount_sol,
            creator_score: stored.creator_score,
            entry_time: stored.entry_time,
        };
        self.positions.insert(event.mint.clone(), position.clone());

        info!(
            "🟢 OPEN #{} {} ({}) {:.4} SOL @ {:.9} | creator score {:.1}",
            trade_id, event.symbol, event.mint, size, position.entry_price, event.creator_score
        );
        Ok(position)
    }

    /// Merge `prices` into the last-known cache and close whatever hits a threshold.
    ///
    /// With the emergency flag set every open position is closed at its last
    /// known price (0 if none) and no threshold is evaluated.
    pub fn check_exits(&mut self, prices: &HashMap<String, f64>) -> Vec<ClosedTrade> {
        for (mint, price) in prices {
            self.last_prices.insert(mint.clone(), *price);
        }

        let snapshot = self.control.snapshot();
        let mut exits: Vec<(String, f64, ExitReason)> = Vec::new();

        if snapshot.close_all_positions() {
            for mint in self.positions.keys() {
                let price = self.last_prices.get(mint).copied().unwrap_or(0.0);
                exits.push((mint.clone(), price, ExitReason::EmergencyClose));
            }
            if !exits.is_empty() {
                warn!("🚨 Emergency close requested for {} positions", exits.len());
            }
        } else {
            let stop_loss = snapshot.stop_loss_percent(self.settings.stop_loss_percent);
            let take_profit = snapshot.take_profit_percent(self.settings.take_profit_percent);

            for (mint, position) in &self.positions {
                let price = match self.last_prices.get(mint) {
                    Some(price) => *price,
                    None => continue,
                };
                let change = position.change_percent(price);

                if change <= -stop_loss {
                    exits.push((mint.clone(), price, ExitReason::StopLoss));
                } else if change >= take_profit {
                    exits.push((mint.clone(), price, ExitReason::TakeProfit));
                }
            }
        }

        let mut closed = Vec::new();
        for (mint, price, reason) in exits {
            match self.close_position(&mint, price, reason) {
                Ok(Some(trade)) => closed.push(trade),
                Ok(None) => {}
                Err(e) => error!("💥 Failed to close {} ({}): {}; will retry", mint, reason, e),
            }
        }
        closed
    }

    /// Close a tracked position. Untracked mints are a no-op.
    ///
    /// On a ledger error the position stays indexed so a later pass retries.
    pub fn close_position(
        &mut self,
        mint: &str,
        exit_price: f64,
        reason: ExitReason,
    ) -> TradingResult<Option<ClosedTrade>> {
        let trade_id = match self.positions.get(mint) {
            Some(position) => position.trade_id,
            None => return Ok(None),
        };

        let result = self.ledger.close_trade(trade_id, exit_price, reason)?;
        self.positions.remove(mint);
        self.last_prices.remove(mint);

        match &result {
            Some(trade) => {
                let icon = if trade.profit_sol > 0.0 { "🟩" } else { "🟥" };
                info!(
                    "{} CLOSE #{} {} [{}] {:+.4} SOL ({:+.1}%) after {}s",
                    icon, trade.trade_id, mint, reason, trade.profit_sol, trade.profit_percent, trade.hold_seconds
                );
            }
            None => warn!("⚠️  Trade #{} for {} was already closed in the ledger", trade_id, mint),
        }
        Ok(result)
    }
}
