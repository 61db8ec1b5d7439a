// Frame classification and routing

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::clients::messages::{self, FrameKind};
use crate::clients::{FeedCommand, FrameHandler};
use crate::core::position_engine::PositionEngine;
use crate::core::scoring::CreatorScorer;
use crate::core::types::NewTokenEvent;
use crate::db::{ClosedTrade, Ledger};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchStats {
    pub frames_seen: u64,
    pub tokens_collected: u64,
    pub duplicates: u64,
    pub price_updates: u64,
    pub dropped_frames: u64,
    pub entries: u64,
    pub exits: u64,
}

pub struct EventDispatcher {
    ledger: Arc<dyn Ledger>,
    scorer: Arc<dyn CreatorScorer>,
    engine: Option<Arc<Mutex<PositionEngine>>>,
    commands: Option<UnboundedSender<FeedCommand>>,
    stats: DispatchStats,
}

impl EventDispatcher {
    /// Collect-only dispatcher; attach an engine to trade
    pub fn new(ledger: Arc<dyn Ledger>, scorer: Arc<dyn CreatorScorer>) -> Self {
        Self {
            ledger,
            scorer,
            engine: None,
            commands: None,
            stats: DispatchStats::default(),
        }
    }

    pub fn with_engine(mut self, engine: Arc<Mutex<PositionEngine>>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Send trade (un)subscriptions for opened and closed positions
    pub fn with_commands(mut self, commands: UnboundedSender<FeedCommand>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Decode one raw frame and route it
    pub fn dispatch(&mut self, raw: &str) {
        self.stats.frames_seen += 1;

        let frame: Value = match serde_json::from_str(raw) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => {
                self.drop_frame("not a JSON object", raw);
                return;
            }
            Err(e) => {
                self.drop_frame(&format!("invalid JSON: {}", e), raw);
                return;
            }
        };

        match messages::classify(&frame) {
            FrameKind::NewToken => self.handle_new_token(&frame),
            FrameKind::Trade => self.handle_trade(&frame),
            FrameKind::Other => debug!("ignoring feed message: {}", raw),
        }
    }

    fn drop_frame(&mut self, reason: &str, raw: &str) {
        self.stats.dropped_frames += 1;
        warn!("⚠️  Dropping frame ({}): {:.120}", reason, raw);
    }

    fn handle_new_token(&mut self, frame: &Value) {
        let token = match messages::parse_new_token(frame) {
            Some(token) => token,
            None => {
                self.stats.dropped_frames += 1;
                warn!("⚠️  Launch frame without mint or creator");
                return;
            }
        };

        let already_known = match self.ledger.add_token(
            &token.mint,
            &token.name,
            &token.symbol,
            &token.creator,
            token.uri.as_deref(),
        ) {
            Ok(known) => known,
            Err(e) => {
                error!("💥 Failed to store token {}: {}", token.mint, e);
                return;
            }
        };

        if already_known {
            self.stats.duplicates += 1;
            debug!("duplicate launch frame for {}", token.mint);
            return;
        }
        self.stats.tokens_collected += 1;

        let creator = match self.ledger.get_creator(&token.creator) {
            Ok(creator) => creator,
            Err(e) => {
                error!("💥 Failed to load creator {}: {}", token.creator, e);
                None
            }
        };

        let creator_tokens = creator
            .as_ref()
            .map(|c| c.tokens_created.max(0) as u32)
            .unwrap_or(1);
        let event = NewTokenEvent {
            mint: token.mint,
            name: token.name,
            symbol: token.symbol,
            creator: token.creator,
            uri: token.uri,
            creator_tokens,
            creator_score: self.scorer.score(creator.as_ref()),
            creator_blacklisted: creator.as_ref().map(|c| c.is_blacklisted).unwrap_or(false),
            timestamp: Utc::now(),
        };

        info!(
            "🆕 {} ({}) by {} | tokens: {} | score: {:.1}",
            event.symbol, event.mint, event.creator, event.creator_tokens, event.creator_score
        );

        let shared = match &self.engine {
            Some(engine) => Arc::clone(engine),
            None => return,
        };
        let mut engine = match lock_engine(&shared) {
            Some(engine) => engine,
            None => return,
        };

        match engine.try_enter(&event) {
            Ok(Some(position)) => {
                self.stats.entries += 1;
                self.send(FeedCommand::WatchMint(position.mint));
            }
            Ok(None) => {}
            Err(e) => error!("💥 Failed to open {}: {}", event.mint, e),
        }
    }

    fn handle_trade(&mut self, frame: &Value) {
        let trade = match messages::parse_trade(frame) {
            Some(trade) => trade,
            None => {
                self.stats.dropped_frames += 1;
                debug!("trade frame without mint or positive amounts");
                return;
            }
        };

        if let Err(e) = self.ledger.update_token_price(&trade.mint, trade.price, trade.market_cap_sol) {
            error!("💥 Failed to store price for {}: {}", trade.mint, e);
            return;
        }
        self.stats.price_updates += 1;

        let shared = match &self.engine {
            Some(engine) => Arc::clone(engine),
            None => return,
        };
        let closed = match lock_engine(&shared) {
            Some(mut engine) => engine.check_exits(&HashMap::from([(trade.mint, trade.price)])),
            None => return,
        };
        self.record_exits(&closed);
    }

    /// Count closes and drop their trade subscriptions
    pub fn record_exits(&mut self, closed: &[ClosedTrade]) {
        for trade in closed {
            self.stats.exits += 1;
            self.send(FeedCommand::UnwatchMint(trade.mint.clone()));
        }
    }

    fn send(&self, command: FeedCommand) {
        if let Some(commands) = &self.commands {
            if commands.send(command).is_err() {
                debug!("feed command channel closed");
            }
        }
    }
}

impl FrameHandler for EventDispatcher {
    fn handle_frame(&mut self, frame: &str) {
        self.dispatch(frame);
    }
}

pub(crate) fn lock_engine(engine: &Mutex<PositionEngine>) -> Option<MutexGuard<'_, PositionEngine>> {
    match engine.lock() {
        Ok(guard) => Some(guard),
        Err(e) => {
            error!("💥 Position engine lock poisoned: {}", e);
            None
        }
    }
}
