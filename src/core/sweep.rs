// Periodic exit pass against last known prices

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::clients::{FeedCommand, StopHandle};
use crate::core::dispatcher::lock_engine;
use crate::core::position_engine::PositionEngine;
use crate::db::ClosedTrade;

/// One exit pass with no new prices. Picks up control changes (emergency
/// close, tightened thresholds) even when the feed is quiet.
pub fn sweep_once(
    engine: &Mutex<PositionEngine>,
    commands: Option<&UnboundedSender<FeedCommand>>,
) -> Vec<ClosedTrade> {
    let closed = match lock_engine(engine) {
        Some(mut engine) => engine.check_exits(&HashMap::new()),
        None => return Vec::new(),
    };

    if let Some(commands) = commands {
        for trade in &closed {
            let _ = commands.send(FeedCommand::UnwatchMint(trade.mint.clone()));
        }
    }
    if !closed.is_empty() {
        debug!("exit sweep closed {} positions", closed.len());
    }
    closed
}

pub async fn run_exit_sweep(
    engine: Arc<Mutex<PositionEngine>>,
    every: Duration,
    stop: StopHandle,
    commands: Option<UnboundedSender<FeedCommand>>,
) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.stopped() => break,
            _ = ticker.tick() => {
                sweep_once(&engine, commands.as_ref());
            }
        }
    }
}
