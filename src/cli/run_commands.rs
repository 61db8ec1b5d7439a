// Run, collect, status, init and blacklist command implementations
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

use paper_sniper::clients::{StopHandle, StreamClient, StreamSettings};
use paper_sniper::core::{run_exit_sweep, EngineSettings, EventDispatcher, PositionEngine, StatusReporter, StoredScoreScorer};
use paper_sniper::{Config, ControlPlane, FileControlSource, Ledger, SqliteLedger, TradingResult};

/// Stream the feed until Ctrl+C. Without `trade` only the ledger is fed.
pub async fn run_bot(config: &Config, trade: bool) -> TradingResult<()> {
    if trade {
        info!("🧪 PAPER TRADING mode (no real funds)");
    } else {
        info!("📥 COLLECT mode (no trading)");
    }
    info!("🔗 Feed: {}", config.feed.ws_url);
    info!("💾 Database: {}", config.database.db_path);

    let ledger: Arc<dyn Ledger> = Arc::new(SqliteLedger::open(&config.database.db_path)?);
    let stop = StopHandle::new();
    let mut client = StreamClient::new(StreamSettings::from(&config.feed)).with_stop_handle(stop.clone());
    let mut dispatcher = EventDispatcher::new(Arc::clone(&ledger), Arc::new(StoredScoreScorer));
    let mut reporter = StatusReporter::new(Arc::clone(&ledger), config.trading.max_open_positions);
    let mut tasks = Vec::new();

    if trade {
        info!("🎛️  Control file: {}", config.control.path);
        let control = Arc::new(ControlPlane::from_file(&config.control.path));
        let mut engine = PositionEngine::new(
            Arc::clone(&ledger),
            control,
            EngineSettings::from(&config.trading),
        );
        engine.initialize()?;
        let open_mints = engine.open_mints();
        let engine = Arc::new(Mutex::new(engine));

        let commands = if config.feed.track_position_trades {
            client.watch_initial(open_mints);
            Some(client.command_channel())
        } else {
            None
        };

        dispatcher = dispatcher.with_engine(Arc::clone(&engine));
        if let Some(commands) = &commands {
            dispatcher = dispatcher.with_commands(commands.clone());
        }
        reporter = reporter.with_engine(Arc::clone(&engine));

        tasks.push(tokio::spawn(run_exit_sweep(
            engine,
            Duration::from_secs(config.monitoring.exit_sweep_interval_secs),
            stop.clone(),
            commands,
        )));
    }

    reporter.log_snapshot();
    let reporter = Arc::new(reporter);
    {
        let reporter = Arc::clone(&reporter);
        let every = Duration::from_secs(config.monitoring.status_interval_secs);
        let stop = stop.clone();
        tasks.push(tokio::spawn(async move { reporter.run(every, stop).await }));
    }

    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("");
                info!("🛑 Ctrl+C received, shutting down...");
                stop.stop();
            }
        });
    }

    client.run(&mut dispatcher).await;
    stop.stop();
    for task in tasks {
        let _ = task.await;
    }

    let dispatch = dispatcher.stats();
    let stream = client.stats();
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        "📡 Frames: {} | Tokens collected: {} | Duplicates: {} | Price updates: {} | Dropped: {}",
        dispatch.frames_seen, dispatch.tokens_collected, dispatch.duplicates, dispatch.price_updates, dispatch.dropped_frames
    );
    info!(
        "🔌 Connects: {} | Failed: {} | Disconnects: {} | Keep-alive timeouts: {}",
        stream.connects, stream.connect_failures, stream.disconnects, stream.keepalive_timeouts
    );
    if trade {
        info!("🎯 Entries: {} | Exits: {}", dispatch.entries, dispatch.exits);
    }
    reporter.log_snapshot();

    Ok(())
}

pub fn show_status(config: &Config, top: usize) -> TradingResult<()> {
    let ledger = Arc::new(SqliteLedger::open(&config.database.db_path)?);

    let reporter = StatusReporter::new(ledger.clone(), config.trading.max_open_positions);
    reporter.log_snapshot();

    let open = ledger.get_open_trades()?;
    if !open.is_empty() {
        info!("📂 OPEN POSITIONS");
        for trade in &open {
            info!(
                "   #{} {} | {:.4} SOL @ {:.9} | since {}",
                trade.id, trade.mint, trade.amount_sol, trade.entry_price, trade.entry_time
            );
        }
    }

    reporter.log_leaderboard(top);
    Ok(())
}

pub fn blacklist(config: &Config, wallet: &str, reason: &str) -> TradingResult<()> {
    let ledger = SqliteLedger::open(&config.database.db_path)?;
    ledger.blacklist_creator(wallet, reason)?;
    info!("⛔ Blacklisted {} ({})", wallet, reason);
    Ok(())
}

pub fn init_workspace(config_path: &str, force: bool) -> TradingResult<()> {
    info!("🔧 Initializing workspace...");

    let config = if Path::new(config_path).exists() && !force {
        warn!("⚠️  {} already exists, skipping", config_path);
        Config::from_file(config_path)?
    } else {
        let config = Config::default();
        config.to_file(config_path)?;
        info!("📝 Created {}", config_path);
        config
    };

    let control = FileControlSource::new(&config.control.path);
    if control.path().exists() && !force {
        warn!("⚠️  {} already exists, skipping", config.control.path);
    } else {
        control.reset()?;
        info!("📝 Created {}", config.control.path);
    }

    if let Some(parent) = Path::new(&config.database.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    info!("✅ Workspace initialized successfully!");
    info!("💡 Next steps:");
    info!("   1. Review config.toml");
    info!("   2. Run: paper-sniper collect   (build creator history first)");
    info!("   3. Run: paper-sniper run");
    info!("   4. Steer live with: paper-sniper control set pause_new_trades true");

    Ok(())
}
