// Common test utilities and helpers
#![allow(dead_code)]

use chrono::Utc;
use paper_sniper::core::{EngineSettings, NewTokenEvent, PositionEngine};
use paper_sniper::{Config, ControlPlane, SqliteLedger, StaticControlSource};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Create a test configuration with sensible defaults
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.feed.ws_url = "ws://127.0.0.1:1".to_string();
    config.database.db_path = ":memory:".to_string();
    config.trading.entry_price = 1.0;
    config
}

/// Create a temporary directory for test databases
pub fn create_temp_db_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");
    (temp_dir, db_path)
}

/// Engine settings with an entry price of 1.0 so percent moves are easy to read
pub fn test_settings() -> EngineSettings {
    EngineSettings {
        entry_price: 1.0,
        ..EngineSettings::default()
    }
}

pub struct TestHarness {
    pub engine: PositionEngine,
    pub ledger: Arc<SqliteLedger>,
    pub control: Arc<StaticControlSource>,
}

/// Initialized engine over an in-memory ledger and a mutable control source
pub fn create_engine(settings: EngineSettings) -> TestHarness {
    let ledger = Arc::new(SqliteLedger::in_memory().expect("in-memory ledger"));
    let control = Arc::new(StaticControlSource::new());
    let plane = Arc::new(ControlPlane::new(control.clone()));
    let mut engine = PositionEngine::new(ledger.clone(), plane, settings);
    engine.initialize().expect("engine initialize");
    TestHarness { engine, ledger, control }
}

pub fn token_event(mint: &str, creator: &str, score: f64, tokens: u32) -> NewTokenEvent {
    NewTokenEvent {
        mint: mint.to_string(),
        name: format!("Token {}", mint),
        symbol: mint.chars().take(4).collect(),
        creator: creator.to_string(),
        uri: None,
        creator_tokens: tokens,
        creator_score: score,
        creator_blacklisted: false,
        timestamp: Utc::now(),
    }
}

/// Launch frame as the feed sends it
pub fn create_frame(mint: &str, creator: &str) -> String {
    serde_json::json!({
        "signature": "sig",
        "mint": mint,
        "traderPublicKey": creator,
        "txType": "create",
        "name": "Test Token",
        "symbol": "TEST",
        "uri": "https://example.invalid/meta.json",
        "marketCapSol": 30.0
    })
    .to_string()
}

/// Trade frame priced at `sol / tokens`
pub fn trade_frame(mint: &str, sol: f64, tokens: f64) -> String {
    serde_json::json!({
        "signature": "sig",
        "mint": mint,
        "traderPublicKey": "trader",
        "txType": "buy",
        "solAmount": sol,
        "tokenAmount": tokens,
        "marketCapSol": 31.0
    })
    .to_string()
}

/// Random walk of prices around `base_price`
pub fn generate_test_prices(base_price: f64, count: usize, volatility: f64) -> Vec<f64> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let mut prices = Vec::with_capacity(count);
    let mut current_price = base_price;

    for _ in 0..count {
        let change_pct = rng.gen_range(-volatility..volatility);
        current_price *= 1.0 + change_pct;
        prices.push(current_price);
    }

    prices
}
