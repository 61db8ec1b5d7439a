// Control file command implementations
use serde_json::Value;
use tracing::{info, warn};

use paper_sniper::control::{ControlSource, FileControlSource, KNOWN_KEYS};
use paper_sniper::{Config, TradingError, TradingResult};

pub fn show(config: &Config) -> TradingResult<()> {
    let source = FileControlSource::new(&config.control.path);
    let values = source.load()?;

    info!("🎛️  Control file: {}", config.control.path);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for key in KNOWN_KEYS {
        match values.get(*key) {
            Some(value) => info!("   {:<22} {}", key, value),
            None => info!("   {:<22} (default)", key),
        }
    }
    for (key, value) in &values {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            warn!("   {:<22} {}  ⚠️  unknown key, ignored", key, value);
        }
    }
    Ok(())
}

pub fn set(config: &Config, key: &str, raw: &str) -> TradingResult<()> {
    if !KNOWN_KEYS.contains(&key) {
        return Err(TradingError::InvalidParameter(
            key.to_string(),
            format!("unknown control key, expected one of: {}", KNOWN_KEYS.join(", ")),
        ));
    }

    let value = parse_value(raw);
    let source = FileControlSource::new(&config.control.path);
    source.set(key, value.clone())?;
    info!("✅ {} = {} (takes effect on the next decision)", key, value);
    Ok(())
}

pub fn clear(config: &Config, key: &str) -> TradingResult<()> {
    let source = FileControlSource::new(&config.control.path);
    if source.clear(key)? {
        info!("✅ Cleared {}", key);
    } else {
        warn!("⚠️  {} was not set", key);
    }
    Ok(())
}

/// JSON if it parses, otherwise the raw text as a string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
