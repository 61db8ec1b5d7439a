// Configuration management for the paper sniper

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

pub const DEFAULT_WS_URL: &str = "wss://pumpportal.fun/api/data";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_connect_retry")]
    pub connect_retry_secs: u64,     // Wait after a failed connect
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,   // Wait after losing an established session
    #[serde(default = "default_true")]
    pub track_position_trades: bool, // Subscribe to trade frames for held mints
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "default_initial_balance")]
    pub initial_balance: f64,
    #[serde(default = "default_max_position_size")]
    pub max_position_size: f64,
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    #[serde(default = "default_stop_loss")]
    pub stop_loss_percent: f64,
    #[serde(default = "default_take_profit")]
    pub take_profit_percent: f64,
    #[serde(default = "default_min_creator_score")]
    pub min_creator_score: f64,
    #[serde(default = "default_min_creator_tokens")]
    pub min_creator_tokens: u32,
    #[serde(default = "default_entry_price")]
    pub entry_price: f64,       // Simulated fill price for every entry
    #[serde(default = "default_entry_market_cap")]
    pub entry_market_cap: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_control_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,
    #[serde(default = "default_exit_sweep_interval")]
    pub exit_sweep_interval_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

// Default value functions
fn default_ws_url() -> String { DEFAULT_WS_URL.to_string() }
fn default_ping_interval() -> u64 { 30 }
fn default_ping_timeout() -> u64 { 10 }
fn default_connect_timeout() -> u64 { 10 }
fn default_connect_retry() -> u64 { 5 }
fn default_reconnect_delay() -> u64 { 2 }
fn default_true() -> bool { true }
fn default_initial_balance() -> f64 { 1.0 }
fn default_max_position_size() -> f64 { 0.1 }
fn default_max_open_positions() -> usize { 5 }
fn default_stop_loss() -> f64 { 25.0 }
fn default_take_profit() -> f64 { 100.0 }
fn default_min_creator_score() -> f64 { 50.0 }
fn default_min_creator_tokens() -> u32 { 2 }
fn default_entry_price() -> f64 { 0.000001 }
fn default_entry_market_cap() -> f64 { 30_000.0 }
fn default_control_path() -> String { "control.json".to_string() }
fn default_db_path() -> String { "data/paper_sniper.db".to_string() }
fn default_status_interval() -> u64 { 300 }
fn default_exit_sweep_interval() -> u64 { 10 }
fn default_log_level() -> String { "info".to_string() }

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            ping_interval_secs: default_ping_interval(),
            ping_timeout_secs: default_ping_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            connect_retry_secs: default_connect_retry(),
            reconnect_delay_secs: default_reconnect_delay(),
            track_position_trades: true,
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            initial_balance: default_initial_balance(),
            max_position_size: default_max_position_size(),
            max_open_positions: default_max_open_positions(),
            stop_loss_percent: default_stop_loss(),
            take_profit_percent: default_take_profit(),
            min_creator_score: default_min_creator_score(),
            min_creator_tokens: default_min_creator_tokens(),
            entry_price: default_entry_price(),
            entry_market_cap: default_entry_market_cap(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { path: default_control_path() }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { db_path: default_db_path() }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            status_interval_secs: default_status_interval(),
            exit_sweep_interval_secs: default_exit_sweep_interval(),
            log_level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            trading: TradingConfig::default(),
            control: ControlConfig::default(),
            database: DatabaseConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            info!("📁 Created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// Override trading settings from the environment.
    ///
    /// Unparseable values are ignored with a warning; the file value stays.
    pub fn apply_env_overrides(&mut self) {
        override_from_env("PAPER_INITIAL_BALANCE", &mut self.trading.initial_balance);
        override_from_env("MAX_POSITION_SIZE", &mut self.trading.max_position_size);
        override_from_env("MAX_OPEN_POSITIONS", &mut self.trading.max_open_positions);
        override_from_env("STOP_LOSS_PERCENT", &mut self.trading.stop_loss_percent);
        override_from_env("TAKE_PROFIT_PERCENT", &mut self.trading.take_profit_percent);
        override_from_env("MIN_CREATOR_SCORE", &mut self.trading.min_creator_score);
        override_from_env("MIN_CREATOR_TOKENS", &mut self.trading.min_creator_tokens);
        override_from_env("LOG_LEVEL", &mut self.monitoring.log_level);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.ws_url.is_empty() {
            return Err(ConfigError::Validation("ws_url must not be empty".to_string()));
        }

        if self.feed.ping_interval_secs == 0 || self.feed.ping_timeout_secs == 0 {
            return Err(ConfigError::Validation("ping intervals must be greater than 0".to_string()));
        }

        if self.feed.ping_timeout_secs >= self.feed.ping_interval_secs {
            return Err(ConfigError::Validation(
                "ping_timeout_secs must be smaller than ping_interval_secs".to_string()
            ));
        }

        if self.feed.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation("connect_timeout_secs must be greater than 0".to_string()));
        }

        // Zero delays would spin the reconnect loop against a dead endpoint
        if self.feed.connect_retry_secs == 0 || self.feed.reconnect_delay_secs == 0 {
            return Err(ConfigError::Validation(
                "connect_retry_secs and reconnect_delay_secs must be greater than 0".to_string()
            ));
        }

        if self.trading.initial_balance <= 0.0 {
            return Err(ConfigError::Validation("initial_balance must be positive".to_string()));
        }

        if self.trading.max_position_size <= 0.0 {
            return Err(ConfigError::Validation("max_position_size must be positive".to_string()));
        }

        if self.trading.max_open_positions == 0 {
            return Err(ConfigError::Validation("max_open_positions must be greater than 0".to_string()));
        }

        if self.trading.stop_loss_percent <= 0.0 || self.trading.stop_loss_percent > 100.0 {
            return Err(ConfigError::Validation("stop_loss_percent must be in (0, 100]".to_string()));
        }

        if self.trading.take_profit_percent <= 0.0 {
            return Err(ConfigError::Validation("take_profit_percent must be positive".to_string()));
        }

        if self.trading.entry_price <= 0.0 {
            return Err(ConfigError::Validation("entry_price must be positive".to_string()));
        }

        if self.monitoring.status_interval_secs == 0 || self.monitoring.exit_sweep_interval_secs == 0 {
            return Err(ConfigError::Validation("monitoring intervals must be greater than 0".to_string()));
        }

        Ok(())
    }
}

fn override_from_env<T: FromStr>(key: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!("⚠️  Ignoring {}={:?}: not a valid value", key, raw),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
