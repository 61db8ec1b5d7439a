//! Hot-reloadable risk controls
//!
//! Operators steer a running bot by editing a small JSON object file. Every
//! read goes back to the source, so edits take effect on the next decision
//! without a restart. A source that cannot be read or parsed never wipes the
//! active settings: the last snapshot that loaded cleanly stays in force.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

pub type ControlMap = Map<String, Value>;

pub const TRADING_ENABLED: &str = "trading_enabled";
pub const PAUSE_NEW_TRADES: &str = "pause_new_trades";
pub const BLACKLIST_CREATORS: &str = "blacklist_creators";
pub const WHITELIST_CREATORS: &str = "whitelist_creators";
pub const MIN_CREATOR_SCORE: &str = "min_creator_score";
pub const MIN_CREATOR_TOKENS: &str = "min_creator_tokens";
pub const MAX_POSITION_SIZE: &str = "max_position_size";
pub const STOP_LOSS_PERCENT: &str = "stop_loss_percent";
pub const TAKE_PROFIT_PERCENT: &str = "take_profit_percent";
pub const CLOSE_ALL_POSITIONS: &str = "close_all_positions";

/// Every key the engine reads
pub const KNOWN_KEYS: &[&str] = &[
    TRADING_ENABLED,
    PAUSE_NEW_TRADES,
    BLACKLIST_CREATORS,
    WHITELIST_CREATORS,
    MIN_CREATOR_SCORE,
    MIN_CREATOR_TOKENS,
    MAX_POSITION_SIZE,
    STOP_LOSS_PERCENT,
    TAKE_PROFIT_PERCENT,
    CLOSE_ALL_POSITIONS,
];

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Failed to read control source: {0}")]
    Read(String),

    #[error("Failed to parse control source: {0}")]
    Parse(String),

    #[error("Control source must hold a JSON object")]
    NotAnObject,

    #[error("Control file is empty")]
    Empty,

    #[error("Failed to write control source: {0}")]
    Write(String),
}

/// Where override values come from
pub trait ControlSource: Send + Sync {
    /// Load the full override map. An absent source is an empty map, not an
    /// error; an empty or unparseable one is an error.
    fn load(&self) -> Result<ControlMap, ControlError>;

    fn describe(&self) -> String;
}

/// JSON object file on disk
#[derive(Debug, Clone)]
pub struct FileControlSource {
    path: PathBuf,
}

impl FileControlSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set one override and rewrite the file
    pub fn set(&self, key: &str, value: Value) -> Result<(), ControlError> {
        let mut map = self.load_for_edit()?;
        map.insert(key.to_string(), value);
        self.write(&map)
    }

    /// Remove one override. Returns false when the key was not present.
    pub fn clear(&self, key: &str) -> Result<bool, ControlError> {
        let mut map = self.load_for_edit()?;
        let removed = map.remove(key).is_some();
        if removed {
            self.write(&map)?;
        }
        Ok(removed)
    }

    /// Write an empty override object
    pub fn reset(&self) -> Result<(), ControlError> {
        self.write(&ControlMap::new())
    }

    /// Current map for a CLI edit. An empty file is edited as an empty map;
    /// anything unparseable is refused rather than overwritten.
    fn load_for_edit(&self) -> Result<ControlMap, ControlError> {
        match self.load() {
            Err(ControlError::Empty) => Ok(ControlMap::new()),
            other => other,
        }
    }

    /// Write a sibling temp file and rename it over the target, so readers
    /// only ever see the old or the new contents
    fn write(&self, map: &ControlMap) -> Result<(), ControlError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ControlError::Write(e.to_string()))?;
            }
        }
        let content = serde_json::to_string_pretty(map)
            .map_err(|e| ControlError::Write(e.to_string()))?;

        let tmp = self.temp_path();
        fs::write(&tmp, content).map_err(|e| ControlError::Write(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            ControlError::Write(e.to_string())
        })
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "control.json".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}

impl ControlSource for FileControlSource {
    fn load(&self) -> Result<ControlMap, ControlError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ControlMap::new()),
            Err(e) => return Err(ControlError::Read(e.to_string())),
        };

        // Editors truncate before writing; an empty file is never "no overrides"
        if content.trim().is_empty() {
            return Err(ControlError::Empty);
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ControlError::NotAnObject),
            Err(e) => Err(ControlError::Parse(e.to_string())),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory source, mutable from tests and embedding code
#[derive(Debug, Default)]
pub struct StaticControlSource {
    values: RwLock<ControlMap>,
    failing: AtomicBool,
}

impl StaticControlSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: ControlMap) -> Self {
        Self { values: RwLock::new(values), failing: AtomicBool::new(false) }
    }

    pub fn set(&self, key: &str, value: Value) {
        let mut values = self.values.write().unwrap_or_else(|p| p.into_inner());
        values.insert(key.to_string(), value);
    }

    pub fn remove(&self, key: &str) {
        let mut values = self.values.write().unwrap_or_else(|p| p.into_inner());
        values.remove(key);
    }

    /// Make subsequent loads fail, as an unreadable file would
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl ControlSource for StaticControlSource {
    fn load(&self) -> Result<ControlMap, ControlError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ControlError::Read("static source marked failing".to_string()));
        }
        let values = self.values.read().unwrap_or_else(|p| p.into_inner());
        Ok(values.clone())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

/// Live view over a control source with last-known-good fallback
pub struct ControlPlane {
    source: Arc<dyn ControlSource>,
    last_good: Mutex<ControlMap>,
}

impl ControlPlane {
    pub fn new(source: Arc<dyn ControlSource>) -> Self {
        Self { source, last_good: Mutex::new(ControlMap::new()) }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        Self::new(Arc::new(FileControlSource::new(path)))
    }

    /// Single override, re-read from the source on every call
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.snapshot().get(key, default)
    }

    /// Read the source once; a whole decision should use one snapshot
    pub fn snapshot(&self) -> ControlSnapshot {
        let mut last_good = self.last_good.lock().unwrap_or_else(|p| p.into_inner());
        match self.source.load() {
            Ok(values) => {
                *last_good = values.clone();
                ControlSnapshot::new(values)
            }
            Err(e) => {
                warn!(
                    "⚠️  Control source {} unusable ({}), keeping last good settings",
                    self.source.describe(),
                    e
                );
                ControlSnapshot::new(last_good.clone())
            }
        }
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }
}

/// Overrides as they stood at one instant
#[derive(Debug, Clone, Default)]
pub struct ControlSnapshot {
    values: ControlMap,
}

impl ControlSnapshot {
    pub fn new(values: ControlMap) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &ControlMap {
        &self.values
    }

    /// Typed lookup; missing or malformed values fall back to `default`
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get_opt(key).unwrap_or(default)
    }

    /// Typed lookup without a default. A malformed value logs and reads as absent.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.values.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => match serde_json::from_value::<T>(value.clone()) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!("⚠️  Ignoring malformed control value {}={} ({})", key, value, e);
                    None
                }
            },
        }
    }

    /// Typed lookup that also has to pass `valid`; out-of-range values log and
    /// read as absent
    fn get_checked<T>(&self, key: &str, valid: fn(&T) -> bool, expected: &str) -> Option<T>
    where
        T: DeserializeOwned + std::fmt::Display,
    {
        let value = self.get_opt::<T>(key)?;
        if valid(&value) {
            Some(value)
        } else {
            warn!("⚠️  Ignoring out-of-range control value {}={} (expected {})", key, value, expected);
            None
        }
    }

    pub fn trading_enabled(&self) -> bool {
        self.get(TRADING_ENABLED, true)
    }

    pub fn pause_new_trades(&self) -> bool {
        self.get(PAUSE_NEW_TRADES, false)
    }

    pub fn blacklist(&self) -> Vec<String> {
        self.get(BLACKLIST_CREATORS, Vec::new())
    }

    pub fn whitelist(&self) -> Vec<String> {
        self.get(WHITELIST_CREATORS, Vec::new())
    }

    pub fn is_blacklisted(&self, creator: &str) -> bool {
        self.blacklist().iter().any(|c| c == creator)
    }

    /// An empty allow-list admits everyone
    pub fn is_allowed(&self, creator: &str) -> bool {
        let whitelist = self.whitelist();
        whitelist.is_empty() || whitelist.iter().any(|c| c == creator)
    }

    pub fn min_creator_score(&self, default: f64) -> f64 {
        self.get_checked(MIN_CREATOR_SCORE, |v: &f64| v.is_finite() && *v >= 0.0, ">= 0")
            .unwrap_or(default)
    }

    pub fn min_creator_tokens(&self, default: u32) -> u32 {
        self.get(MIN_CREATOR_TOKENS, default)
    }

    pub fn max_position_size(&self) -> Option<f64> {
        self.get_checked(MAX_POSITION_SIZE, |v: &f64| v.is_finite() && *v > 0.0, "> 0")
    }

    pub fn stop_loss_percent(&self, default: f64) -> f64 {
        self.get_checked(
            STOP_LOSS_PERCENT,
            |v: &f64| *v > 0.0 && *v <= 100.0,
            "in (0, 100]",
        )
        .unwrap_or(default)
    }

    pub fn take_profit_percent(&self, default: f64) -> f64 {
        self.get_checked(TAKE_PROFIT_PERCENT, |v: &f64| v.is_finite() && *v > 0.0, "> 0")
            .unwrap_or(default)
    }

    pub fn close_all_positions(&self) -> bool {
        self.get(CLOSE_ALL_POSITIONS, false)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
