// Control plane tests against a real override file

mod common;

use common::{test_settings, token_event};
use paper_sniper::control::{BLACKLIST_CREATORS, CLOSE_ALL_POSITIONS, PAUSE_NEW_TRADES, STOP_LOSS_PERCENT};
use paper_sniper::core::PositionEngine;
use paper_sniper::{ControlPlane, EntryRejection, ExitReason, FileControlSource, Ledger, SqliteLedger};
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn file_plane() -> (TempDir, FileControlSource, Arc<ControlPlane>) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("control.json");
    let source = FileControlSource::new(&path);
    let plane = Arc::new(ControlPlane::from_file(&path));
    (dir, source, plane)
}

#[test]
fn test_missing_file_means_defaults() {
    let (_dir, _source, plane) = file_plane();
    let snapshot = plane.snapshot();

    assert!(snapshot.is_empty());
    assert!(snapshot.trading_enabled());
    assert!(!snapshot.pause_new_trades());
    assert!(snapshot.is_allowed("anyone"));
    assert_eq!(snapshot.stop_loss_percent(25.0), 25.0);
}

#[test]
fn test_edits_are_visible_on_next_read() {
    let (_dir, source, plane) = file_plane();

    source.set(PAUSE_NEW_TRADES, json!(true)).unwrap();
    assert!(plane.snapshot().pause_new_trades());

    source.set(STOP_LOSS_PERCENT, json!(10)).unwrap();
    assert_eq!(plane.get(STOP_LOSS_PERCENT, 25.0), 10.0);

    assert!(source.clear(PAUSE_NEW_TRADES).unwrap());
    assert!(!source.clear(PAUSE_NEW_TRADES).unwrap());
    assert!(!plane.snapshot().pause_new_trades());
}

#[test]
fn test_corrupt_file_keeps_last_good_values() {
    let (_dir, source, plane) = file_plane();

    source.set(BLACKLIST_CREATORS, json!(["Rugger"])).unwrap();
    assert!(plane.snapshot().is_blacklisted("Rugger"));

    // Half-written file
    fs::write(source.path(), "{\"blacklist_creators\": [").unwrap();
    assert!(plane.snapshot().is_blacklisted("Rugger"));

    // Valid JSON that is not an object is also unusable
    fs::write(source.path(), "[1, 2, 3]").unwrap();
    assert!(plane.snapshot().is_blacklisted("Rugger"));

    // Recovery picks up the new contents
    source.reset().unwrap();
    assert!(!plane.snapshot().is_blacklisted("Rugger"));
}

#[test]
fn test_wrong_typed_value_falls_back_to_default() {
    let (_dir, source, plane) = file_plane();
    source.set(STOP_LOSS_PERCENT, json!("ten")).unwrap();
    source.set(PAUSE_NEW_TRADES, json!(null)).unwrap();

    let snapshot = plane.snapshot();
    assert_eq!(snapshot.stop_loss_percent(25.0), 25.0);
    assert!(!snapshot.pause_new_trades());
}

#[test]
fn test_engine_follows_file_overrides() {
    let (_dir, source, plane) = file_plane();
    let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
    let mut engine = PositionEngine::new(ledger.clone(), plane, test_settings());
    engine.initialize().unwrap();

    let event = token_event("MintA", "Creator", 90.0, 3);
    source.set(PAUSE_NEW_TRADES, json!(true)).unwrap();
    assert_eq!(engine.assess(&event), Err(EntryRejection::Paused));

    source.clear(PAUSE_NEW_TRADES).unwrap();
    assert!(engine.try_enter(&event).unwrap().is_some());

    // Emergency close on the next sweep, at the last seen price
    engine.check_exits(&HashMap::from([("MintA".to_string(), 1.1)]));
    assert!(engine.has_position("MintA"));
    source.set(CLOSE_ALL_POSITIONS, json!(true)).unwrap();
    let closed = engine.check_exits(&HashMap::new());

    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].reason, ExitReason::EmergencyClose);
    assert!((closed[0].exit_price - 1.1).abs() < 1e-12);
    assert_eq!(engine.open_count(), 0);
    assert!(ledger.get_open_trades().unwrap().is_empty());
}
