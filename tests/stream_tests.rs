// Stream client tests against a local websocket server

mod common;

use futures_util::{SinkExt, StreamExt};
use paper_sniper::clients::{FeedCommand, StopHandle, StreamClient, StreamSettings};
use paper_sniper::core::{EventDispatcher, StoredScoreScorer};
use paper_sniper::{Ledger, SqliteLedger};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

type ServerWs = WebSocketStream<TcpStream>;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept(listener: &TcpListener) -> ServerWs {
    let (tcp, _) = listener.accept().await.unwrap();
    accept_async(tcp).await.unwrap()
}

/// Next text frame from the client, skipping control frames
async fn next_text(ws: &mut ServerWs) -> Option<String> {
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

/// Keep reading so control frames get answered, until the client goes away
async fn drain(mut ws: ServerWs) {
    while let Some(Ok(_)) = ws.next().await {}
}

fn method(raw: &str) -> String {
    let value: Value = serde_json::from_str(raw).unwrap();
    value["method"].as_str().unwrap_or_default().to_string()
}

fn keys(raw: &str) -> Vec<String> {
    let value: Value = serde_json::from_str(raw).unwrap();
    value["keys"]
        .as_array()
        .map(|keys| keys.iter().filter_map(|k| k.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn fast_settings(url: &str) -> StreamSettings {
    StreamSettings {
        url: url.to_string(),
        ping_interval: Duration::from_secs(30),
        ping_timeout: Duration::from_secs(10),
        connect_timeout: Duration::from_secs(2),
        connect_retry: Duration::from_millis(50),
        reconnect_delay: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn test_subscribes_and_delivers_frames_in_order() {
    let (listener, url) = bind().await;
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        if let Some(sub) = next_text(&mut ws).await {
            let _ = seen_tx.send(sub);
        }
        for i in 0..3 {
            ws.send(Message::Text(format!("{{\"seq\":{}}}", i))).await.unwrap();
        }
        drain(ws).await;
    });

    let mut client = StreamClient::new(fast_settings(&url));
    let stop = client.stop_handle();
    let mut frames = Vec::new();
    let mut handler = |frame: &str| {
        frames.push(frame.to_string());
        if frames.len() == 3 {
            stop.stop();
        }
    };

    timeout(TEST_TIMEOUT, client.run(&mut handler)).await.expect("client did not stop");

    assert_eq!(frames, vec!["{\"seq\":0}", "{\"seq\":1}", "{\"seq\":2}"]);
    assert_eq!(method(&seen_rx.recv().await.unwrap()), "subscribeNewToken");
    assert_eq!(client.stats().connects, 1);
    assert_eq!(client.stats().frames_received, 3);
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let (listener, url) = bind().await;
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for round in 0..2 {
            let mut ws = accept(&listener).await;
            if let Some(sub) = next_text(&mut ws).await {
                let _ = seen_tx.send(sub);
            }
            if round == 0 {
                let _ = ws.close(None).await;
            } else {
                ws.send(Message::Text("after-reconnect".to_string())).await.unwrap();
                drain(ws).await;
            }
        }
    });

    let mut client = StreamClient::new(fast_settings(&url));
    let stop = client.stop_handle();
    let mut handler = |frame: &str| {
        if frame == "after-reconnect" {
            stop.stop();
        }
    };

    timeout(TEST_TIMEOUT, client.run(&mut handler)).await.expect("client did not stop");

    // One subscribeNewToken per connection
    assert_eq!(method(&seen_rx.recv().await.unwrap()), "subscribeNewToken");
    assert_eq!(method(&seen_rx.recv().await.unwrap()), "subscribeNewToken");
    assert_eq!(client.stats().connects, 2);
    assert!(client.stats().disconnects >= 1);
    let last_error = client.stats().last_error.clone().unwrap();
    assert!(last_error.starts_with("Feed "), "unexpected error: {}", last_error);
}

#[tokio::test]
async fn test_watched_mints_are_resubscribed_after_reconnect() {
    let (listener, url) = bind().await;
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        for _ in 0..2 {
            if let Some(text) = next_text(&mut ws).await {
                let _ = seen_tx.send((1, text));
            }
        }
        let _ = ws.close(None).await;

        let mut ws = accept(&listener).await;
        for _ in 0..2 {
            if let Some(text) = next_text(&mut ws).await {
                let _ = seen_tx.send((2, text));
            }
        }
        ws.send(Message::Text("done".to_string())).await.unwrap();
        drain(ws).await;
    });

    let mut client = StreamClient::new(fast_settings(&url));
    let commands = client.command_channel();
    commands.send(FeedCommand::WatchMint("MintA".to_string())).unwrap();

    let stop = client.stop_handle();
    let mut handler = |frame: &str| {
        if frame == "done" {
            stop.stop();
        }
    };

    timeout(TEST_TIMEOUT, client.run(&mut handler)).await.expect("client did not stop");

    let mut seen = Vec::new();
    while let Ok(entry) = seen_rx.try_recv() {
        seen.push(entry);
    }
    assert_eq!(seen.len(), 4);

    assert_eq!(seen[0].0, 1);
    assert_eq!(method(&seen[0].1), "subscribeNewToken");
    assert_eq!(method(&seen[1].1), "subscribeTokenTrade");
    assert_eq!(keys(&seen[1].1), vec!["MintA"]);

    assert_eq!(seen[2].0, 2);
    assert_eq!(method(&seen[2].1), "subscribeNewToken");
    assert_eq!(method(&seen[3].1), "subscribeTokenTrade");
    assert_eq!(keys(&seen[3].1), vec!["MintA"]);

    assert_eq!(client.watched().cloned().collect::<Vec<_>>(), vec!["MintA"]);
}

#[tokio::test]
async fn test_unwatch_sends_unsubscribe() {
    let (listener, url) = bind().await;
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        for _ in 0..3 {
            if let Some(text) = next_text(&mut ws).await {
                let _ = seen_tx.send(text);
            }
        }
        ws.send(Message::Text("done".to_string())).await.unwrap();
        drain(ws).await;
    });

    let mut client = StreamClient::new(fast_settings(&url));
    let commands = client.command_channel();
    commands.send(FeedCommand::WatchMint("MintA".to_string())).unwrap();
    // Duplicate watch is a no-op on the wire
    commands.send(FeedCommand::WatchMint("MintA".to_string())).unwrap();
    commands.send(FeedCommand::UnwatchMint("MintA".to_string())).unwrap();

    let stop = client.stop_handle();
    let mut handler = |frame: &str| {
        if frame == "done" {
            stop.stop();
        }
    };

    timeout(TEST_TIMEOUT, client.run(&mut handler)).await.expect("client did not stop");

    assert_eq!(method(&seen_rx.recv().await.unwrap()), "subscribeNewToken");
    assert_eq!(method(&seen_rx.recv().await.unwrap()), "subscribeTokenTrade");
    assert_eq!(method(&seen_rx.recv().await.unwrap()), "unsubscribeTokenTrade");
    assert_eq!(client.watched().count(), 0);
}

#[tokio::test]
async fn test_keepalive_timeout_forces_reconnect() {
    let (listener, url) = bind().await;

    tokio::spawn(async move {
        // First peer reads the subscription, then goes silent and never pongs
        let mut silent = accept(&listener).await;
        let _ = next_text(&mut silent).await;

        let mut ws = accept(&listener).await;
        let _ = next_text(&mut ws).await;
        ws.send(Message::Text("done".to_string())).await.unwrap();
        drain(ws).await;
        drop(silent);
    });

    let mut settings = fast_settings(&url);
    settings.ping_interval = Duration::from_millis(100);
    settings.ping_timeout = Duration::from_millis(100);

    let mut client = StreamClient::new(settings);
    let stop = client.stop_handle();
    let mut handler = |frame: &str| {
        if frame == "done" {
            stop.stop();
        }
    };

    timeout(TEST_TIMEOUT, client.run(&mut handler)).await.expect("client did not stop");

    assert!(client.stats().keepalive_timeouts >= 1);
    assert_eq!(client.stats().connects, 2);
    let last_error = client.stats().last_error.clone().unwrap();
    assert!(last_error.starts_with("Feed timeout"), "unexpected error: {}", last_error);
}

#[tokio::test]
async fn test_stop_closes_active_session() {
    let (listener, url) = bind().await;
    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        let _ = next_text(&mut ws).await;
        while let Some(msg) = ws.next().await {
            if let Ok(Message::Close(_)) = msg {
                let _ = closed_tx.send(());
                break;
            }
        }
    });

    let stop = StopHandle::new();
    let mut client = StreamClient::new(fast_settings(&url)).with_stop_handle(stop.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.stop();
    });

    let mut handler = |_: &str| {};
    timeout(TEST_TIMEOUT, client.run(&mut handler)).await.expect("client did not stop");

    timeout(TEST_TIMEOUT, closed_rx.recv())
        .await
        .expect("server never saw a close frame");
    assert_eq!(client.stats().disconnects, 0);
}

#[tokio::test]
async fn test_dispatcher_collects_tokens_from_stream() {
    let (listener, url) = bind().await;
    let stop = StopHandle::new();

    {
        let stop = stop.clone();
        tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            let _ = next_text(&mut ws).await;
            for frame in [
                common::create_frame("MintA", "CreatorA"),
                "not json".to_string(),
                common::create_frame("MintA", "CreatorA"),
                common::trade_frame("MintA", 1.0, 1_000_000.0),
            ] {
                ws.send(Message::Text(frame)).await.unwrap();
            }
            let _ = ws.close(None).await;

            // The client only reconnects after handling everything above
            let ws = accept(&listener).await;
            stop.stop();
            drain(ws).await;
        });
    }

    let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
    let mut dispatcher = EventDispatcher::new(ledger.clone(), Arc::new(StoredScoreScorer));
    let mut client = StreamClient::new(fast_settings(&url)).with_stop_handle(stop);

    timeout(TEST_TIMEOUT, client.run(&mut dispatcher)).await.expect("client did not stop");

    let stats = dispatcher.stats();
    assert_eq!(stats.frames_seen, 4);
    assert_eq!(stats.tokens_collected, 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.dropped_frames, 1);
    assert_eq!(stats.price_updates, 1);

    let token = ledger.find_token("MintA").unwrap().unwrap();
    assert!((token.current_price - 0.000001).abs() < 1e-12);
    assert_eq!(ledger.get_creator("CreatorA").unwrap().unwrap().tokens_created, 1);
}
