// Resilient websocket client for the token launch feed

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, sleep, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::messages;
use crate::config::FeedConfig;
use crate::error::TradingError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
}

/// Trade-subscription changes requested by the engine side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCommand {
    WatchMint(String),
    UnwatchMint(String),
}

/// Receives every text frame in arrival order
pub trait FrameHandler: Send {
    fn handle_frame(&mut self, frame: &str);
}

impl<F> FrameHandler for F
where
    F: FnMut(&str) + Send,
{
    fn handle_frame(&mut self, frame: &str) {
        self(frame)
    }
}

/// Cloneable stop signal shared by the stream loop and the interval tasks
#[derive(Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl StopHandle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `stop` has been called, immediately if it already was
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub url: String,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub connect_timeout: Duration,
    pub connect_retry: Duration,
    pub reconnect_delay: Duration,
}

impl From<&FeedConfig> for StreamSettings {
    fn from(config: &FeedConfig) -> Self {
        Self {
            url: config.ws_url.clone(),
            ping_interval: Duration::from_secs(config.ping_interval_secs),
            ping_timeout: Duration::from_secs(config.ping_timeout_secs),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            connect_retry: Duration::from_secs(config.connect_retry_secs),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamStats {
    pub connects: u64,
    pub connect_failures: u64,
    pub disconnects: u64,
    pub subscriptions_sent: u64,
    pub frames_received: u64,
    pub keepalive_timeouts: u64,
    /// Most recent connect or session failure, as displayed
    pub last_error: Option<String>,
}

enum SessionEnd {
    Stopped,
    Lost(TradingError),
}

pub struct StreamClient {
    settings: StreamSettings,
    state: ConnectionState,
    stop: StopHandle,
    commands: Option<mpsc::UnboundedReceiver<FeedCommand>>,
    watched: BTreeSet<String>,
    ws: Option<WsStream>,
    stats: StreamStats,
}

impl StreamClient {
    pub fn new(settings: StreamSettings) -> Self {
        Self {
            settings,
            state: ConnectionState::Disconnected,
            stop: StopHandle::new(),
            commands: None,
            watched: BTreeSet::new(),
            ws: None,
            stats: StreamStats::default(),
        }
    }

    /// Use an externally owned stop signal (shared with other tasks)
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Channel for trade-subscription commands
    pub fn command_channel(&mut self) -> mpsc::UnboundedSender<FeedCommand> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.commands = Some(rx);
        tx
    }

    /// Mints whose trades are followed on every (re)connect
    pub fn watch_initial<I: IntoIterator<Item = String>>(&mut self, mints: I) {
        self.watched.extend(mints);
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn watched(&self) -> impl Iterator<Item = &String> {
        self.watched.iter()
    }

    /// Open the transport and subscribe. Never errors; failure is `false`.
    pub async fn connect(&mut self) -> bool {
        self.state = ConnectionState::Connecting;
        self.ws = None;

        let mut ws = match timeout(self.settings.connect_timeout, connect_async(self.settings.url.as_str())).await {
            Ok(Ok((ws, _))) => ws,
            Ok(Err(e)) => {
                self.record_failure("connect", TradingError::from(e));
                return false;
            }
            Err(_) => {
                let err = TradingError::FeedTimeout(format!(
                    "connect to {} after {:?}",
                    self.settings.url, self.settings.connect_timeout
                ));
                self.record_failure("connect", err);
                return false;
            }
        };
        self.state = ConnectionState::Connected;

        if let Err(e) = ws.send(Message::Text(messages::subscribe_new_token().to_string())).await {
            self.record_failure("subscribeNewToken", TradingError::from(e));
            return false;
        }
        self.stats.subscriptions_sent += 1;

        if !self.watched.is_empty() {
            let keys: Vec<String> = self.watched.iter().cloned().collect();
            if let Err(e) = ws.send(Message::Text(messages::subscribe_token_trade(&keys).to_string())).await {
                self.record_failure("subscribeTokenTrade", TradingError::from(e));
                return false;
            }
            self.stats.subscriptions_sent += 1;
        }

        self.ws = Some(ws);
        self.state = ConnectionState::Subscribed;
        self.stats.connects += 1;
        info!("✅ Connected to {} ({} watched mints)", self.settings.url, self.watched.len());
        true
    }

    /// Log a failed attempt by category and remember it for status output.
    /// Transient feed errors warn; anything else is an error but still retried.
    fn record_failure(&mut self, during: &str, err: TradingError) {
        self.state = ConnectionState::Disconnected;
        if err.is_retryable() {
            warn!("❌ Feed {} failed [{}]: {}", during, err.category(), err);
        } else {
            error!("💥 Feed {} failed [{}]: {}", during, err.category(), err);
        }
        self.stats.last_error = Some(err.to_string());
    }

    /// Receive until stopped, reconnecting after every failure
    pub async fn run<H: FrameHandler + ?Sized>(&mut self, handler: &mut H) {
        let stop = self.stop.clone();

        loop {
            if stop.is_stopped() {
                break;
            }

            if self.ws.is_none() && !self.connect().await {
                self.stats.connect_failures += 1;
                if Self::sleep_or_stop(&stop, self.settings.connect_retry).await {
                    break;
                }
                continue;
            }

            let ws = match self.ws.take() {
                Some(ws) => ws,
                None => continue,
            };

            let end = self.session(ws, handler, &stop).await;
            self.state = ConnectionState::Disconnected;

            match end {
                SessionEnd::Stopped => break,
                SessionEnd::Lost(err) => {
                    self.stats.disconnects += 1;
                    self.record_failure("session", err);
                    info!("🔌 Reconnecting to {} in {:?}", self.settings.url, self.settings.reconnect_delay);
                    if Self::sleep_or_stop(&stop, self.settings.reconnect_delay).await {
                        break;
                    }
                }
            }
        }

        // A connect() call that was never run leaves an open socket here
        if let Some(mut ws) = self.ws.take() {
            let _ = ws.close(None).await;
        }
        self.state = ConnectionState::Disconnected;
        info!("🛑 Feed client stopped");
    }

    /// Returns true when stop was requested during the wait
    async fn sleep_or_stop(stop: &StopHandle, delay: Duration) -> bool {
        tokio::select! {
            _ = stop.stopped() => true,
            _ = sleep(delay) => stop.is_stopped(),
        }
    }

    async fn session<H: FrameHandler + ?Sized>(
        &mut self,
        ws: WsStream,
        handler: &mut H,
        stop: &StopHandle,
    ) -> SessionEnd {
        let (mut sink, mut source): (WsSink, WsSource) = ws.split();
        let mut ping = interval_at(Instant::now() + self.settings.ping_interval, self.settings.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pong_deadline: Option<Instant> = None;

        loop {
            let deadline = pong_deadline;

            tokio::select! {
                _ = stop.stopped() => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                    return SessionEnd::Stopped;
                }

                msg = source.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        self.stats.frames_received += 1;
                        handler.handle_frame(&text);
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => {
                            self.stats.frames_received += 1;
                            handler.handle_frame(&text);
                        }
                        Err(_) => debug!("dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        if let Err(e) = sink.send(Message::Pong(payload)).await {
                            return SessionEnd::Lost(e.into());
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        pong_deadline = None;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return SessionEnd::Lost(TradingError::FeedConnection(format!("server closed ({:?})", frame)));
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => return SessionEnd::Lost(e.into()),
                    None => return SessionEnd::Lost(TradingError::FeedConnection("stream ended".to_string())),
                },

                _ = ping.tick() => {
                    if pong_deadline.is_none() {
                        if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                            return SessionEnd::Lost(e.into());
                        }
                        pong_deadline = Some(Instant::now() + self.settings.ping_timeout);
                    }
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.stats.keepalive_timeouts += 1;
                    return SessionEnd::Lost(TradingError::FeedTimeout(format!(
                        "no pong within {:?}",
                        self.settings.ping_timeout
                    )));
                }

                cmd = next_command(&mut self.commands) => match cmd {
                    Some(cmd) => {
                        if let Err(e) = self.apply_command(&mut sink, cmd).await {
                            return SessionEnd::Lost(e.into());
                        }
                    }
                    None => {
                        debug!("feed command channel closed");
                        self.commands = None;
                    }
                },
            }
        }
    }

    async fn apply_command(
        &mut self,
        sink: &mut WsSink,
        cmd: FeedCommand,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        match cmd {
            FeedCommand::WatchMint(mint) => {
                if self.watched.insert(mint.clone()) {
                    let msg = messages::subscribe_token_trade(&[mint.clone()]);
                    sink.send(Message::Text(msg.to_string())).await?;
                    self.stats.subscriptions_sent += 1;
                    debug!("📡 Watching trades for {}", mint);
                }
            }
            FeedCommand::UnwatchMint(mint) => {
                if self.watched.remove(&mint) {
                    let msg = messages::unsubscribe_token_trade(&[mint.clone()]);
                    sink.send(Message::Text(msg.to_string())).await?;
                    debug!("Stopped watching trades for {}", mint);
                }
            }
        }
        Ok(())
    }
}

async fn next_command(rx: &mut Option<mpsc::UnboundedReceiver<FeedCommand>>) -> Option<FeedCommand> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> StreamSettings {
        StreamSettings {
            url: url.to_string(),
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_millis(500),
            connect_retry: Duration::from_millis(50),
            reconnect_delay: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_connect_failure_returns_false() {
        // Nothing listens on port 9 locally
        let mut client = StreamClient::new(settings("ws://127.0.0.1:9"));
        assert!(!client.connect().await);
        assert_eq!(client.state(), ConnectionState::Disconnected);
        let last_error = client.stats().last_error.clone().unwrap();
        assert!(last_error.starts_with("Feed"), "unexpected error: {}", last_error);
    }

    #[tokio::test]
    async fn test_unsupported_scheme_is_recorded() {
        // No port and no ws scheme: rejected before any socket is opened
        let mut client = StreamClient::new(settings("http://127.0.0.1"));
        assert!(!client.connect().await);
        let last_error = client.stats().last_error.clone().unwrap();
        assert!(last_error.contains("feed url"), "unexpected error: {}", last_error);
        assert_eq!(client.stats().connects, 0);
    }

    #[tokio::test]
    async fn test_stop_before_run_returns_immediately() {
        let mut client = StreamClient::new(settings("ws://127.0.0.1:9"));
        client.stop();
        let mut frames = Vec::new();
        let mut handler = |f: &str| frames.push(f.to_string());
        client.run(&mut handler).await;
        assert_eq!(client.stats().connects, 0);
    }

    #[tokio::test]
    async fn test_stop_wakes_retry_backoff() {
        let mut settings = settings("ws://127.0.0.1:9");
        settings.connect_retry = Duration::from_secs(3600);
        let mut client = StreamClient::new(settings);
        let stop = client.stop_handle();

        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            stop.stop();
        });

        let mut handler = |_: &str| {};
        tokio::time::timeout(Duration::from_secs(5), client.run(&mut handler))
            .await
            .unwrap();
        assert!(client.stats().connect_failures >= 1);
    }

    #[test]
    fn test_settings_from_config() {
        let config = FeedConfig::default();
        let settings = StreamSettings::from(&config);
        assert_eq!(settings.ping_interval, Duration::from_secs(30));
        assert_eq!(settings.reconnect_delay, Duration::from_secs(2));
    }
}
