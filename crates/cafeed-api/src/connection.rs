//! Feed connection with heartbeat and auto-reconnect.
//!
//! A single background task owns the WebSocket and every timer attached to
//! it (open timeout, heartbeat interval, pong deadline, reconnect backoff).
//! The cloneable [`ConnectionManager`] handle talks to that task over a
//! command queue; state changes are published through a
//! [`tokio::sync::watch`] channel and validated events through an `mpsc`
//! queue handed out once at spawn time.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cafeed_api::{ConnectionConfig, ConnectionManager, StaticToken, SubscriptionFilter};
//! use tokio::sync::watch;
//! use tokio_util::sync::CancellationToken;
//!
//! let (_filter_tx, filter_rx) = watch::channel(SubscriptionFilter::default());
//! let config = ConnectionConfig::new("wss://feed.example.com/ws".parse()?);
//! let (conn, mut events) = ConnectionManager::spawn(
//!     config,
//!     Arc::new(StaticToken::new("secret")),
//!     filter_rx,
//!     &CancellationToken::new(),
//! );
//!
//! conn.connect();
//! while let Some(event) = events.recv().await {
//!     println!("{} mentioned {} tokens", event.author(), event.payload.tokens.len());
//! }
//! ```

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message, Utf8Bytes};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::auth::{TokenProvider, usable_token};
use crate::error::Error;
use crate::event::CaEvent;
use crate::protocol::{ClientMessage, ServerMessage, SubscriptionFilter};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// A retry is scheduled; `attempt` is 1-based.
    Reconnecting { attempt: u32 },
    Error,
}

// ── Configuration ────────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first retry. Default: 1s.
    pub base_delay: Duration,

    /// Upper bound on any single delay. Default: 30s.
    pub max_delay: Duration,

    /// Consecutive failed attempts tolerated before giving up. Default: 5.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectConfig {
    /// `min(base * 2^attempt, max)`, saturating instead of overflowing.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Everything the connection task needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Feed endpoint, without the token.
    pub url: Url,
    /// Query parameter the token is sent in.
    pub token_param: String,
    /// Ping period while connected.
    pub heartbeat_interval: Duration,
    /// How long to wait for a pong after a ping.
    pub pong_timeout: Duration,
    /// Upper bound on establishing the WebSocket.
    pub open_timeout: Duration,
    /// Reconnect automatically after abnormal closures.
    pub auto_retry: bool,
    pub reconnect: ReconnectConfig,
}

impl ConnectionConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            token_param: "token".into(),
            heartbeat_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            open_timeout: Duration::from_secs(10),
            auto_retry: true,
            reconnect: ReconnectConfig::default(),
        }
    }
}

// ── ConnectionManager ────────────────────────────────────────────────

enum Command {
    Connect { force: bool },
    Disconnect { done: oneshot::Sender<()> },
    Send(ClientMessage),
    SetAutoRetry(bool),
}

/// Handle to the background connection task.
///
/// Cheaply cloneable. When the last handle is dropped the task shuts down.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl ConnectionManager {
    /// Spawn the connection task in the `Disconnected` state.
    ///
    /// `filter` is read every time a connection opens; its current value is
    /// sent as the subscribe message. The returned receiver yields every
    /// validated live event.
    pub fn spawn(
        config: ConnectionConfig,
        tokens: Arc<dyn TokenProvider>,
        filter: watch::Receiver<SubscriptionFilter>,
        parent: &CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<Arc<CaEvent>>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let cancel = parent.child_token();

        let actor = Actor {
            auto_retry: config.auto_retry,
            config,
            tokens,
            filter,
            state: state_tx,
            events: event_tx,
            commands: command_rx,
            cancel: cancel.clone(),
            manual_disconnect: false,
            attempt: 0,
        };
        tokio::spawn(actor.run());

        let handle = Self {
            inner: Arc::new(Inner {
                commands: command_tx,
                state: state_rx,
                cancel,
            }),
        };
        (handle, event_rx)
    }

    /// Start connecting. No-op while already open or opening, and refused
    /// after a manual [`disconnect`](Self::disconnect).
    pub fn connect(&self) {
        self.command(Command::Connect { force: false });
    }

    /// Connect even after a manual disconnect, clearing that flag.
    pub fn connect_forced(&self) {
        self.command(Command::Connect { force: true });
    }

    /// Disconnect and stay disconnected until a forced connect.
    ///
    /// Returns once every connection timer is cancelled and the state is
    /// `Disconnected`. The close handshake finishes in the background.
    pub async fn disconnect(&self) {
        let (done, rx) = oneshot::channel();
        self.command(Command::Disconnect { done });
        let _ = rx.await;
    }

    pub fn set_auto_retry(&self, enabled: bool) {
        self.command(Command::SetAutoRetry(enabled));
    }

    /// Queue a message for the server. Dropped with a debug log when the
    /// socket is not open.
    pub fn send(&self, message: ClientMessage) -> Result<(), Error> {
        self.inner
            .commands
            .send(Command::Send(message))
            .map_err(|_| Error::ChannelClosed)
    }

    /// Subscribe to state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.clone()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Stop the background task for good.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    fn command(&self, command: Command) {
        if self.inner.commands.send(command).is_err() {
            debug!("connection task gone, command ignored");
        }
    }
}

// ── Background task ──────────────────────────────────────────────────

/// How one connection lifecycle ended.
enum Outcome {
    /// User-initiated disconnect, already acknowledged.
    Manual,
    /// Server closed with a normal-closure code.
    Normal,
    /// Missing or rejected token: not retried.
    Auth(Error),
    /// Any other failure: retried when allowed.
    Failed(Error),
    Shutdown,
}

enum Wait {
    Elapsed,
    Interrupted,
    Shutdown,
}

struct Actor {
    config: ConnectionConfig,
    tokens: Arc<dyn TokenProvider>,
    filter: watch::Receiver<SubscriptionFilter>,
    state: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<Arc<CaEvent>>,
    commands: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
    manual_disconnect: bool,
    auto_retry: bool,
    /// Failed attempts and abnormal closures since the last normal or
    /// manual closure.
    attempt: u32,
}

impl Actor {
    async fn run(mut self) {
        loop {
            let command = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                command = self.commands.recv() => command,
            };
            let Some(command) = command else { break };

            match command {
                Command::Connect { force } => {
                    if self.session(force).await.is_break() {
                        break;
                    }
                }
                Command::Disconnect { done } => self.mark_disconnected(done),
                Command::Send(_) => debug!("not connected, dropping outbound message"),
                Command::SetAutoRetry(enabled) => self.auto_retry = enabled,
            }
        }
        self.set_state(ConnectionState::Disconnected);
        debug!("connection task exiting");
    }

    /// Connect, then keep reconnecting until a terminal outcome.
    async fn session(&mut self, force: bool) -> ControlFlow<()> {
        if force {
            self.manual_disconnect = false;
        } else if self.manual_disconnect {
            debug!("connect refused: manual disconnect in effect");
            return ControlFlow::Continue(());
        }

        loop {
            match self.connect_once().await {
                Outcome::Shutdown => return ControlFlow::Break(()),
                Outcome::Manual | Outcome::Normal => {
                    self.attempt = 0;
                    self.set_state(ConnectionState::Disconnected);
                    return ControlFlow::Continue(());
                }
                Outcome::Auth(e) => {
                    warn!(error = %e, "authentication failed, not retrying");
                    self.set_state(ConnectionState::Error);
                    return ControlFlow::Continue(());
                }
                Outcome::Failed(e) => {
                    warn!(error = %e, attempt = self.attempt, "feed connection failed");
                    self.set_state(ConnectionState::Error);

                    if !self.auto_retry || self.manual_disconnect {
                        return ControlFlow::Continue(());
                    }
                    let max = self.config.reconnect.max_attempts;
                    if self.attempt >= max {
                        error!(max_attempts = max, "reconnection limit reached, giving up");
                        return ControlFlow::Continue(());
                    }

                    let delay = self.config.reconnect.delay_for(self.attempt);
                    self.attempt += 1;
                    self.set_state(ConnectionState::Reconnecting {
                        attempt: self.attempt,
                    });
                    info!(
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        attempt = self.attempt,
                        "waiting before reconnect"
                    );

                    match self.wait_backoff(delay).await {
                        Wait::Elapsed => {}
                        Wait::Interrupted => return ControlFlow::Continue(()),
                        Wait::Shutdown => return ControlFlow::Break(()),
                    }
                }
            }
        }
    }

    /// One connection lifecycle: token → open → connected loop.
    async fn connect_once(&mut self) -> Outcome {
        self.set_state(ConnectionState::Connecting);

        let Some(token) = usable_token(self.tokens.as_ref()) else {
            return Outcome::Auth(Error::MissingToken);
        };
        let url = authorized_url(&self.config.url, &self.config.token_param, token.expose_secret());
        info!(
            host = self.config.url.host_str().unwrap_or_default(),
            "connecting to feed"
        );

        let open = tokio::time::timeout(
            self.config.open_timeout,
            tokio_tungstenite::connect_async(url.to_string()),
        );
        tokio::pin!(open);

        let ws = loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Outcome::Shutdown,
                command = self.commands.recv() => match command {
                    None => return Outcome::Shutdown,
                    Some(Command::Disconnect { done }) => {
                        self.mark_disconnected(done);
                        return Outcome::Manual;
                    }
                    Some(other) => self.handle_idle(other, "connection already opening"),
                },
                result = &mut open => match result {
                    Err(_) => {
                        return Outcome::Failed(Error::Timeout {
                            timeout_ms: millis(self.config.open_timeout),
                        });
                    }
                    Ok(Err(e)) => return classify_handshake_error(e),
                    Ok(Ok((ws, _response))) => break ws,
                },
            }
        };

        self.set_state(ConnectionState::Connected);
        info!("feed connected");

        self.run_connected(ws).await
    }

    /// Read frames, heartbeat, and forward commands until the socket drops.
    async fn run_connected(&mut self, ws: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Outcome {
        let (mut sink, mut stream) = ws.split();

        let filter = self.filter.borrow_and_update().clone();
        if let Err(e) = send_message(&mut sink, &ClientMessage::Subscribe(filter)).await {
            return Outcome::Failed(e);
        }

        let period = self.config.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let pong_deadline = tokio::time::sleep(self.config.pong_timeout);
        tokio::pin!(pong_deadline);
        let mut awaiting_pong = false;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    close_in_background(sink, "client shutting down");
                    return Outcome::Shutdown;
                }
                command = self.commands.recv() => match command {
                    None => {
                        close_in_background(sink, "client shutting down");
                        return Outcome::Shutdown;
                    }
                    Some(Command::Disconnect { done }) => {
                        self.mark_disconnected(done);
                        close_in_background(sink, "client disconnect");
                        return Outcome::Manual;
                    }
                    Some(Command::Send(message)) => {
                        if let Err(e) = send_message(&mut sink, &message).await {
                            return Outcome::Failed(e);
                        }
                    }
                    Some(other) => self.handle_idle(other, "already connected"),
                },
                () = &mut pong_deadline, if awaiting_pong => {
                    let timeout_ms = millis(self.config.pong_timeout);
                    warn!(timeout_ms, "no pong received, dropping connection");
                    return Outcome::Failed(Error::HeartbeatTimeout { timeout_ms });
                }
                _ = heartbeat.tick() => {
                    if let Err(e) = send_message(&mut sink, &ClientMessage::Ping).await {
                        return Outcome::Failed(e);
                    }
                    if !awaiting_pong {
                        pong_deadline.as_mut().reset(Instant::now() + self.config.pong_timeout);
                        awaiting_pong = true;
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if dispatch_text(&text, &self.events) == Inbound::Pong {
                            awaiting_pong = false;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => return close_outcome(frame.as_ref()),
                    Some(Ok(_)) => trace!("ignoring non-text frame"),
                    Some(Err(e)) => return Outcome::Failed(Error::WebSocketConnect(e.to_string())),
                    None => {
                        return Outcome::Failed(Error::WebSocketClosed {
                            code: 1006,
                            reason: "stream ended without close frame".into(),
                        });
                    }
                },
            }
        }
    }

    /// Sleep out a backoff delay while still honouring commands.
    async fn wait_backoff(&mut self, delay: Duration) -> Wait {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Wait::Shutdown,
                command = self.commands.recv() => match command {
                    None => return Wait::Shutdown,
                    Some(Command::Disconnect { done }) => {
                        self.mark_disconnected(done);
                        return Wait::Interrupted;
                    }
                    Some(Command::SetAutoRetry(false)) => {
                        self.auto_retry = false;
                        self.set_state(ConnectionState::Error);
                        return Wait::Interrupted;
                    }
                    Some(other) => self.handle_idle(other, "reconnect already scheduled"),
                },
                () = &mut sleep => return Wait::Elapsed,
            }
        }
    }

    /// Commands that need no socket.
    fn handle_idle(&mut self, command: Command, busy: &'static str) {
        match command {
            Command::Connect { .. } => debug!("connect ignored: {busy}"),
            Command::Send(_) => debug!("socket not open, dropping outbound message"),
            Command::SetAutoRetry(enabled) => self.auto_retry = enabled,
            Command::Disconnect { done } => self.mark_disconnected(done),
        }
    }

    fn mark_disconnected(&mut self, done: oneshot::Sender<()>) {
        self.manual_disconnect = true;
        self.attempt = 0;
        self.set_state(ConnectionState::Disconnected);
        info!("feed disconnected by user");
        let _ = done.send(());
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = %current, to = %next, "connection state change");
            *current = next;
            true
        });
    }
}

// ── Frame handling ───────────────────────────────────────────────────

/// What an inbound text frame turned out to be.
#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Event,
    Pong,
    Control,
    Dropped,
}

/// Parse a text frame, forwarding valid live events to `events`.
fn dispatch_text(text: &str, events: &mpsc::UnboundedSender<Arc<CaEvent>>) -> Inbound {
    let message = match ServerMessage::parse(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "dropping malformed server message");
            return Inbound::Dropped;
        }
    };

    match message {
        ServerMessage::RealtimeEvent { data } => match CaEvent::ingest(data) {
            Ok(event) => {
                trace!(id = %event.id, author = event.author(), "realtime event");
                // A closed receiver just means nobody is listening right now.
                let _ = events.send(Arc::new(event));
                Inbound::Event
            }
            Err(e) => {
                warn!(error = %e, "dropping invalid realtime event");
                Inbound::Dropped
            }
        },
        ServerMessage::Pong => Inbound::Pong,
        ServerMessage::SubscribeSuccess { message } => {
            info!(message = message.as_deref().unwrap_or(""), "subscription acknowledged");
            Inbound::Control
        }
        ServerMessage::SubscribeError { message } => {
            warn!(message = message.as_deref().unwrap_or(""), "subscription rejected");
            Inbound::Control
        }
        ServerMessage::Error { code, message } => {
            warn!(
                code = code.as_ref().map(ToString::to_string).unwrap_or_default(),
                message = message.as_deref().unwrap_or(""),
                "server reported error"
            );
            Inbound::Control
        }
        ServerMessage::Close { reason } => {
            info!(reason = reason.as_deref().unwrap_or(""), "server announced close");
            Inbound::Control
        }
        ServerMessage::Unknown => {
            debug!("ignoring unknown server message type");
            Inbound::Control
        }
    }
}

fn close_outcome(frame: Option<&CloseFrame>) -> Outcome {
    match frame {
        Some(cf) if cf.code == CloseCode::Normal => {
            info!(reason = %cf.reason, "server closed connection normally");
            Outcome::Normal
        }
        Some(cf) => Outcome::Failed(Error::WebSocketClosed {
            code: u16::from(cf.code),
            reason: cf.reason.to_string(),
        }),
        None => Outcome::Failed(Error::WebSocketClosed {
            code: 1005,
            reason: "close frame without status".into(),
        }),
    }
}

fn classify_handshake_error(err: tungstenite::Error) -> Outcome {
    if let tungstenite::Error::Http(response) = &err {
        let status = response.status().as_u16();
        if matches!(status, 401 | 403) {
            return Outcome::Auth(Error::AuthRejected { status });
        }
    }
    Outcome::Failed(Error::WebSocketConnect(err.to_string()))
}

// ── Helpers ──────────────────────────────────────────────────────────

fn authorized_url(base: &Url, param: &str, token: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair(param, token);
    url
}

async fn send_message(sink: &mut WsSink, message: &ClientMessage) -> Result<(), Error> {
    let text = message.to_json()?;
    sink.send(Message::text(text))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))
}

/// Send a normal-closure frame without holding up the caller.
fn close_in_background(mut sink: WsSink, reason: &'static str) {
    tokio::spawn(async move {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: Utf8Bytes::from_static(reason),
        };
        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
            debug!(error = %e, "close frame not delivered");
        }
        let _ = sink.close().await;
    });
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_frame() -> String {
        json!({
            "type": "realtime_event",
            "data": {
                "user": { "id": "1", "username": "alpha" },
                "tweet": { "id": "9", "text": "CA: 7xKXabc" },
                "tokens": [{ "address": "7xKXabc" }],
                "stats": { "mentionCount": 1 },
                "timestamp": 1
            }
        })
        .to_string()
    }

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let config = ReconnectConfig {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            max_attempts: 10,
        };
        assert_eq!(config.delay_for(0), Duration::from_millis(500));
        assert_eq!(config.delay_for(1), Duration::from_secs(1));
        assert_eq!(config.delay_for(2), Duration::from_secs(2));
        assert_eq!(config.delay_for(3), Duration::from_secs(4));
        assert_eq!(config.delay_for(4), Duration::from_secs(5));
        assert_eq!(config.delay_for(60), Duration::from_secs(5));
    }

    #[test]
    fn authorized_url_appends_token() {
        let base: Url = "wss://feed.example.com/ws?v=2".parse().unwrap();
        let url = authorized_url(&base, "token", "a b&c");
        assert_eq!(url.as_str(), "wss://feed.example.com/ws?v=2&token=a+b%26c");
        // The configured URL itself never carries the token.
        assert!(!base.as_str().contains("token"));
    }

    #[test]
    fn dispatch_forwards_valid_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert_eq!(dispatch_text(&event_frame(), &tx), Inbound::Event);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.author(), "alpha");
    }

    #[test]
    fn dispatch_drops_invalid_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let frame = json!({ "type": "realtime_event", "data": { "user": {} } }).to_string();
        assert_eq!(dispatch_text(&frame, &tx), Inbound::Dropped);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dispatch_drops_malformed_json() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert_eq!(dispatch_text("{{{", &tx), Inbound::Dropped);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dispatch_recognises_pong_and_control() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert_eq!(dispatch_text(r#"{"type":"pong"}"#, &tx), Inbound::Pong);
        assert_eq!(
            dispatch_text(r#"{"type":"subscribe_success"}"#, &tx),
            Inbound::Control
        );
        assert_eq!(
            dispatch_text(r#"{"type":"error","code":"E1","message":"bad"}"#, &tx),
            Inbound::Control
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn normal_close_is_not_a_failure() {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: Utf8Bytes::from_static("bye"),
        };
        assert!(matches!(close_outcome(Some(&frame)), Outcome::Normal));
    }

    #[test]
    fn abnormal_close_is_a_failure() {
        let frame = CloseFrame {
            code: CloseCode::Error,
            reason: Utf8Bytes::from_static("boom"),
        };
        assert!(matches!(
            close_outcome(Some(&frame)),
            Outcome::Failed(Error::WebSocketClosed { code: 1011, .. })
        ));
        assert!(matches!(close_outcome(None), Outcome::Failed(_)));
    }

    #[test]
    fn state_display_is_snake_case() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(
            ConnectionState::Reconnecting { attempt: 2 }.to_string(),
            "reconnecting"
        );
    }
}
