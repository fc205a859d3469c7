#![allow(clippy::unwrap_used)]
// End-to-end tests for `Pipeline` against a local WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use cafeed_core::{
    ConnectionState, KeyValueStore, MemoryStore, Pipeline, PipelineConfig, StaticToken,
    SubscriptionFilter,
};

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);
const CACHE_KEY: &str = "ca_event_cache";

// ── Helpers ─────────────────────────────────────────────────────────

async fn listener() -> TcpListener {
    TcpListener::bind("127.0.0.1:0").await.unwrap()
}

fn pipeline_config(listener: &TcpListener) -> PipelineConfig {
    let addr = listener.local_addr().unwrap();
    let mut config = PipelineConfig::new(format!("ws://{addr}/feed").parse().unwrap());
    config.connection.heartbeat_interval = Duration::from_secs(60);
    config.connection.pong_timeout = Duration::from_secs(60);
    config.connection.open_timeout = Duration::from_secs(2);
    config.flow.debounce = Duration::from_millis(50);
    config
}

fn pipeline(config: PipelineConfig, store: Arc<MemoryStore>) -> Pipeline {
    Pipeline::new(config, Arc::new(StaticToken::new("s3cret")), store)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (tcp, _) = tokio::time::timeout(WAIT, listener.accept())
        .await
        .expect("no connection attempt")
        .unwrap();
    tokio_tungstenite::accept_async(tcp).await.unwrap()
}

/// Accept a connection and consume its subscribe message.
async fn accept_subscribed(listener: &TcpListener) -> (WebSocketStream<TcpStream>, Value) {
    let mut ws = accept(listener).await;
    let subscribe = next_json(&mut ws).await;
    (ws, subscribe)
}

async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("no frame from client")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Poll `check` until it holds or the wait budget runs out.
async fn eventually(what: &str, check: impl Fn() -> bool) {
    let reached = tokio::time::timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for {what}");
}

async fn send_event(ws: &mut WebSocketStream<TcpStream>, text: &str) {
    let frame = json!({
        "type": "realtime_event",
        "data": {
            "user": { "id": format!("id-{text}"), "username": format!("user_{text}") },
            "tweet": { "id": format!("tw-{text}"), "text": text },
            "tokens": [{ "address": format!("So1{text}") }],
            "stats": { "mentionCount": 3, "uniqueUsers": 2 },
            "timestamp": 1_700_000_000_000_i64
        }
    });
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

fn texts(events: &[Arc<cafeed_core::CaEvent>]) -> Vec<String> {
    events.iter().map(|e| e.payload.tweet.text.clone()).collect()
}

// ── Event routing ───────────────────────────────────────────────────

#[tokio::test]
async fn test_events_reach_cache_and_display() {
    let listener = listener().await;
    let p = pipeline(pipeline_config(&listener), Arc::new(MemoryStore::new()));
    let mut batches = p.batches();
    p.start().await;

    let (mut ws, subscribe) = accept_subscribed(&listener).await;
    assert_eq!(subscribe["network"], "solana");

    send_event(&mut ws, "first").await;
    send_event(&mut ws, "second").await;

    let batch = tokio::time::timeout(WAIT, batches.recv()).await.unwrap().unwrap();
    assert!(!batch.flushed);
    assert_eq!(texts(&batch.events), ["first"]);

    eventually("both events displayed", || p.display_snapshot().len() == 2).await;
    assert_eq!(texts(&p.display_snapshot()), ["second", "first"]);
    assert_eq!(texts(&p.cache().events()), ["second", "first"]);
    p.shutdown().await;
}

#[tokio::test]
async fn test_invalid_events_never_reach_cache_or_display() {
    let listener = listener().await;
    let p = pipeline(pipeline_config(&listener), Arc::new(MemoryStore::new()));
    p.start().await;
    let (mut ws, _) = accept_subscribed(&listener).await;

    let broken = json!({ "type": "realtime_event", "data": { "user": {}, "tweet": {} } });
    ws.send(Message::text(broken.to_string())).await.unwrap();
    ws.send(Message::text("{oops".to_string())).await.unwrap();
    send_event(&mut ws, "valid").await;

    eventually("valid event cached", || p.cache().len() == 1).await;
    tokio::time::sleep(QUIET).await;
    assert_eq!(texts(&p.cache().events()), ["valid"]);
    assert_eq!(texts(&p.display_snapshot()), ["valid"]);
    p.shutdown().await;
}

// ── Flow control ────────────────────────────────────────────────────

#[tokio::test]
async fn test_pause_buffers_display_but_not_cache() {
    let listener = listener().await;
    let p = pipeline(pipeline_config(&listener), Arc::new(MemoryStore::new()));
    let mut batches = p.batches();
    let mut status = p.flow_status();
    p.start().await;
    let (mut ws, _) = accept_subscribed(&listener).await;

    send_event(&mut ws, "live").await;
    let live = tokio::time::timeout(WAIT, batches.recv()).await.unwrap().unwrap();
    assert_eq!(texts(&live.events), ["live"]);

    p.set_paused(true);
    tokio::time::timeout(WAIT, status.wait_for(|s| s.paused))
        .await
        .unwrap()
        .unwrap();

    send_event(&mut ws, "A").await;
    send_event(&mut ws, "B").await;
    eventually("paused events cached", || p.cache().len() == 3).await;
    eventually("paused events buffered", || p.flow_status().borrow().buffered == 2).await;
    assert_eq!(texts(&p.display_snapshot()), ["live"]);

    p.set_paused(false);
    let flushed = tokio::time::timeout(WAIT, batches.recv()).await.unwrap().unwrap();
    assert!(flushed.flushed);
    assert_eq!(texts(&flushed.events), ["B", "A"]);
    assert_eq!(texts(&p.display_snapshot()), ["B", "A", "live"]);
    assert_eq!(p.flow_status().borrow().buffered, 0);
    p.shutdown().await;
}

#[tokio::test]
async fn test_hover_hold_and_clear_display() {
    let listener = listener().await;
    let p = pipeline(pipeline_config(&listener), Arc::new(MemoryStore::new()));
    let mut status = p.flow_status();
    p.start().await;
    let (mut ws, _) = accept_subscribed(&listener).await;

    send_event(&mut ws, "shown").await;
    eventually("event displayed", || p.display_snapshot().len() == 1).await;

    p.set_hover(true);
    tokio::time::timeout(WAIT, status.wait_for(|s| s.held))
        .await
        .unwrap()
        .unwrap();
    send_event(&mut ws, "held").await;
    eventually("held event buffered", || p.flow_status().borrow().buffered == 1).await;

    p.clear_display();
    eventually("display cleared", || {
        p.display_snapshot().is_empty() && p.flow_status().borrow().buffered == 0
    })
    .await;

    p.set_hover(false);
    tokio::time::sleep(QUIET).await;
    assert!(p.display_snapshot().is_empty());
    assert_eq!(p.cache().len(), 2);
    p.shutdown().await;
}

// ── Subscription ────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_subscription_while_connected_sends_update() {
    let listener = listener().await;
    let p = pipeline(pipeline_config(&listener), Arc::new(MemoryStore::new()));
    p.start().await;
    let (mut ws, _) = accept_subscribed(&listener).await;
    let mut state = p.connection_state();
    tokio::time::timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .unwrap()
        .unwrap();

    let filter = SubscriptionFilter {
        min_followers: 1000,
        ..SubscriptionFilter::default()
    };
    assert!(p.update_subscription(filter.clone()).unwrap());

    let update = next_json(&mut ws).await;
    assert_eq!(update["minFollowers"], 1000);
    assert_eq!(p.subscription(), filter);
    p.shutdown().await;
}

#[tokio::test]
async fn test_update_while_disconnected_is_sent_on_next_connect() {
    let listener = listener().await;
    let mut config = pipeline_config(&listener);
    config.auto_connect = false;
    let p = pipeline(config, Arc::new(MemoryStore::new()));
    p.start().await;

    let filter = SubscriptionFilter {
        network: "base".into(),
        ..SubscriptionFilter::default()
    };
    assert!(!p.update_subscription(filter).unwrap());
    assert!(
        tokio::time::timeout(QUIET, listener.accept()).await.is_err(),
        "auto_connect=false must not dial"
    );

    p.connect();
    let (_ws, subscribe) = accept_subscribed(&listener).await;
    assert_eq!(subscribe["network"], "base");
    p.shutdown().await;
}

// ── Auto-connect toggle ─────────────────────────────────────────────

#[tokio::test]
async fn test_auto_connect_toggle() {
    let listener = listener().await;
    let p = pipeline(pipeline_config(&listener), Arc::new(MemoryStore::new()));
    p.start().await;
    let (mut ws, _) = accept_subscribed(&listener).await;

    p.set_auto_connect(false).await;
    assert_eq!(p.current_state(), ConnectionState::Disconnected);
    let closed = loop {
        match tokio::time::timeout(WAIT, ws.next()).await.unwrap() {
            Some(Ok(Message::Close(frame))) => break frame,
            Some(Ok(_)) => {}
            other => panic!("expected close frame, got {other:?}"),
        }
    };
    assert_eq!(closed.unwrap().code, CloseCode::Normal);

    p.connect();
    assert!(
        tokio::time::timeout(QUIET, listener.accept()).await.is_err(),
        "plain connect after manual disconnect must be refused"
    );

    p.set_auto_connect(true).await;
    let (_ws, _) = accept_subscribed(&listener).await;
    p.shutdown().await;
}

// ── Persistence ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_cache_survives_restart() {
    let listener = listener().await;
    let store = Arc::new(MemoryStore::new());

    let first = pipeline(pipeline_config(&listener), Arc::clone(&store));
    first.start().await;
    let (mut ws, _) = accept_subscribed(&listener).await;
    send_event(&mut ws, "kept").await;
    eventually("event cached", || first.cache().len() == 1).await;
    first.shutdown().await;

    let record: Value = serde_json::from_str(&store.get(CACHE_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(record["count"], 1);
    assert_eq!(record["events"][0]["tweet"]["text"], "kept");
    assert_eq!(record["events"][0]["stats"]["uniqueUsers"], 2);

    let mut config = pipeline_config(&listener);
    config.auto_connect = false;
    let second = pipeline(config, store);
    second.start().await;
    assert_eq!(texts(&second.cache().events()), ["kept"]);
    assert!(second.display_snapshot().is_empty());
    second.shutdown().await;
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let listener = listener().await;
    let mut config = pipeline_config(&listener);
    config.auto_connect = false;
    let p = pipeline(config, Arc::new(MemoryStore::new()));
    p.start().await;
    p.start().await;
    assert_eq!(p.current_state(), ConnectionState::Disconnected);
    p.shutdown().await;
}
