//! JSON text-frame protocol spoken with the feed server.
//!
//! Client → server:
//! - the [`SubscriptionFilter`] object itself (initial subscribe and updates)
//! - `{"action": "ping"}`
//!
//! Server → client: objects discriminated by `type`, see [`ServerMessage`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── SubscriptionFilter ───────────────────────────────────────────────

/// Mention-count thresholds applied server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionThresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_mentions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_unique_users: Option<u64>,
}

/// Author / content quality thresholds applied server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityThresholds {
    #[serde(default)]
    pub verified_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_account_age_days: Option<u64>,
}

/// Nested filter groups of a subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterGroups {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub ca_allowlist: Vec<String>,
    #[serde(default)]
    pub user_blacklist: Vec<String>,
    #[serde(default)]
    pub mentions: MentionThresholds,
    #[serde(default)]
    pub quality: QualityThresholds,
}

/// Subscription criteria sent to the server.
///
/// The client never interprets these values; it serializes them verbatim
/// into subscribe/update messages. Unknown fields round-trip through
/// `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFilter {
    pub network: String,
    #[serde(default)]
    pub min_followers: u64,
    #[serde(default)]
    pub filters: FilterGroups,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for SubscriptionFilter {
    fn default() -> Self {
        Self {
            network: "solana".into(),
            min_followers: 0,
            filters: FilterGroups::default(),
            extra: Map::new(),
        }
    }
}

// ── Client → server ──────────────────────────────────────────────────

/// Messages the client writes to the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Initial subscription after a successful open.
    Subscribe(SubscriptionFilter),
    /// Filter replacement while connected (same wire shape as subscribe).
    Update(SubscriptionFilter),
    /// Heartbeat probe.
    Ping,
}

impl ClientMessage {
    /// Encode as a JSON text frame payload.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Subscribe(filter) | Self::Update(filter) => serde_json::to_string(filter),
            Self::Ping => serde_json::to_string(&serde_json::json!({ "action": "ping" })),
        }
    }
}

// ── Server → client ──────────────────────────────────────────────────

/// Messages the server sends, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(alias = "subscribe_ack")]
    SubscribeSuccess {
        #[serde(default)]
        message: Option<String>,
    },
    SubscribeError {
        #[serde(default)]
        message: Option<String>,
    },
    Pong,
    /// Live event; `data` is validated separately into a
    /// [`CaEvent`](crate::event::CaEvent).
    RealtimeEvent {
        #[serde(default)]
        data: Value,
    },
    Error {
        #[serde(default)]
        code: Option<ErrorCode>,
        #[serde(default)]
        message: Option<String>,
    },
    Close {
        #[serde(default)]
        reason: Option<String>,
    },
    /// Any type this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Machine-readable code on a server `error` frame; servers send either
/// a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl ServerMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
