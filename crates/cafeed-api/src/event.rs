//! Contract-address mention events.
//!
//! A [`CaEvent`] combines a social post, its author, the token mentions
//! found in it, and aggregate statistics. The remote payload is kept
//! verbatim (unknown fields are captured in `extra` maps) so nothing the
//! server sends is silently dropped on its way into the cache.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Error;

// ── Remote descriptors ───────────────────────────────────────────────

/// Author of the post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub verified: bool,

    /// All remaining fields the server sends.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The post in which a contract address was mentioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One contract address found in the post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMention {
    pub address: String,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Aggregate mention statistics computed server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionStats {
    #[serde(default)]
    pub mention_count: u64,
    #[serde(default)]
    pub unique_users: u64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The immutable server payload of a `realtime_event` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaPayload {
    pub user: UserInfo,
    pub tweet: TweetInfo,
    pub tokens: Vec<TokenMention>,
    pub stats: MentionStats,
    /// Server-assigned timestamp (ms since epoch).
    #[serde(default)]
    pub timestamp: i64,
}

// ── CaEvent ──────────────────────────────────────────────────────────

/// A validated, locally stamped mention event.
///
/// `id` and `received_at` are owned by the pipeline; everything under
/// `payload` is exactly what the server sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaEvent {
    pub id: Uuid,
    /// Local ingestion time (ms since epoch), non-decreasing per process.
    pub received_at: i64,
    #[serde(flatten)]
    pub payload: CaPayload,
}

impl CaEvent {
    /// Validate a raw `realtime_event` payload and stamp it with a fresh id
    /// and the current ingestion time.
    pub fn ingest(data: Value) -> Result<Self, Error> {
        let payload = validate_payload(data)?;
        Ok(Self {
            id: Uuid::new_v4(),
            received_at: ingestion_millis(),
            payload,
        })
    }

    /// Author handle, convenient for search and display.
    pub fn author(&self) -> &str {
        &self.payload.user.username
    }

    /// Whether any field a reader would search on contains `needle`.
    ///
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        let p = &self.payload;
        contains_ci(&p.tweet.text, needle)
            || contains_ci(&p.user.username, needle)
            || p.user
                .display_name
                .as_deref()
                .is_some_and(|n| contains_ci(n, needle))
            || p.tokens.iter().any(|t| {
                contains_ci(&t.address, needle)
                    || t.symbol.as_deref().is_some_and(|s| contains_ci(s, needle))
            })
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

// ── Validation ───────────────────────────────────────────────────────

/// Check that a payload carries every required sub-object before
/// attempting typed deserialization.
fn validate_payload(data: Value) -> Result<CaPayload, Error> {
    let Some(obj) = data.as_object() else {
        return Err(invalid("payload is not an object"));
    };

    for key in ["user", "tweet", "stats"] {
        if !obj.get(key).is_some_and(Value::is_object) {
            return Err(invalid(format!("missing `{key}` object")));
        }
    }
    if !obj.get("tokens").is_some_and(Value::is_array) {
        return Err(invalid("missing `tokens` array"));
    }

    serde_json::from_value(data).map_err(|e| invalid(e.to_string()))
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidEvent {
        reason: reason.into(),
    }
}

// ── Ingestion clock ──────────────────────────────────────────────────

static LAST_RECEIVED_AT: AtomicI64 = AtomicI64::new(0);

/// Wall-clock milliseconds, clamped so consecutive stamps never go back.
fn ingestion_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    let prev = LAST_RECEIVED_AT.fetch_max(now, Ordering::AcqRel);
    now.max(prev)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "user": { "id": "u1", "username": "degen", "followersCount": 1200, "bio": "gm" },
            "tweet": { "id": "t1", "text": "aping into So1aNaCa ser" },
            "tokens": [{ "address": "So1aNaCa", "symbol": "WIF", "network": "solana" }],
            "stats": { "mentionCount": 3, "uniqueUsers": 2 },
            "timestamp": 1_700_000_000_000_i64
        })
    }

    #[test]
    fn ingest_valid_payload() {
        let event = CaEvent::ingest(sample()).unwrap();
        assert_eq!(event.author(), "degen");
        assert_eq!(event.payload.user.followers_count, 1200);
        assert_eq!(event.payload.tokens.len(), 1);
        assert_eq!(event.payload.stats.mention_count, 3);
        assert_eq!(event.payload.timestamp, 1_700_000_000_000);
        // Unknown remote fields are preserved.
        assert_eq!(event.payload.user.extra["bio"], "gm");
    }

    #[test]
    fn ingest_assigns_unique_ids_and_monotonic_time() {
        let a = CaEvent::ingest(sample()).unwrap();
        let b = CaEvent::ingest(sample()).unwrap();
        assert_ne!(a.id, b.id);
        assert!(b.received_at >= a.received_at);
    }

    #[test]
    fn ingest_accepts_empty_token_list() {
        let mut data = sample();
        data["tokens"] = json!([]);
        assert!(CaEvent::ingest(data).is_ok());
    }

    #[test]
    fn ingest_rejects_missing_sub_objects() {
        for key in ["user", "tweet", "tokens", "stats"] {
            let mut data = sample();
            data.as_object_mut().unwrap().remove(key);
            let err = CaEvent::ingest(data).unwrap_err();
            assert!(
                matches!(err, Error::InvalidEvent { .. }),
                "missing {key} should be invalid, got {err:?}"
            );
        }
    }

    #[test]
    fn ingest_rejects_wrong_shapes() {
        let mut data = sample();
        data["user"] = json!("not an object");
        assert!(CaEvent::ingest(data).is_err());

        assert!(CaEvent::ingest(json!([1, 2, 3])).is_err());

        let mut data = sample();
        data["tokens"] = json!([{ "symbol": "NOADDR" }]);
        assert!(CaEvent::ingest(data).is_err());
    }

    #[test]
    fn serialized_event_round_trips_payload() {
        let event = CaEvent::ingest(sample()).unwrap();
        let text = serde_json::to_string(&event).unwrap();
        let back: CaEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back, event);

        let raw: Value = serde_json::from_str(&text).unwrap();
        assert!(raw.get("receivedAt").is_some());
        assert_eq!(raw["tweet"]["text"], "aping into So1aNaCa ser");
    }

    #[test]
    fn matches_is_case_insensitive_across_fields() {
        let event = CaEvent::ingest(sample()).unwrap();
        assert!(event.matches("aping"));
        assert!(event.matches("so1anaca"));
        assert!(event.matches("wif"));
        assert!(event.matches("degen"));
        assert!(!event.matches("bonk"));
    }
}
