// ── Core error types ──
//
// User-facing errors from cafeed-core. Consumers never see WebSocket
// frames or JSON parse failures directly: the `From<cafeed_api::Error>`
// impl translates transport-layer errors into domain-appropriate variants.

use thiserror::Error;

/// Failure of the persistent key-value store behind the cache.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on store key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid store key '{0}'")]
    InvalidKey(String),

    #[error("Store record could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store worker failed: {0}")]
    Worker(String),
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to feed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Feed disconnected")]
    Disconnected,

    #[error("Feed connection timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Cache store error: {0}")]
    Store(#[from] StoreError),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<cafeed_api::Error> for CoreError {
    fn from(err: cafeed_api::Error) -> Self {
        match err {
            cafeed_api::Error::MissingToken => CoreError::AuthenticationFailed {
                message: "no token available".into(),
            },
            cafeed_api::Error::AuthRejected { status } => CoreError::AuthenticationFailed {
                message: format!("server rejected token (HTTP {status})"),
            },
            cafeed_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            cafeed_api::Error::Timeout { timeout_ms }
            | cafeed_api::Error::HeartbeatTimeout { timeout_ms } => {
                CoreError::Timeout { timeout_ms }
            }
            cafeed_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                reason: format!("WebSocket connection failed: {reason}"),
            },
            cafeed_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            cafeed_api::Error::Protocol(e) => CoreError::Protocol {
                message: e.to_string(),
            },
            cafeed_api::Error::InvalidEvent { reason } => CoreError::Protocol { message: reason },
            cafeed_api::Error::ChannelClosed => CoreError::Disconnected,
        }
    }
}
