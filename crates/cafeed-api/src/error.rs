use thiserror::Error;

/// Top-level error type for the `cafeed-api` crate.
///
/// Covers every failure mode of the feed connection: authentication,
/// transport, and protocol. `cafeed-core` maps these into its own
/// [`CoreError`](https://docs.rs/cafeed-core) variants.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The token provider returned nothing (or an empty token).
    #[error("No authentication token available")]
    MissingToken,

    /// The server refused the WebSocket upgrade (HTTP 401/403).
    #[error("Authentication rejected by server (HTTP {status})")]
    AuthRejected { status: u16 },

    // ── Transport ───────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Connection establishment did not finish in time.
    #[error("Connection timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed with a non-normal close code.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// No pong arrived inside the pong window after a ping.
    #[error("Heartbeat timed out: no pong within {timeout_ms}ms")]
    HeartbeatTimeout { timeout_ms: u64 },

    // ── Protocol ────────────────────────────────────────────────────
    /// Inbound frame was not a recognisable server message.
    #[error("Malformed server message: {0}")]
    Protocol(#[from] serde_json::Error),

    /// A live event failed structural validation.
    #[error("Invalid realtime event: {reason}")]
    InvalidEvent { reason: String },

    /// The connection task is gone (handle outlived the runtime).
    #[error("Connection task closed")]
    ChannelClosed,
}

impl Error {
    /// Returns `true` if this error is an authentication failure.
    ///
    /// Auth failures are terminal for the current attempt: they are never
    /// retried automatically.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::MissingToken | Self::AuthRejected { .. })
    }

    /// Returns `true` if this is a transport failure the reconnect loop
    /// is allowed to recover from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::WebSocketConnect(_)
                | Self::WebSocketClosed { .. }
                | Self::HeartbeatTimeout { .. }
        )
    }
}
