// ── Runtime pipeline configuration ──
//
// These types describe how the pipeline behaves: where to connect, how
// to retry, how much to cache, how to pace the display. They never touch
// disk. The CLI (via cafeed-config) builds a `PipelineConfig` and hands
// it in.

use std::time::Duration;

use cafeed_api::{ConnectionConfig, SubscriptionFilter};
use url::Url;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Cache sizing and expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached events. Default: 1000.
    pub max_size: usize,
    /// Entries older than this (by `received_at`) are evicted. Default: 7 days.
    pub expiry: Duration,
    /// Period of the background TTL sweep. Default: 60s.
    pub sweep_interval: Duration,
    /// Key of the persisted record in the key-value store.
    pub key: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            expiry: expiry_days(7),
            sweep_interval: Duration::from_secs(60),
            key: "ca_event_cache".into(),
        }
    }
}

/// Convert a day count into an expiry window.
pub fn expiry_days(days: u32) -> Duration {
    DAY.saturating_mul(days)
}

/// Presentation pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowConfig {
    /// Quiet period after release before the buffer is flushed. Default: 300ms.
    pub debounce: Duration,
    /// Maximum length of the display list. Default: 100.
    pub max_display: usize,
    /// Maximum number of events held while gated. Default: 1000.
    pub buffer_capacity: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            max_display: 100,
            buffer_capacity: 1000,
        }
    }
}

/// Complete configuration of a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub connection: ConnectionConfig,
    /// Connect as soon as the pipeline starts.
    pub auto_connect: bool,
    /// Filter sent on the first connection.
    pub filter: SubscriptionFilter,
    pub cache: CacheConfig,
    pub flow: FlowConfig,
}

impl PipelineConfig {
    /// Defaults for everything but the endpoint.
    pub fn new(url: Url) -> Self {
        Self {
            connection: ConnectionConfig::new(url),
            auto_connect: true,
            filter: SubscriptionFilter::default(),
            cache: CacheConfig::default(),
            flow: FlowConfig::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_documented_values() {
        let config = PipelineConfig::new("wss://feed.example.com/ws".parse().unwrap());
        assert!(config.auto_connect);
        assert!(config.connection.auto_retry);
        assert_eq!(config.cache.max_size, 1000);
        assert_eq!(config.cache.expiry, Duration::from_secs(7 * 86_400));
        assert_eq!(config.flow.max_display, 100);
        assert_eq!(config.flow.debounce, Duration::from_millis(300));
    }

    #[test]
    fn expiry_days_saturates() {
        assert_eq!(expiry_days(1), Duration::from_secs(86_400));
        assert_eq!(expiry_days(0), Duration::ZERO);
    }
}
