// cafeed-core: subscription, flow control, and event cache between cafeed-api and consumers.

pub mod cache;
mod collection;
pub mod config;
pub mod error;
pub mod flow;
pub mod pipeline;
pub mod stream;
pub mod subscription;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{CacheStats, CacheStore, FileStore, KeyValueStore, MemoryStore};
pub use config::{CacheConfig, FlowConfig, PipelineConfig, expiry_days};
pub use error::{CoreError, StoreError};
pub use flow::{DisplayBatch, FlowController, FlowStatus};
pub use pipeline::Pipeline;
pub use stream::{EventStream, EventWatchStream};
pub use subscription::SubscriptionController;

// Wire-level types consumers need alongside the pipeline.
pub use cafeed_api::{
    CaEvent, ConnectionConfig, ConnectionState, ReconnectConfig, StaticToken, SubscriptionFilter,
    TokenProvider,
};
