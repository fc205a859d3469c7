// ── Event cache ──
//
// The durability layer: a bounded, TTL-expiring collection of every
// validated event, persisted through a pluggable key-value store.

mod kv;
mod store;

pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use store::{CacheStats, CacheStore};
