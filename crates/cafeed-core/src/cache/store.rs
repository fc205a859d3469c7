// ── Bounded, expiring, persisted event cache ──
//
// Every validated event lands here regardless of pause state. The
// in-memory collection is authoritative; persistence is best-effort and
// funnelled through one writer task per cache so the store sees writes in
// mutation order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use cafeed_api::CaEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::kv::KeyValueStore;
use crate::collection::{self, EventCollection};
use crate::config::CacheConfig;
use crate::error::StoreError;
use crate::stream::EventStream;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Persisted shape of the whole collection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCache {
    events: Vec<Arc<CaEvent>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCacheRef<'a> {
    events: &'a [Arc<CaEvent>],
    last_updated: i64,
    count: usize,
}

enum WriteJob {
    Persist(String),
    Remove,
    Flush(oneshot::Sender<()>),
}

/// Summary numbers for banners and `cache stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total: usize,
    pub unique_tokens: usize,
    pub unique_authors: usize,
    pub oldest_received_at: Option<i64>,
    pub newest_received_at: Option<i64>,
}

/// Handle to a cache instance. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    config: CacheConfig,
    events: EventCollection,
    store: Arc<dyn KeyValueStore>,
    writes: mpsc::UnboundedSender<WriteJob>,
}

impl CacheStore {
    /// Create an empty cache and start its writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: CacheConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let (writes, jobs) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(Arc::clone(&store), config.key.clone(), jobs));

        Self {
            inner: Arc::new(CacheInner {
                config,
                events: EventCollection::new(),
                store,
                writes,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Read the persisted collection, prune it, and make it current.
    ///
    /// Expired entries go first, then the oldest beyond `max_size`. If
    /// pruning removed anything the reduced collection is written back.
    /// Returns the number of events kept.
    pub async fn load(&self) -> Result<usize, StoreError> {
        let store = Arc::clone(&self.inner.store);
        let key = self.inner.config.key.clone();
        let body = tokio::task::spawn_blocking(move || store.get(&key))
            .await
            .map_err(|e| StoreError::Worker(e.to_string()))??;

        let Some(body) = body else {
            debug!(key = %self.inner.config.key, "no persisted cache record");
            return Ok(0);
        };
        let record: PersistedCache = serde_json::from_str(&body)?;

        let mut events = record.events;
        let stored = events.len();
        let expired = collection::expire(&mut events, self.cutoff());
        collection::newest_first(&mut events);
        let overflow = collection::cap(&mut events, self.inner.config.max_size);
        let kept = events.len();

        self.inner.events.replace(events, self.inner.config.max_size);
        info!(stored, kept, expired, overflow, "cache loaded");

        if expired + overflow > 0 {
            self.persist();
        }
        Ok(kept)
    }

    /// Record a validated event: prepend, evict, persist.
    ///
    /// Returns immediately; the write happens on the writer task.
    pub fn add(&self, event: Arc<CaEvent>) {
        let overflow = self
            .inner
            .events
            .prepend(vec![event], self.inner.config.max_size);
        let expired = self.inner.events.expire_before(self.cutoff());
        if overflow + expired > 0 {
            trace!(overflow, expired, "cache evicted entries");
        }
        self.persist();
    }

    /// Re-apply TTL eviction. Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let removed = self.inner.events.expire_before(self.cutoff());
        if removed > 0 {
            debug!(removed, "cache sweep evicted expired entries");
            self.persist();
        }
        removed
    }

    /// Drop every entry and delete the persisted record.
    pub fn clear(&self) {
        let had_entries = self.inner.events.clear();
        info!(had_entries, "cache cleared");
        self.enqueue(WriteJob::Remove);
    }

    /// Run [`sweep`](Self::sweep) every `sweep_interval` until cancelled.
    pub fn spawn_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let cache = self.clone();
        let period = self.inner.config.sweep_interval.max(MIN_SWEEP_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        cache.sweep();
                    }
                }
            }
            debug!("cache sweeper stopped");
        })
    }

    /// Wait until every write queued so far has reached the store.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        self.enqueue(WriteJob::Flush(done));
        let _ = wait.await;
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Newest-first snapshot of the cached events.
    pub fn events(&self) -> Arc<Vec<Arc<CaEvent>>> {
        self.inner.events.snapshot()
    }

    pub fn len(&self) -> usize {
        self.inner.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Case-insensitive search over tweet text, author and token fields.
    /// An empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<Arc<CaEvent>> {
        let needle = query.trim().to_lowercase();
        self.events()
            .iter()
            .filter(|event| needle.is_empty() || event.matches(&needle))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        let events = self.events();
        let tokens: HashSet<&str> = events
            .iter()
            .flat_map(|e| e.payload.tokens.iter().map(|t| t.address.as_str()))
            .collect();
        let authors: HashSet<&str> = events
            .iter()
            .map(|e| e.payload.user.id.as_str())
            .collect();

        CacheStats {
            total: events.len(),
            unique_tokens: tokens.len(),
            unique_authors: authors.len(),
            oldest_received_at: events.last().map(|e| e.received_at),
            newest_received_at: events.first().map(|e| e.received_at),
        }
    }

    /// Subscribe to collection changes.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.inner.events.subscribe())
    }

    // ── Internals ────────────────────────────────────────────────────

    fn cutoff(&self) -> i64 {
        let window = i64::try_from(self.inner.config.expiry.as_millis()).unwrap_or(i64::MAX);
        chrono::Utc::now().timestamp_millis().saturating_sub(window)
    }

    fn persist(&self) {
        let events = self.inner.events.snapshot();
        let record = PersistedCacheRef {
            events: &events,
            last_updated: chrono::Utc::now().timestamp_millis(),
            count: events.len(),
        };
        match serde_json::to_string(&record) {
            Ok(body) => {
                trace!(
                    version = self.inner.events.version(),
                    count = record.count,
                    "cache persist queued"
                );
                self.enqueue(WriteJob::Persist(body));
            }
            Err(e) => warn!(error = %e, "failed to serialize cache"),
        }
    }

    fn enqueue(&self, job: WriteJob) {
        if self.inner.writes.send(job).is_err() {
            warn!("cache writer stopped, write dropped");
        }
    }
}

/// Single writer per cache. Consecutive persists that are already queued
/// collapse into the newest one.
async fn write_loop(
    store: Arc<dyn KeyValueStore>,
    key: String,
    mut jobs: mpsc::UnboundedReceiver<WriteJob>,
) {
    let mut lookahead = None;

    loop {
        let job = match lookahead.take() {
            Some(job) => job,
            None => match jobs.recv().await {
                Some(job) => job,
                None => break,
            },
        };

        match job {
            WriteJob::Persist(mut body) => {
                while let Ok(queued) = jobs.try_recv() {
                    match queued {
                        WriteJob::Persist(newer) => body = newer,
                        other => {
                            lookahead = Some(other);
                            break;
                        }
                    }
                }
                let store = Arc::clone(&store);
                let key = key.clone();
                let result = tokio::task::spawn_blocking(move || store.set(&key, &body)).await;
                report("persist", result);
            }
            WriteJob::Remove => {
                let store = Arc::clone(&store);
                let key = key.clone();
                let result = tokio::task::spawn_blocking(move || store.remove(&key)).await;
                report("remove", result);
            }
            WriteJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    trace!("cache writer stopped");
}

fn report(op: &'static str, result: Result<Result<(), StoreError>, JoinError>) {
    match result {
        Ok(Ok(())) => trace!(op, "cache write complete"),
        Ok(Err(e)) => warn!(op, error = %e, "cache write failed"),
        Err(e) => warn!(op, error = %e, "cache write task failed"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    use super::*;
    use crate::cache::kv::MemoryStore;
    use crate::collection::test_support::{event_at, labels};

    const DAY_MS: i64 = 86_400_000;

    fn now() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn cache_with(max_size: usize, store: Arc<MemoryStore>) -> CacheStore {
        let config = CacheConfig {
            max_size,
            ..CacheConfig::default()
        };
        CacheStore::new(config, store)
    }

    fn persisted(store: &MemoryStore) -> Option<Value> {
        store
            .get("ca_event_cache")
            .unwrap()
            .map(|body| serde_json::from_str(&body).unwrap())
    }

    #[tokio::test]
    async fn size_eviction_drops_oldest() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(3, Arc::clone(&store));
        let base = now();

        for (i, label) in ["A", "B", "C", "D"].into_iter().enumerate() {
            cache.add(event_at(label, base + i64::try_from(i).unwrap()));
            assert!(cache.len() <= 3);
        }
        assert_eq!(labels(&cache.events()), ["D", "C", "B"]);

        cache.flush().await;
        let record = persisted(&store).unwrap();
        assert_eq!(record["count"], 3);
        assert_eq!(record["events"].as_array().unwrap().len(), 3);
        assert!(record["lastUpdated"].as_i64().unwrap() >= base);
    }

    #[tokio::test]
    async fn add_never_keeps_expired_entries() {
        let cache = cache_with(10, Arc::new(MemoryStore::new()));
        cache.add(event_at("stale", now() - 8 * DAY_MS));
        cache.add(event_at("fresh", now()));
        assert_eq!(labels(&cache.events()), ["fresh"]);
    }

    #[tokio::test]
    async fn load_prunes_and_writes_back() {
        let store = Arc::new(MemoryStore::new());
        let fresh = now();
        // Seed the store directly so stale entries survive until load.
        let events = vec![
            event_at("stale", fresh - 8 * DAY_MS),
            event_at("one", fresh - 2),
            event_at("two", fresh - 1),
            event_at("three", fresh),
        ];
        let body = serde_json::to_string(&PersistedCacheRef {
            events: &events,
            last_updated: fresh,
            count: events.len(),
        })
        .unwrap();
        store.set("ca_event_cache", &body).unwrap();

        let cache = cache_with(2, Arc::clone(&store));
        let kept = cache.load().await.unwrap();
        assert_eq!(kept, 2);
        assert_eq!(labels(&cache.events()), ["three", "two"]);

        cache.flush().await;
        assert_eq!(persisted(&store).unwrap()["count"], 2);
    }

    #[tokio::test]
    async fn load_round_trips_remote_fields() {
        let store = Arc::new(MemoryStore::new());
        let writer = cache_with(10, Arc::clone(&store));
        let mut event = (*event_at("A", now())).clone();
        event
            .payload
            .user
            .extra
            .insert("avatar".into(), Value::from("https://img/a.png"));
        let id = event.id;
        writer.add(Arc::new(event));
        writer.flush().await;

        let reader = cache_with(10, Arc::clone(&store));
        assert_eq!(reader.load().await.unwrap(), 1);
        let loaded = &reader.events()[0];
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.payload.user.extra["avatar"], "https://img/a.png");
    }

    #[tokio::test]
    async fn load_without_record_is_empty() {
        let cache = cache_with(10, Arc::new(MemoryStore::new()));
        assert_eq!(cache.load().await.unwrap(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn load_rejects_corrupt_record() {
        let store = Arc::new(MemoryStore::new());
        store.set("ca_event_cache", "{not json").unwrap();
        let cache = cache_with(10, store);
        assert!(matches!(
            cache.load().await,
            Err(StoreError::Serialization(_))
        ));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn clear_empties_and_deletes_record() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(10, Arc::clone(&store));
        cache.add(event_at("A", now()));
        cache.flush().await;
        assert!(persisted(&store).is_some());

        cache.clear();
        cache.flush().await;
        assert!(cache.is_empty());
        assert!(persisted(&store).is_none());
    }

    #[tokio::test]
    async fn sweeper_evicts_entries_that_age_out() {
        let config = CacheConfig {
            expiry: Duration::from_millis(100),
            sweep_interval: Duration::from_millis(20),
            ..CacheConfig::default()
        };
        let cache = CacheStore::new(config, Arc::new(MemoryStore::new()));
        cache.add(event_at("A", now()));
        assert_eq!(cache.len(), 1);

        let cancel = CancellationToken::new();
        let sweeper = cache.spawn_sweeper(cancel.clone());
        let mut changes = cache.subscribe();
        tokio::time::timeout(Duration::from_secs(2), async {
            while !changes.latest().is_empty() {
                changes.changed().await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        sweeper.await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn search_and_stats_reflect_contents() {
        let cache = cache_with(10, Arc::new(MemoryStore::new()));
        let base = now();
        cache.add(event_at("alpha", base));
        cache.add(event_at("beta", base + 1));

        assert_eq!(labels(&cache.search("ALPHA")), ["alpha"]);
        assert_eq!(labels(&cache.search("user_beta")), ["beta"]);
        assert_eq!(cache.search("  ").len(), 2);
        assert!(cache.search("gamma").is_empty());

        assert_eq!(
            cache.stats(),
            CacheStats {
                total: 2,
                unique_tokens: 2,
                unique_authors: 2,
                oldest_received_at: Some(base),
                newest_received_at: Some(base + 1),
            }
        );
    }

    #[tokio::test]
    async fn writes_reach_file_store_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(crate::cache::kv::FileStore::new(tmp.path()));
        let cache = CacheStore::new(CacheConfig::default(), store);
        let base = now();
        for i in 0..20 {
            cache.add(event_at(&format!("e{i}"), base + i));
        }
        cache.flush().await;

        let body = std::fs::read_to_string(tmp.path().join("ca_event_cache.json")).unwrap();
        let record: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(record["count"], 20);
        assert_eq!(record["events"][0]["tweet"]["text"], "tweet e19");
    }
}
