// ── Reactive event streams ──
//
// Subscription types for consuming changes to the cache and display lists.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use cafeed_api::CaEvent;
use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::collection::Snapshot;

/// A subscription to a newest-first list of events.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via the `changed()` method or by converting to a `Stream`.
pub struct EventStream {
    current: Snapshot,
    receiver: watch::Receiver<Snapshot>,
}

impl EventStream {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> &Arc<Vec<Arc<CaEvent>>> {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Arc<Vec<Arc<CaEvent>>> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` once the owning list has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<Vec<Arc<CaEvent>>>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> EventWatchStream {
        EventWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding a fresh snapshot each time the list changes.
/// The first item is the snapshot current at conversion time.
pub struct EventWatchStream {
    inner: WatchStream<Snapshot>,
}

impl Stream for EventWatchStream {
    type Item = Arc<Vec<Arc<CaEvent>>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
