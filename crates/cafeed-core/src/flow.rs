// ── Presentation flow control ──
//
// Gates validated events between the feed and the display list. While the
// user has paused the feed or is holding it (hovering), events pile up in
// a bounded buffer; after release the buffer is flushed in one batch once
// a short debounce has elapsed. The controller is plain state driven by
// its owner: it never spawns tasks or sleeps itself.

use std::collections::VecDeque;
use std::sync::Arc;

use cafeed_api::CaEvent;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::collection::{EventCollection, Snapshot};
use crate::config::FlowConfig;
use crate::stream::EventStream;

/// Events that just reached the display list, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayBatch {
    pub events: Vec<Arc<CaEvent>>,
    /// `true` when the batch came out of the buffer after a release.
    pub flushed: bool,
}

/// Gate and buffer bookkeeping, for status lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowStatus {
    pub paused: bool,
    pub held: bool,
    pub buffered: usize,
    pub dropped: u64,
}

pub struct FlowController {
    config: FlowConfig,
    paused: bool,
    held: bool,
    /// Newest first.
    buffer: VecDeque<Arc<CaEvent>>,
    flush_at: Option<Instant>,
    dropped: u64,
    display: EventCollection,
}

impl FlowController {
    pub fn new(config: FlowConfig) -> Self {
        Self {
            config,
            paused: false,
            held: false,
            buffer: VecDeque::new(),
            flush_at: None,
            dropped: 0,
            display: EventCollection::new(),
        }
    }

    /// Either gate condition is active.
    pub fn is_gated(&self) -> bool {
        self.paused || self.held
    }

    pub fn set_paused(&mut self, paused: bool, now: Instant) {
        self.paused = paused;
        self.regate(now);
    }

    pub fn set_held(&mut self, held: bool, now: Instant) {
        self.held = held;
        self.regate(now);
    }

    /// Route one validated event. Returns the batch that reached the
    /// display, or `None` if the event was buffered.
    pub fn on_event(&mut self, event: Arc<CaEvent>) -> Option<DisplayBatch> {
        // A pending flush still owns the display: later events queue
        // behind the buffered ones.
        if self.is_gated() || self.flush_at.is_some() {
            self.buffer.push_front(event);
            if self.buffer.len() > self.config.buffer_capacity {
                self.buffer.pop_back();
                self.dropped += 1;
                warn!(
                    capacity = self.config.buffer_capacity,
                    dropped = self.dropped,
                    "flow buffer full, dropped oldest buffered event"
                );
            }
            return None;
        }

        self.display
            .prepend(vec![Arc::clone(&event)], self.config.max_display);
        Some(DisplayBatch {
            events: vec![event],
            flushed: false,
        })
    }

    /// When the pending flush is due, if any.
    pub fn flush_deadline(&self) -> Option<Instant> {
        self.flush_at
    }

    /// Flush the buffer if the debounce has elapsed by `now`.
    pub fn poll_flush(&mut self, now: Instant) -> Option<DisplayBatch> {
        match self.flush_at {
            Some(at) if at <= now => self.flush(),
            _ => None,
        }
    }

    /// Empty the buffer and the display list and cancel any pending flush.
    pub fn clear(&mut self) {
        let buffered = self.buffer.len();
        self.buffer.clear();
        self.flush_at = None;
        self.display.clear();
        debug!(buffered, "flow cleared");
    }

    pub fn status(&self) -> FlowStatus {
        FlowStatus {
            paused: self.paused,
            held: self.held,
            buffered: self.buffer.len(),
            dropped: self.dropped,
        }
    }

    /// Current display list, newest first.
    pub fn display(&self) -> Arc<Vec<Arc<CaEvent>>> {
        self.display.snapshot()
    }

    /// Subscribe to display list changes.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.watch_display())
    }

    pub(crate) fn watch_display(&self) -> watch::Receiver<Snapshot> {
        self.display.subscribe()
    }

    fn regate(&mut self, now: Instant) {
        if self.is_gated() {
            if self.flush_at.take().is_some() {
                debug!("re-gated before flush, flush cancelled");
            }
        } else if !self.buffer.is_empty() && self.flush_at.is_none() {
            self.flush_at = Some(now + self.config.debounce);
        }
    }

    fn flush(&mut self) -> Option<DisplayBatch> {
        self.flush_at = None;
        if self.buffer.is_empty() {
            return None;
        }
        let events: Vec<_> = self.buffer.drain(..).collect();
        let trimmed = self
            .display
            .prepend(events.clone(), self.config.max_display);
        debug!(flushed = events.len(), trimmed, "flow buffer flushed");
        Some(DisplayBatch {
            events,
            flushed: true,
        })
    }
}
