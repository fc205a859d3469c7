// ── Pipeline facade ──
//
// Wires the connection, subscription, flow and cache components together
// and owns their background tasks. Consumers (the CLI, or any other
// presentation layer) only ever talk to `Pipeline`.

use std::sync::Arc;

use cafeed_api::{CaEvent, ConnectionManager, ConnectionState, SubscriptionFilter, TokenProvider};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, KeyValueStore};
use crate::collection::Snapshot;
use crate::config::PipelineConfig;
use crate::error::CoreError;
use crate::flow::{DisplayBatch, FlowController, FlowStatus};
use crate::stream::EventStream;
use crate::subscription::SubscriptionController;

const BATCH_CHANNEL_SIZE: usize = 256;

enum FlowCommand {
    Pause(bool),
    Hold(bool),
    Clear,
}

/// Everything the dispatch task takes ownership of on start.
struct Dispatch {
    flow: FlowController,
    events: mpsc::UnboundedReceiver<Arc<CaEvent>>,
    commands: mpsc::UnboundedReceiver<FlowCommand>,
}

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<PipelineInner>`. Construction spawns the
/// connection task but does not connect; [`start()`](Self::start) loads
/// the cache, spawns the dispatch and sweep tasks and, if configured,
/// connects.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    config: PipelineConfig,
    connection: ConnectionManager,
    subscription: SubscriptionController,
    cache: CacheStore,
    flow_tx: mpsc::UnboundedSender<FlowCommand>,
    dispatch: Mutex<Option<Dispatch>>,
    display: watch::Receiver<Snapshot>,
    flow_status: Arc<watch::Sender<FlowStatus>>,
    batch_tx: broadcast::Sender<Arc<DisplayBatch>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Pipeline {
    /// Build the pipeline. Must be called from within a tokio runtime.
    pub fn new(
        config: PipelineConfig,
        tokens: Arc<dyn TokenProvider>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let cancel = CancellationToken::new();

        let (filter_tx, filter_rx) = watch::channel(config.filter.clone());
        let (connection, events) =
            ConnectionManager::spawn(config.connection.clone(), tokens, filter_rx, &cancel);
        let subscription = SubscriptionController::new(filter_tx, connection.clone());
        let cache = CacheStore::new(config.cache.clone(), store);

        let flow = FlowController::new(config.flow.clone());
        let display = flow.watch_display();
        let (flow_tx, commands) = mpsc::unbounded_channel();
        let (flow_status, _) = watch::channel(flow.status());
        let (batch_tx, _) = broadcast::channel(BATCH_CHANNEL_SIZE);

        Self {
            inner: Arc::new(PipelineInner {
                config,
                connection,
                subscription,
                cache,
                flow_tx,
                dispatch: Mutex::new(Some(Dispatch {
                    flow,
                    events,
                    commands,
                })),
                display,
                flow_status: Arc::new(flow_status),
                batch_tx,
                cancel,
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Access the pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Access the event cache for historical queries.
    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Load the cache, spawn background tasks, and connect if
    /// `auto_connect` is set. Calling it again is a no-op.
    pub async fn start(&self) {
        let Some(dispatch) = self.inner.dispatch.lock().await.take() else {
            debug!("pipeline already started");
            return;
        };

        match self.inner.cache.load().await {
            Ok(count) => debug!(count, "cache ready"),
            Err(e) => warn!(error = %e, "cache load failed, starting empty"),
        }

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(self.inner.cache.spawn_sweeper(self.inner.cancel.clone()));
        handles.push(tokio::spawn(dispatch_task(
            dispatch,
            self.inner.cache.clone(),
            Arc::clone(&self.inner.flow_status),
            self.inner.batch_tx.clone(),
            self.inner.cancel.clone(),
        )));

        if self.inner.config.auto_connect {
            self.inner.connection.connect();
        }
        info!(auto_connect = self.inner.config.auto_connect, "pipeline started");
    }

    /// Connect unless already connected, connecting, or manually disconnected.
    pub fn connect(&self) {
        self.inner.connection.connect();
    }

    /// Disconnect and stay disconnected until auto-connect is re-enabled.
    pub async fn disconnect(&self) {
        self.inner.connection.disconnect().await;
    }

    /// The auto-connect toggle: on forces a connection even after a manual
    /// disconnect, off disconnects.
    pub async fn set_auto_connect(&self, enabled: bool) {
        if enabled {
            self.inner.connection.connect_forced();
        } else {
            self.inner.connection.disconnect().await;
        }
    }

    pub fn set_auto_retry(&self, enabled: bool) {
        self.inner.connection.set_auto_retry(enabled);
    }

    /// Disconnect, stop every background task, and wait for pending cache
    /// writes.
    pub async fn shutdown(&self) {
        self.inner.connection.disconnect().await;
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.inner.cache.flush().await;
        debug!("pipeline stopped");
    }

    // ── Subscription ─────────────────────────────────────────────────

    /// Replace the filter; sent immediately if connected.
    pub fn update_subscription(&self, filter: SubscriptionFilter) -> Result<bool, CoreError> {
        self.inner.subscription.update_subscription(filter)
    }

    pub fn subscription(&self) -> SubscriptionFilter {
        self.inner.subscription.current()
    }

    // ── Flow control ─────────────────────────────────────────────────

    /// Explicit pause toggle.
    pub fn set_paused(&self, paused: bool) {
        self.flow_command(FlowCommand::Pause(paused));
    }

    /// Transient hold, e.g. while the pointer is over the list.
    pub fn set_hover(&self, hovering: bool) {
        self.flow_command(FlowCommand::Hold(hovering));
    }

    /// Empty the display list and the pending buffer. The cache is untouched.
    pub fn clear_display(&self) {
        self.flow_command(FlowCommand::Clear);
    }

    fn flow_command(&self, command: FlowCommand) {
        if self.inner.flow_tx.send(command).is_err() {
            debug!("dispatch task gone, flow command ignored");
        }
    }

    // ── State observation ────────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.state()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.inner.connection.current_state()
    }

    /// Subscribe to the display list.
    pub fn display(&self) -> EventStream {
        EventStream::new(self.inner.display.clone())
    }

    pub fn display_snapshot(&self) -> Arc<Vec<Arc<CaEvent>>> {
        self.inner.display.borrow().clone()
    }

    /// Subscribe to batches as they reach the display.
    pub fn batches(&self) -> broadcast::Receiver<Arc<DisplayBatch>> {
        self.inner.batch_tx.subscribe()
    }

    /// Subscribe to gate and buffer status.
    pub fn flow_status(&self) -> watch::Receiver<FlowStatus> {
        self.inner.flow_status.subscribe()
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Route every validated event into the cache and through the flow
/// controller, and fire debounced flushes.
async fn dispatch_task(
    dispatch: Dispatch,
    cache: CacheStore,
    status: Arc<watch::Sender<FlowStatus>>,
    batches: broadcast::Sender<Arc<DisplayBatch>>,
    cancel: CancellationToken,
) {
    let Dispatch {
        mut flow,
        mut events,
        mut commands,
    } = dispatch;

    loop {
        let deadline = flow.flush_deadline();

        let batch = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            command = commands.recv() => {
                let Some(command) = command else { break };
                let now = Instant::now();
                match command {
                    FlowCommand::Pause(on) => flow.set_paused(on, now),
                    FlowCommand::Hold(on) => flow.set_held(on, now),
                    FlowCommand::Clear => flow.clear(),
                }
                None
            }
            () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                flow.poll_flush(Instant::now())
            }
            event = events.recv() => {
                let Some(event) = event else {
                    debug!("event source closed");
                    break;
                };
                cache.add(Arc::clone(&event));
                flow.on_event(event)
            }
        };

        if let Some(batch) = batch {
            // No receivers is fine: the display snapshot already changed.
            let _ = batches.send(Arc::new(batch));
        }

        let next = flow.status();
        status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
    debug!("dispatch task stopped");
}
