// ── Subscription controller ──
//
// Owns the active filter. The connection reads it on every successful
// open and sends it as the subscribe message; while connected, updates
// go out immediately as update messages.

use std::sync::Arc;

use cafeed_api::{ClientMessage, ConnectionManager, ConnectionState, SubscriptionFilter};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::CoreError;

#[derive(Clone)]
pub struct SubscriptionController {
    filter: Arc<watch::Sender<SubscriptionFilter>>,
    connection: ConnectionManager,
}

impl SubscriptionController {
    /// `filter` must be the sender whose receiver was handed to the
    /// connection.
    pub fn new(filter: watch::Sender<SubscriptionFilter>, connection: ConnectionManager) -> Self {
        Self {
            filter: Arc::new(filter),
            connection,
        }
    }

    /// The filter currently held.
    pub fn current(&self) -> SubscriptionFilter {
        self.filter.borrow().clone()
    }

    /// Replace the filter. If connected, the server gets it right away;
    /// otherwise it goes out with the next subscribe.
    ///
    /// Returns `Ok(true)` if an update message was queued.
    pub fn update_subscription(&self, filter: SubscriptionFilter) -> Result<bool, CoreError> {
        // Store first: a connection opening concurrently then reads the
        // new value even if it is not yet reported as connected.
        self.filter.send_replace(filter.clone());

        let state = self.connection.current_state();
        if state != ConnectionState::Connected {
            debug!(%state, "filter stored for next connection");
            return Ok(false);
        }

        self.connection.send(ClientMessage::Update(filter))?;
        info!("subscription update sent");
        Ok(true)
    }
}
