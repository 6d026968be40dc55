//! Per-section feedback rendezvous
//!
//! One workflow waits for exactly one feedback event per section while the
//! transport delivers events asynchronously. Deliveries may arrive before
//! the wait (buffered), during the wait (handed over), after resolution
//! (dropped), or never (the wait times out and resolves to a synthetic end
//! signal). All slot state lives behind a single lock so a delivery and a
//! wait for the same id cannot race to two different outcomes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

use super::types::{FeedbackError, FeedbackPayload};

/// Slot state for one section id
enum Slot {
    /// Feedback arrived before any waiter registered
    Buffered(FeedbackPayload),
    /// A waiter is registered and blocked
    Waiting(oneshot::Sender<FeedbackPayload>),
}

#[derive(Default)]
struct ChannelState {
    slots: HashMap<String, Slot>,
    /// Section ids whose wait has already resolved; late deliveries for
    /// these are accepted and dropped instead of leaking a buffer entry
    resolved: HashSet<String>,
    /// Documents with an active client connection
    connections: HashSet<String>,
}

/// Shared feedback channel, cloneable across workflow tasks and the transport
#[derive(Clone)]
pub struct FeedbackChannel {
    inner: Arc<Mutex<ChannelState>>,
    wait_timeout: Duration,
}

impl FeedbackChannel {
    /// Create a channel with the given feedback wait timeout
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ChannelState::default())),
            wait_timeout,
        }
    }

    /// Record that a client is connected for a document
    pub async fn client_connected(&self, document_id: &str) {
        let mut state = self.inner.lock().await;
        state.connections.insert(document_id.to_string());
        debug!(document_id, "Client connected");
    }

    /// Record that a document's client went away
    pub async fn client_disconnected(&self, document_id: &str) {
        let mut state = self.inner.lock().await;
        state.connections.remove(document_id);
        debug!(document_id, "Client disconnected");
    }

    /// Whether a document currently has a connected client
    pub async fn has_client(&self, document_id: &str) -> bool {
        self.inner.lock().await.connections.contains(document_id)
    }

    /// Deliver feedback for a section
    ///
    /// An active waiter receives the payload; otherwise the first delivery
    /// for an unresolved section is buffered for the next waiter. Everything
    /// else is accepted and dropped.
    pub async fn deliver(&self, section_id: &str, payload: FeedbackPayload) {
        let mut state = self.inner.lock().await;

        if state.resolved.contains(section_id) {
            debug!(section_id, "Dropping feedback for already-resolved section");
            return;
        }

        match state.slots.remove(section_id) {
            Some(Slot::Waiting(tx)) => {
                state.resolved.insert(section_id.to_string());
                if tx.send(payload).is_err() {
                    debug!(section_id, "Waiter gone before delivery completed");
                }
            }
            Some(Slot::Buffered(first)) => {
                // Only the first buffered delivery is ever observed
                debug!(section_id, "Dropping duplicate buffered feedback");
                state.slots.insert(section_id.to_string(), Slot::Buffered(first));
            }
            None => {
                state.slots.insert(section_id.to_string(), Slot::Buffered(payload));
                debug!(section_id, "Buffered feedback before wait registered");
            }
        }
    }

    /// Wait for feedback on a section
    ///
    /// Resolves immediately with a synthetic end signal when the document
    /// has no connected client, and with the same signal when the wait
    /// exceeds the channel timeout. Internal failure of a registered wait
    /// is the one error this returns.
    pub async fn await_feedback(
        &self,
        document_id: &str,
        section_id: &str,
    ) -> Result<FeedbackPayload, FeedbackError> {
        let mut rx = {
            let mut state = self.inner.lock().await;

            // Absence of a transport peer is itself a termination signal
            if !state.connections.contains(document_id) {
                debug!(document_id, section_id, "No client connected, resolving wait with end");
                state.resolved.insert(section_id.to_string());
                return Ok(FeedbackPayload::end());
            }

            match state.slots.remove(section_id) {
                Some(Slot::Buffered(payload)) => {
                    debug!(section_id, "Returning buffered feedback");
                    state.resolved.insert(section_id.to_string());
                    return Ok(payload);
                }
                Some(Slot::Waiting(_)) => {
                    // A previous wait for this id was abandoned; the new
                    // waiter supersedes it
                    warn!(section_id, "Replacing abandoned feedback waiter");
                }
                None => {}
            }

            let (tx, rx) = oneshot::channel();
            state.slots.insert(section_id.to_string(), Slot::Waiting(tx));
            rx
        };

        match tokio::time::timeout(self.wait_timeout, &mut rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => {
                // Sender dropped without a delivery: the channel lost the
                // wait registration, which has no safe recovery
                let mut state = self.inner.lock().await;
                state.slots.remove(section_id);
                Err(FeedbackError::WaiterAbandoned {
                    section_id: section_id.to_string(),
                })
            }
            Err(_elapsed) => {
                let mut state = self.inner.lock().await;
                state.slots.remove(section_id);
                state.resolved.insert(section_id.to_string());
                // A delivery racing the timeout still wins
                if let Ok(payload) = rx.try_recv() {
                    debug!(section_id, "Delivery won the timeout race");
                    return Ok(payload);
                }
                debug!(section_id, "Feedback wait timed out, resolving with end");
                Ok(FeedbackPayload::end())
            }
        }
    }
}
