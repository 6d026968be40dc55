//! In-memory session checkpointing
//!
//! Snapshots of the session state keyed by a per-session run token, taken
//! after every phase step. Lives in process memory; a restarted process
//! falls back to the durable document store instead.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::state::SessionState;

/// Shared snapshot store for in-flight sessions
#[derive(Clone, Default)]
pub struct Checkpointer {
    inner: Arc<Mutex<HashMap<String, SessionState>>>,
}

impl Checkpointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot for a run token, replacing any previous one
    pub async fn save(&self, run_token: &str, state: &SessionState) {
        let mut snapshots = self.inner.lock().await;
        snapshots.insert(run_token.to_string(), state.clone());
    }

    /// Fetch the latest snapshot for a run token
    pub async fn load(&self, run_token: &str) -> Option<SessionState> {
        self.inner.lock().await.get(run_token).cloned()
    }

    /// Drop a session's snapshot once it terminates
    pub async fn remove(&self, run_token: &str) {
        self.inner.lock().await.remove(run_token);
    }
}
