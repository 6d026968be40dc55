//! Session manager
//!
//! Owns the shared feedback channel and spawns one background workflow task
//! per document, keeping the transport's receive loop free to push feedback
//! in. Also the seam to the document store: fully generated documents are
//! replayed from storage instead of re-running the workflow, and finished
//! sessions are persisted for later replay.

use std::sync::Arc;
use std::time::Duration;

use docstore::DocStore;
use eyre::Result;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::delivery::DeliverySink;
use crate::feedback::{FeedbackChannel, FeedbackError, parse_incoming};
use crate::llm::LlmClient;
use crate::templates;
use crate::workflow::{Checkpointer, SectionGenerator, SectionPlanner, SessionState, WorkflowEngine};

/// Coordinates document workflows, feedback ingress, and replay
#[derive(Clone)]
pub struct SessionManager {
    config: Config,
    llm: Arc<dyn LlmClient>,
    channel: FeedbackChannel,
    sink: Arc<dyn DeliverySink>,
    store: Option<Arc<DocStore>>,
    checkpointer: Checkpointer,
}

impl SessionManager {
    pub fn new(
        config: Config,
        llm: Arc<dyn LlmClient>,
        sink: Arc<dyn DeliverySink>,
        store: Option<Arc<DocStore>>,
    ) -> Self {
        let channel = FeedbackChannel::new(Duration::from_secs(config.feedback.wait_timeout_secs));
        Self {
            config,
            llm,
            channel,
            sink,
            store,
            checkpointer: Checkpointer::new(),
        }
    }

    /// The shared feedback channel (for the transport side)
    pub fn channel(&self) -> FeedbackChannel {
        self.channel.clone()
    }

    /// Record a client connection for a document
    pub async fn client_connected(&self, document_id: &str) {
        self.channel.client_connected(document_id).await;
    }

    /// Record a client disconnect for a document
    pub async fn client_disconnected(&self, document_id: &str) {
        self.channel.client_disconnected(document_id).await;
    }

    /// Validate and route an inbound feedback payload
    ///
    /// Malformed payloads are rejected before they reach the channel.
    pub async fn handle_feedback(&self, raw: &serde_json::Value) -> Result<(), FeedbackError> {
        let incoming = parse_incoming(raw)?;
        debug!(
            section_id = %incoming.section_id,
            feedback = %incoming.payload.feedback_type,
            "Routing feedback"
        );

        // Keep the durable record current; the section may not be persisted
        // yet, in which case this touches nothing
        if let Some(store) = &self.store
            && let Err(e) = store.update_section_feedback(
                &incoming.section_id,
                incoming.payload.feedback_type.as_str(),
                incoming.payload.edited_content.as_deref(),
            )
        {
            warn!(error = %e, section_id = %incoming.section_id, "Failed to record feedback");
        }

        self.channel.deliver(&incoming.section_id, incoming.payload).await;
        Ok(())
    }

    /// Run a document workflow to completion
    ///
    /// A document whose content was already generated short-circuits to a
    /// replay of its stored sections.
    pub async fn run_document(&self, document_id: &str, query: &str, template_type: &str) -> Result<SessionState> {
        if let Some(store) = &self.store
            && store.content_generated(document_id)?
        {
            info!(document_id, "Document already generated, replaying stored sections");
            return self.replayed_state(document_id, query, template_type).await;
        }

        let state = SessionState::new(document_id, query, template_type);
        let engine = WorkflowEngine::new(
            state,
            SectionPlanner::new(self.llm.clone()),
            SectionGenerator::new(self.llm.clone(), self.config.llm.model.clone(), self.config.llm.max_tokens),
            self.channel.clone(),
            self.sink.clone(),
            self.checkpointer.clone(),
        );

        let final_state = engine.run().await?;

        if let Some(store) = &self.store
            && let Err(e) = self.persist(store, &final_state)
        {
            warn!(error = %e, document_id, "Failed to persist finished session");
        }

        Ok(final_state)
    }

    /// Spawn a document workflow as a background task
    pub fn spawn_document(&self, document_id: &str, query: &str, template_type: &str) -> JoinHandle<Result<SessionState>> {
        let manager = self.clone();
        let document_id = document_id.to_string();
        let query = query.to_string();
        let template_type = template_type.to_string();

        tokio::spawn(async move { manager.run_document(&document_id, &query, &template_type).await })
    }

    /// Re-deliver a stored document's sections in their original order
    ///
    /// Returns the number of sections delivered.
    pub async fn replay_document(&self, document_id: &str) -> Result<usize> {
        let Some(store) = &self.store else {
            return Err(eyre::eyre!("No document store configured"));
        };
        replay_stored(store, self.sink.as_ref(), document_id).await
    }

    /// Build a completed session state from stored sections after a replay
    async fn replayed_state(&self, document_id: &str, query: &str, template_type: &str) -> Result<SessionState> {
        self.replay_document(document_id).await?;

        let mut state = SessionState::new(document_id, query, template_type);
        if let Some(store) = &self.store {
            for row in store.sections_for(document_id)? {
                state.section_names.push(row.section_name.clone());
                state.sections.push(crate::workflow::SectionRecord {
                    id: row.id,
                    name: row.section_name,
                    content: row.content,
                });
            }
        }
        state.completed = true;
        state.final_content = state.live_content();
        Ok(state)
    }

    fn persist(&self, store: &DocStore, state: &SessionState) -> Result<()> {
        store.create_document(&state.document_id, &state.query, &state.template_type)?;

        for (position, section) in state.sections.iter().enumerate() {
            store.save_section(
                &state.document_id,
                &section.id,
                &section.name,
                &section.content,
                position as i64,
            )?;
        }

        if state.completed {
            store.mark_content_generated(&state.document_id)?;
        }
        Ok(())
    }
}

/// Deliver a stored document's sections in original order, then the
/// terminal signals
///
/// Delivery stays best-effort here too: a failed push is logged and the
/// replay keeps going.
pub async fn replay_stored(store: &DocStore, sink: &dyn DeliverySink, document_id: &str) -> Result<usize> {
    let rows = store.sections_for(document_id)?;
    for row in &rows {
        if let Err(e) = sink
            .deliver_section(
                document_id,
                &row.id,
                &row.section_name,
                &row.content,
                templates::is_editable(&row.section_name),
            )
            .await
        {
            warn!(error = %e, section_id = %row.id, "Failed to replay section");
        }
    }

    if let Err(e) = sink.deliver_stream_end(document_id).await {
        warn!(error = %e, "Failed to deliver stream end during replay");
    }
    if let Err(e) = sink.deliver_document_complete(document_id).await {
        warn!(error = %e, "Failed to deliver document complete during replay");
    }

    info!(document_id, sections = rows.len(), "Replayed stored document");
    Ok(rows.len())
}
