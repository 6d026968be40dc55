//! Workflow engine - the per-document state machine
//!
//! Drives Plan → Generate → Stream → AwaitFeedback → ApplyFeedback → Decide
//! across all sections of one document. The topology is fixed and small, so
//! it is expressed as a tagged `Phase` plus an explicit step function rather
//! than a graph framework. Every phase except AwaitFeedback recovers from
//! failure (fallback content or a route back to Plan); AwaitFeedback is the
//! one phase allowed to fail the session, because there is no safe default
//! for an unknown human decision.

use std::sync::Arc;

use eyre::{Result, eyre};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::delivery::DeliverySink;
use crate::feedback::{FeedbackChannel, FeedbackKind};
use crate::templates;

use super::checkpoint::Checkpointer;
use super::generator::SectionGenerator;
use super::planner::SectionPlanner;
use super::state::{Phase, SectionRecord, SessionState, StateUpdate};

/// Output of one phase: a state delta plus the next phase
#[derive(Debug)]
pub struct Transition {
    pub update: StateUpdate,
    pub next: Phase,
}

impl Transition {
    fn to(next: Phase) -> Self {
        Self {
            update: StateUpdate::default(),
            next,
        }
    }
}

/// Drives one document's generation session to completion
pub struct WorkflowEngine {
    state: SessionState,
    phase: Phase,
    run_token: String,
    planner: SectionPlanner,
    generator: SectionGenerator,
    channel: FeedbackChannel,
    sink: Arc<dyn DeliverySink>,
    checkpointer: Checkpointer,
}

impl WorkflowEngine {
    pub fn new(
        state: SessionState,
        planner: SectionPlanner,
        generator: SectionGenerator,
        channel: FeedbackChannel,
        sink: Arc<dyn DeliverySink>,
        checkpointer: Checkpointer,
    ) -> Self {
        Self {
            state,
            phase: Phase::Plan,
            run_token: format!("run-{}", Uuid::now_v7()),
            planner,
            generator,
            channel,
            sink,
            checkpointer,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn run_token(&self) -> &str {
        &self.run_token
    }

    /// Run the session until it terminates
    ///
    /// Returns the final session state; the only error path is a failure
    /// inside the feedback wait itself.
    pub async fn run(mut self) -> Result<SessionState> {
        info!(document_id = %self.state.document_id, "Starting document workflow");

        while self.phase != Phase::Done {
            self.step().await?;
        }

        self.checkpointer.remove(&self.run_token).await;
        info!(
            document_id = %self.state.document_id,
            sections = self.state.sections.len(),
            "Document workflow finished"
        );
        Ok(self.state)
    }

    /// Execute the current phase, merge its delta, checkpoint the result
    pub async fn step(&mut self) -> Result<()> {
        let transition = match self.phase {
            Phase::Plan => self.plan().await,
            Phase::Generate => self.generate().await,
            Phase::Stream => self.stream().await,
            Phase::AwaitFeedback => self.await_feedback().await?,
            Phase::ApplyFeedback => self.apply_feedback(),
            Phase::Decide => self.decide().await,
            Phase::Done => Transition::to(Phase::Done),
        };

        self.state.apply(transition.update);
        self.phase = transition.next;
        self.checkpointer.save(&self.run_token, &self.state).await;
        Ok(())
    }

    async fn plan(&self) -> Transition {
        let names = self.planner.plan(&self.state.template_type, &self.state.query).await;
        info!(count = names.len(), "Planned document sections");

        Transition {
            update: StateUpdate {
                section_names: Some(names),
                current_section_index: Some(0),
                ..Default::default()
            },
            next: Phase::Generate,
        }
    }

    async fn generate(&self) -> Transition {
        if self.state.section_names.is_empty() {
            warn!("No section names in state, returning to planning");
            return Transition::to(Phase::Plan);
        }

        let index = self.state.current_section_index;
        if index >= self.state.section_names.len() {
            warn!(index, "Section index out of range, resetting and replanning");
            return Transition {
                update: StateUpdate {
                    current_section_index: Some(0),
                    ..Default::default()
                },
                next: Phase::Plan,
            };
        }

        let name = self.state.section_names[index].clone();
        debug!(%name, index, "Generating section content");

        let html = self.generator.generate(&self.state.query, &name).await;
        let section_id = format!("sec-{}", Uuid::now_v7());
        let record = SectionRecord {
            id: section_id.clone(),
            name,
            content: html.clone(),
        };

        let mut update = StateUpdate {
            current_section_id: Some(section_id),
            current_section_content: Some(html),
            ..Default::default()
        };

        // A regeneration replaces the live entry for the in-flight section
        // instead of appending a duplicate
        if self.state.last_feedback_type == FeedbackKind::Regenerate
            && let Some(old_id) = self.state.current_section_id.clone()
            && self.state.sections.iter().any(|s| s.id == old_id)
        {
            update.replace_section = Some((old_id, record));
        } else {
            update.append_section = Some(record);
        }

        Transition {
            update,
            next: Phase::Stream,
        }
    }

    async fn stream(&self) -> Transition {
        let (Some(section_id), Some(content)) = (
            self.state.current_section_id.as_deref(),
            self.state.current_section_content.as_deref(),
        ) else {
            warn!("In-flight section fields missing, returning to planning");
            return Transition::to(Phase::Plan);
        };

        if self.state.section_names.is_empty() || self.state.current_section_index >= self.state.section_names.len() {
            warn!("Section list state invalid at streaming, returning to planning");
            return Transition::to(Phase::Plan);
        }

        let section_name = &self.state.section_names[self.state.current_section_index];
        let is_editable = templates::is_editable(section_name);

        // Streaming failure does not abort the workflow; the client recovers
        // via replay from the store
        if let Err(e) = self
            .sink
            .deliver_section(&self.state.document_id, section_id, section_name, content, is_editable)
            .await
        {
            warn!(error = %e, section_id, "Failed to deliver section, continuing");
        } else {
            debug!(section_id, %section_name, "Streamed section to client");
        }

        Transition::to(Phase::AwaitFeedback)
    }

    async fn await_feedback(&self) -> Result<Transition> {
        let Some(section_id) = self.state.current_section_id.as_deref() else {
            return Err(eyre!("Feedback wait without an in-flight section"));
        };

        let payload = self.channel.await_feedback(&self.state.document_id, section_id).await?;

        let mut update = StateUpdate::default();
        if payload.feedback_type == FeedbackKind::End {
            info!(section_id, "End feedback received, completing session");
            update.completed = Some(true);
        } else {
            debug!(section_id, feedback = %payload.feedback_type, "Feedback received");
        }
        update.feedback = Some(payload);

        Ok(Transition {
            update,
            next: Phase::ApplyFeedback,
        })
    }

    fn apply_feedback(&self) -> Transition {
        let mut update = StateUpdate {
            clear_feedback: true,
            ..Default::default()
        };

        let Some(feedback) = self.state.feedback.as_ref() else {
            debug!("No feedback on record, treating as continue");
            update.last_feedback_type = Some(FeedbackKind::Continue);
            return Transition {
                update,
                next: Phase::Decide,
            };
        };

        if let Some(edited) = feedback.edited_content.as_ref()
            && let Some(section_id) = self.state.current_section_id.as_ref()
        {
            debug!(section_id, "Applying edited content");
            update.edit_content = Some((section_id.clone(), edited.clone()));
        }

        update.last_feedback_type = Some(feedback.feedback_type);
        Transition {
            update,
            next: Phase::Decide,
        }
    }

    async fn decide(&self) -> Transition {
        let mut update = StateUpdate::default();

        if self.state.last_feedback_type == FeedbackKind::End || self.state.completed {
            info!("Ending workflow on end feedback");
            update.completed = Some(true);
            update.final_content = Some(self.state.live_content());
            return Transition {
                update,
                next: Phase::Done,
            };
        }

        if self.state.last_feedback_type == FeedbackKind::Regenerate {
            debug!(index = self.state.current_section_index, "Regenerating current section");
            return Transition::to(Phase::Generate);
        }

        if self.state.current_section_index + 1 < self.state.section_names.len() {
            let next_index = self.state.current_section_index + 1;
            debug!(next_index, "Moving to next section");
            update.current_section_index = Some(next_index);
            return Transition {
                update,
                next: Phase::Generate,
            };
        }

        info!("All sections completed, ending workflow");
        update.completed = Some(true);
        update.final_content = Some(self.state.live_content());

        if let Err(e) = self.sink.deliver_stream_end(&self.state.document_id).await {
            warn!(error = %e, "Failed to deliver stream end");
        }
        if let Err(e) = self.sink.deliver_document_complete(&self.state.document_id).await {
            warn!(error = %e, "Failed to deliver document complete");
        }

        Transition {
            update,
            next: Phase::Done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::memory::{MemorySink, SinkEvent};
    use crate::feedback::FeedbackPayload;
    use crate::llm::client::mock::MockLlmClient;
    use std::time::Duration;

    fn engine_with(
        state: SessionState,
        llm: Arc<MockLlmClient>,
        channel: FeedbackChannel,
        sink: Arc<MemorySink>,
    ) -> WorkflowEngine {
        WorkflowEngine::new(
            state,
            SectionPlanner::new(llm.clone()),
            SectionGenerator::new(llm, "claude-sonnet-4", 4096),
            channel,
            sink,
            Checkpointer::new(),
        )
    }

    fn channel() -> FeedbackChannel {
        FeedbackChannel::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_plan_sets_sections_and_resets_index() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let mut engine = engine_with(
            SessionState::new("doc-1", "Acme Corp turnaround", "Case Study"),
            llm,
            channel(),
            MemorySink::new(),
        );

        engine.step().await.unwrap();

        assert_eq!(engine.phase(), Phase::Generate);
        assert_eq!(engine.state().section_names.len(), 5);
        assert_eq!(engine.state().current_section_index, 0);
    }

    #[tokio::test]
    async fn test_generate_self_heals_on_empty_section_names() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let mut engine = engine_with(
            SessionState::new("doc-1", "query", "Case Study"),
            llm,
            channel(),
            MemorySink::new(),
        );
        engine.phase = Phase::Generate;

        engine.step().await.unwrap();

        assert_eq!(engine.phase(), Phase::Plan);
        assert!(engine.state().sections.is_empty());
    }

    #[tokio::test]
    async fn test_generate_self_heals_on_out_of_range_index() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let mut state = SessionState::new("doc-1", "query", "Case Study");
        state.section_names = vec!["Introduction".to_string()];
        state.current_section_index = 7;

        let mut engine = engine_with(state, llm, channel(), MemorySink::new());
        engine.phase = Phase::Generate;

        engine.step().await.unwrap();

        assert_eq!(engine.phase(), Phase::Plan);
        assert_eq!(engine.state().current_section_index, 0);
    }

    #[tokio::test]
    async fn test_generate_appends_section_with_fresh_id() {
        let llm = Arc::new(MockLlmClient::with_texts(vec!["<p>one</p>"]));
        let mut state = SessionState::new("doc-1", "query", "Case Study");
        state.section_names = vec!["Introduction".to_string()];

        let mut engine = engine_with(state, llm, channel(), MemorySink::new());
        engine.phase = Phase::Generate;

        engine.step().await.unwrap();

        assert_eq!(engine.phase(), Phase::Stream);
        assert_eq!(engine.state().sections.len(), 1);
        let id = engine.state().current_section_id.clone().unwrap();
        assert!(id.starts_with("sec-"));
        assert_eq!(engine.state().sections[0].id, id);
        assert_eq!(engine.state().current_section_content.as_deref(), Some("<p>one</p>"));
    }

    #[tokio::test]
    async fn test_regenerate_replaces_live_entry_in_place() {
        let llm = Arc::new(MockLlmClient::with_texts(vec!["<p>second try</p>"]));
        let mut state = SessionState::new("doc-1", "query", "Case Study");
        state.section_names = vec!["Introduction".to_string(), "Main Content".to_string()];
        state.current_section_index = 0;
        state.sections = vec![SectionRecord {
            id: "sec-old".to_string(),
            name: "Introduction".to_string(),
            content: "<p>first try</p>".to_string(),
        }];
        state.current_section_id = Some("sec-old".to_string());
        state.last_feedback_type = FeedbackKind::Regenerate;

        let mut engine = engine_with(state, llm, channel(), MemorySink::new());
        engine.phase = Phase::Generate;

        engine.step().await.unwrap();

        let state = engine.state();
        assert_eq!(state.sections.len(), 1);
        assert_eq!(state.sections[0].content, "<p>second try</p>");
        assert_ne!(state.sections[0].id, "sec-old");
        assert_eq!(state.sections[0].id, state.current_section_id.clone().unwrap());
    }

    #[tokio::test]
    async fn test_stream_reports_editability_and_swallows_sink_failure() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let mut state = SessionState::new("doc-1", "query", "Documentation");
        state.section_names = vec!["Installation".to_string()];
        state.current_section_id = Some("sec-1".to_string());
        state.current_section_content = Some("<p>steps</p>".to_string());

        // Failing sink must not derail the workflow
        let failing = MemorySink::failing();
        let mut engine = engine_with(state.clone(), llm.clone(), channel(), failing);
        engine.phase = Phase::Stream;
        engine.step().await.unwrap();
        assert_eq!(engine.phase(), Phase::AwaitFeedback);

        // Working sink records the editability flag
        let sink = MemorySink::new();
        let mut engine = engine_with(state, llm, channel(), sink.clone());
        engine.phase = Phase::Stream;
        engine.step().await.unwrap();

        match &sink.events()[0] {
            SinkEvent::Section {
                section_name,
                is_editable,
                ..
            } => {
                assert_eq!(section_name, "Installation");
                assert!(!is_editable);
            }
            other => panic!("Expected section event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_routes_to_plan_when_scratch_missing() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let mut state = SessionState::new("doc-1", "query", "Case Study");
        state.section_names = vec!["Introduction".to_string()];

        let mut engine = engine_with(state, llm, channel(), MemorySink::new());
        engine.phase = Phase::Stream;

        engine.step().await.unwrap();
        assert_eq!(engine.phase(), Phase::Plan);
    }

    #[tokio::test]
    async fn test_await_feedback_without_section_is_fatal() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let mut engine = engine_with(
            SessionState::new("doc-1", "query", "Case Study"),
            llm,
            channel(),
            MemorySink::new(),
        );
        engine.phase = Phase::AwaitFeedback;

        assert!(engine.step().await.is_err());
    }

    #[tokio::test]
    async fn test_await_feedback_timeout_marks_session_complete() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let ch = FeedbackChannel::new(Duration::from_millis(50));
        ch.client_connected("doc-1").await;

        let mut state = SessionState::new("doc-1", "query", "Case Study");
        state.current_section_id = Some("sec-1".to_string());

        let mut engine = engine_with(state, llm, ch, MemorySink::new());
        engine.phase = Phase::AwaitFeedback;

        engine.step().await.unwrap();

        assert_eq!(engine.phase(), Phase::ApplyFeedback);
        assert!(engine.state().completed);
        assert_eq!(
            engine.state().feedback.as_ref().unwrap().feedback_type,
            FeedbackKind::End
        );
    }

    #[tokio::test]
    async fn test_apply_feedback_edits_matching_section_and_clears() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let mut state = SessionState::new("doc-1", "query", "Case Study");
        state.sections = vec![
            SectionRecord {
                id: "sec-1".to_string(),
                name: "Introduction".to_string(),
                content: "<p>draft</p>".to_string(),
            },
            SectionRecord {
                id: "sec-2".to_string(),
                name: "Main Content".to_string(),
                content: "<p>keep</p>".to_string(),
            },
        ];
        state.current_section_id = Some("sec-1".to_string());
        state.feedback = Some(FeedbackPayload::edit("<p>polished</p>"));

        let mut engine = engine_with(state, llm, channel(), MemorySink::new());
        engine.phase = Phase::ApplyFeedback;

        engine.step().await.unwrap();

        let state = engine.state();
        assert_eq!(state.sections[0].content, "<p>polished</p>");
        assert_eq!(state.sections[1].content, "<p>keep</p>");
        assert!(state.feedback.is_none());
        assert_eq!(state.last_feedback_type, FeedbackKind::Edit);
        assert_eq!(engine.phase(), Phase::Decide);
    }

    #[tokio::test]
    async fn test_apply_feedback_without_feedback_defaults_to_continue() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let mut state = SessionState::new("doc-1", "query", "Case Study");
        state.last_feedback_type = FeedbackKind::Regenerate;

        let mut engine = engine_with(state, llm, channel(), MemorySink::new());
        engine.phase = Phase::ApplyFeedback;

        engine.step().await.unwrap();
        assert_eq!(engine.state().last_feedback_type, FeedbackKind::Continue);
    }

    #[tokio::test]
    async fn test_decide_advances_index_on_continue_and_edit() {
        for kind in [FeedbackKind::Continue, FeedbackKind::Edit] {
            let llm = Arc::new(MockLlmClient::new(vec![]));
            let mut state = SessionState::new("doc-1", "query", "Case Study");
            state.section_names = vec!["A".to_string(), "B".to_string()];
            state.last_feedback_type = kind;

            let mut engine = engine_with(state, llm, channel(), MemorySink::new());
            engine.phase = Phase::Decide;

            engine.step().await.unwrap();

            assert_eq!(engine.phase(), Phase::Generate);
            assert_eq!(engine.state().current_section_index, 1);
        }
    }

    #[tokio::test]
    async fn test_decide_keeps_index_on_regenerate() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let mut state = SessionState::new("doc-1", "query", "Case Study");
        state.section_names = vec!["A".to_string(), "B".to_string()];
        state.current_section_index = 1;
        state.last_feedback_type = FeedbackKind::Regenerate;

        let mut engine = engine_with(state, llm, channel(), MemorySink::new());
        engine.phase = Phase::Decide;

        engine.step().await.unwrap();

        assert_eq!(engine.phase(), Phase::Generate);
        assert_eq!(engine.state().current_section_index, 1);
    }

    #[tokio::test]
    async fn test_decide_on_end_terminates_without_terminal_signals() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let sink = MemorySink::new();
        let mut state = SessionState::new("doc-1", "query", "Case Study");
        state.section_names = vec!["A".to_string(), "B".to_string()];
        state.sections = vec![SectionRecord {
            id: "sec-1".to_string(),
            name: "A".to_string(),
            content: "<p>only</p>".to_string(),
        }];
        state.last_feedback_type = FeedbackKind::End;

        let mut engine = engine_with(state, llm, channel(), sink.clone());
        engine.phase = Phase::Decide;

        engine.step().await.unwrap();

        assert_eq!(engine.phase(), Phase::Done);
        assert!(engine.state().completed);
        assert_eq!(engine.state().final_content, vec!["<p>only</p>"]);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_decide_on_exhaustion_emits_terminal_signals_in_order() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let sink = MemorySink::new();
        let mut state = SessionState::new("doc-1", "query", "Case Study");
        state.section_names = vec!["A".to_string()];
        state.sections = vec![SectionRecord {
            id: "sec-1".to_string(),
            name: "A".to_string(),
            content: "<p>done</p>".to_string(),
        }];
        state.last_feedback_type = FeedbackKind::Continue;

        let mut engine = engine_with(state, llm, channel(), sink.clone());
        engine.phase = Phase::Decide;

        engine.step().await.unwrap();

        assert_eq!(engine.phase(), Phase::Done);
        assert!(engine.state().completed);
        assert_eq!(
            sink.events(),
            vec![
                SinkEvent::StreamEnd {
                    document_id: "doc-1".to_string()
                },
                SinkEvent::DocumentComplete {
                    document_id: "doc-1".to_string()
                },
            ]
        );
    }
}
