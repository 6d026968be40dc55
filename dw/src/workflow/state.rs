//! Session state for one document workflow
//!
//! The state is owned exclusively by its workflow engine. Phases never
//! mutate it directly; each phase produces a `StateUpdate` that the engine
//! merges, keeping a single writer for the whole session.

use crate::feedback::{FeedbackKind, FeedbackPayload};

/// One named unit of document content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRecord {
    pub id: String,
    pub name: String,
    pub content: String,
}

/// Workflow phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Plan,
    Generate,
    Stream,
    AwaitFeedback,
    ApplyFeedback,
    Decide,
    Done,
}

/// Full state of one document generation session
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Opaque identifier, stable for the session
    pub document_id: String,

    /// The user's free-text request
    pub query: String,

    /// Selects the section list
    pub template_type: String,

    /// Ordered section labels, set once by planning
    pub section_names: Vec<String>,

    /// Cursor into section_names
    pub current_section_index: usize,

    /// Sections in generation order; one live entry per section
    pub sections: Vec<SectionRecord>,

    /// Scratch slot for the section currently in flight
    pub current_section_id: Option<String>,

    /// Scratch slot for the in-flight section's content
    pub current_section_content: Option<String>,

    /// Most recently received feedback, consumed by the apply phase
    pub feedback: Option<FeedbackPayload>,

    /// Drives the decision phase
    pub last_feedback_type: FeedbackKind,

    /// Terminal flag
    pub completed: bool,

    /// Section HTML in generation order, populated only at termination
    pub final_content: Vec<String>,
}

impl SessionState {
    pub fn new(document_id: impl Into<String>, query: impl Into<String>, template_type: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            query: query.into(),
            template_type: template_type.into(),
            section_names: Vec::new(),
            current_section_index: 0,
            sections: Vec::new(),
            current_section_id: None,
            current_section_content: None,
            feedback: None,
            last_feedback_type: FeedbackKind::Continue,
            completed: false,
            final_content: Vec::new(),
        }
    }

    /// HTML of all live sections that carry content, in generation order
    pub fn live_content(&self) -> Vec<String> {
        self.sections
            .iter()
            .filter(|s| !s.content.is_empty())
            .map(|s| s.content.clone())
            .collect()
    }

    /// Merge a phase's output into the state
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(names) = update.section_names {
            self.section_names = names;
        }
        if let Some(index) = update.current_section_index {
            self.current_section_index = index;
        }
        if let Some(record) = update.append_section {
            self.sections.push(record);
        }
        if let Some((old_id, record)) = update.replace_section {
            match self.sections.iter().position(|s| s.id == old_id) {
                Some(pos) => self.sections[pos] = record,
                None => self.sections.push(record),
            }
        }
        if let Some((id, content)) = update.edit_content
            && let Some(section) = self.sections.iter_mut().find(|s| s.id == id)
        {
            section.content = content;
        }
        if let Some(id) = update.current_section_id {
            self.current_section_id = Some(id);
        }
        if let Some(content) = update.current_section_content {
            self.current_section_content = Some(content);
        }
        if let Some(payload) = update.feedback {
            self.feedback = Some(payload);
        }
        if update.clear_feedback {
            self.feedback = None;
        }
        if let Some(kind) = update.last_feedback_type {
            self.last_feedback_type = kind;
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        if let Some(content) = update.final_content {
            self.final_content = content;
        }
    }
}

/// Delta produced by one phase, merged into the session state by the engine
#[derive(Debug, Default)]
pub struct StateUpdate {
    pub section_names: Option<Vec<String>>,
    pub current_section_index: Option<usize>,

    /// Append a freshly generated section
    pub append_section: Option<SectionRecord>,

    /// Replace the live entry with the given id, keeping its position
    /// (regeneration)
    pub replace_section: Option<(String, SectionRecord)>,

    /// Overwrite the content of the first section matching the id
    /// (feedback edit)
    pub edit_content: Option<(String, String)>,

    pub current_section_id: Option<String>,
    pub current_section_content: Option<String>,

    pub feedback: Option<FeedbackPayload>,
    pub clear_feedback: bool,
    pub last_feedback_type: Option<FeedbackKind>,

    pub completed: Option<bool>,
    pub final_content: Option<Vec<String>>,
}
