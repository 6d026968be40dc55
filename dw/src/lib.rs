//! Docweaver - interactive section-by-section document generation
//!
//! For a user query and a template, docweaver produces one section of HTML
//! content at a time, streams it to a connected client, pauses for human
//! feedback (accept / edit / regenerate / end), applies the feedback, and
//! advances to the next section until the document is complete or the user
//! ends the session.
//!
//! # Modules
//!
//! - [`workflow`] - the per-document state machine and its collaborators
//! - [`feedback`] - per-section rendezvous between transport and workflow
//! - [`delivery`] - sink trait the workflow streams content through
//! - [`llm`] - LLM client trait and Anthropic implementation
//! - [`session`] - background task spawning, replay, feedback ingress
//! - [`templates`] - the fixed template registry
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod delivery;
pub mod feedback;
pub mod llm;
pub mod prompts;
pub mod session;
pub mod templates;
pub mod workflow;

// Re-export commonly used types
pub use config::{Config, FeedbackConfig, LlmConfig, StorageConfig};
pub use delivery::{ConsoleSink, DeliverySink};
pub use feedback::{FeedbackChannel, FeedbackError, FeedbackKind, FeedbackPayload, IncomingFeedback, parse_incoming};
pub use llm::{
    AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, Message, Role, StopReason,
    TokenUsage, create_client,
};
pub use session::SessionManager;
pub use workflow::{
    Checkpointer, Phase, SectionGenerator, SectionPlanner, SectionRecord, SessionState, StateUpdate, Transition,
    WorkflowEngine,
};
