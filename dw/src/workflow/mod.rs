//! Section generation workflow
//!
//! The per-document state machine plus its collaborators: planning, content
//! generation, session state, and checkpointing.

mod checkpoint;
mod engine;
mod generator;
mod planner;
mod state;

pub use checkpoint::Checkpointer;
pub use engine::{Transition, WorkflowEngine};
pub use generator::SectionGenerator;
pub use planner::SectionPlanner;
pub use state::{Phase, SectionRecord, SessionState, StateUpdate};
