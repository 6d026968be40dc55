//! DocStore - durable storage for interactively generated documents
//!
//! Records documents and the sections produced for them so that a fully
//! generated document can be replayed to a reconnecting client without
//! re-running the generation workflow.

mod store;

pub use store::{DocStore, DocumentRow, SectionRow, SectionStatus};
