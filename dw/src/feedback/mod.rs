//! Feedback channel module
//!
//! Bridges the asynchronous transport (which receives human feedback) and
//! the blocking workflow (which waits for it, one section at a time).

mod channel;
mod types;

pub use channel::FeedbackChannel;
pub use types::{FeedbackError, FeedbackKind, FeedbackPayload, IncomingFeedback, parse_incoming};
