//! Feedback payload types and ingress validation

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A human decision about a just-generated section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Continue,
    Edit,
    Regenerate,
    End,
}

impl FeedbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Continue => "continue",
            FeedbackKind::Edit => "edit",
            FeedbackKind::Regenerate => "regenerate",
            FeedbackKind::End => "end",
        }
    }

    /// Parse a wire-format feedback type
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "continue" => Some(FeedbackKind::Continue),
            "edit" => Some(FeedbackKind::Edit),
            "regenerate" => Some(FeedbackKind::Regenerate),
            "end" => Some(FeedbackKind::End),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feedback for one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackPayload {
    pub feedback_type: FeedbackKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_content: Option<String>,
}

impl FeedbackPayload {
    pub fn new(feedback_type: FeedbackKind) -> Self {
        Self {
            feedback_type,
            edited_content: None,
        }
    }

    /// The synthetic payload used when a wait times out or no client is
    /// connected - silence is an end-of-session signal
    pub fn end() -> Self {
        Self::new(FeedbackKind::End)
    }

    pub fn edit(content: impl Into<String>) -> Self {
        Self {
            feedback_type: FeedbackKind::Edit,
            edited_content: Some(content.into()),
        }
    }
}

/// Feedback channel errors
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Malformed feedback payload: {0}")]
    Malformed(String),

    #[error("Feedback wait for section {section_id} was abandoned internally")]
    WaiterAbandoned { section_id: String },
}

/// A validated inbound feedback message
#[derive(Debug, Clone)]
pub struct IncomingFeedback {
    pub section_id: String,
    pub payload: FeedbackPayload,
}

/// Validate a raw transport payload before it reaches the channel
///
/// Rejects messages missing `section_id` or `feedback_type`, or carrying an
/// unknown feedback type.
pub fn parse_incoming(value: &serde_json::Value) -> Result<IncomingFeedback, FeedbackError> {
    let section_id = value
        .get("section_id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FeedbackError::Malformed("missing section_id".to_string()))?;

    let raw_type = value
        .get("feedback_type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| FeedbackError::Malformed("missing feedback_type".to_string()))?;

    let feedback_type = FeedbackKind::parse(raw_type)
        .ok_or_else(|| FeedbackError::Malformed(format!("unknown feedback_type '{}'", raw_type)))?;

    let edited_content = value
        .get("edited_content")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Ok(IncomingFeedback {
        section_id: section_id.to_string(),
        payload: FeedbackPayload {
            feedback_type,
            edited_content,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feedback_kind_roundtrip() {
        for kind in [
            FeedbackKind::Continue,
            FeedbackKind::Edit,
            FeedbackKind::Regenerate,
            FeedbackKind::End,
        ] {
            assert_eq!(FeedbackKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(FeedbackKind::parse("approve"), None);
    }

    #[test]
    fn test_payload_serialization_uses_wire_names() {
        let payload = FeedbackPayload::edit("<p>fixed</p>");
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"feedback_type\":\"edit\""));
        assert!(json.contains("edited_content"));

        let bare = serde_json::to_string(&FeedbackPayload::new(FeedbackKind::Continue)).unwrap();
        assert!(!bare.contains("edited_content"));
    }

    #[test]
    fn test_parse_incoming_accepts_valid_payload() {
        let value = json!({
            "section_id": "sec-1",
            "feedback_type": "edit",
            "edited_content": "<p>better</p>"
        });

        let incoming = parse_incoming(&value).unwrap();
        assert_eq!(incoming.section_id, "sec-1");
        assert_eq!(incoming.payload.feedback_type, FeedbackKind::Edit);
        assert_eq!(incoming.payload.edited_content.as_deref(), Some("<p>better</p>"));
    }

    #[test]
    fn test_parse_incoming_rejects_missing_fields() {
        assert!(parse_incoming(&json!({ "feedback_type": "continue" })).is_err());
        assert!(parse_incoming(&json!({ "section_id": "sec-1" })).is_err());
        assert!(parse_incoming(&json!({ "section_id": "", "feedback_type": "continue" })).is_err());
    }

    #[test]
    fn test_parse_incoming_rejects_unknown_type() {
        let value = json!({ "section_id": "sec-1", "feedback_type": "approve" });
        assert!(parse_incoming(&value).is_err());
    }
}
