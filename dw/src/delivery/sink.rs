//! DeliverySink trait definition

use async_trait::async_trait;
use eyre::Result;

/// Pushes generated sections and terminal signals to the external transport
///
/// All operations are best-effort from the workflow's point of view: the
/// engine logs and swallows sink errors, so a broken transport never aborts
/// a session. A client that missed a section recovers through reconnect and
/// replay from the document store.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Deliver one generated section
    async fn deliver_section(
        &self,
        document_id: &str,
        section_id: &str,
        section_name: &str,
        content_html: &str,
        is_editable: bool,
    ) -> Result<()>;

    /// Signal that no further sections will be streamed
    async fn deliver_stream_end(&self, document_id: &str) -> Result<()>;

    /// Signal that the document is complete
    async fn deliver_document_complete(&self, document_id: &str) -> Result<()>;
}
