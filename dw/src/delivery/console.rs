//! Terminal delivery sink
//!
//! Renders sections to stdout for the interactive `dw run` session and
//! remembers the id of the last delivered section so line-based feedback
//! can be addressed to it.

use std::sync::Mutex;

use async_trait::async_trait;
use colored::Colorize;
use eyre::Result;

use super::sink::DeliverySink;

/// Prints delivered sections to the terminal
#[derive(Default)]
pub struct ConsoleSink {
    last_section: Mutex<Option<String>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the most recently delivered section, if any
    pub fn last_section_id(&self) -> Option<String> {
        self.last_section.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl DeliverySink for ConsoleSink {
    async fn deliver_section(
        &self,
        _document_id: &str,
        section_id: &str,
        section_name: &str,
        content_html: &str,
        is_editable: bool,
    ) -> Result<()> {
        println!();
        println!("{}", format!("── {} ──", section_name).bold());
        println!("{}", content_html);
        if !is_editable {
            println!("{}", "(this section is not editable)".dimmed());
        }
        println!(
            "{}",
            "feedback: continue | edit <html> | regenerate | end".dimmed()
        );

        if let Ok(mut guard) = self.last_section.lock() {
            *guard = Some(section_id.to_string());
        }
        Ok(())
    }

    async fn deliver_stream_end(&self, _document_id: &str) -> Result<()> {
        println!("{}", "── stream closed ──".dimmed());
        Ok(())
    }

    async fn deliver_document_complete(&self, document_id: &str) -> Result<()> {
        println!("{}", format!("Document {} complete", document_id).green());
        Ok(())
    }
}
