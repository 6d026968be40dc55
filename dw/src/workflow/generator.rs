//! Section content generator
//!
//! Produces the HTML for one named section. A failed or malformed
//! generation yields a deterministic placeholder section; the workflow
//! treats that placeholder as valid content the user can regenerate, so
//! this boundary never fails either.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::{CompletionRequest, LlmClient, LlmError, Message};
use crate::prompts::{SECTION_REQUEST, SECTION_SYSTEM, render};

/// Generates HTML content for single sections
pub struct SectionGenerator {
    llm: Arc<dyn LlmClient>,
    model: String,
    max_tokens: u32,
}

impl SectionGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            llm,
            model: model.into(),
            max_tokens,
        }
    }

    /// Generate the HTML for one section
    pub async fn generate(&self, query: &str, section_name: &str) -> String {
        match self.generate_inner(query, section_name).await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, section_name, "Error generating section content, using placeholder");
                placeholder_section(section_name)
            }
        }
    }

    async fn generate_inner(&self, query: &str, section_name: &str) -> Result<String, LlmError> {
        let mut vars = HashMap::new();
        vars.insert("query", query.to_string());
        vars.insert("section_name", section_name.to_string());

        let request = CompletionRequest {
            system_prompt: SECTION_SYSTEM.to_string(),
            messages: vec![Message::user(render(SECTION_REQUEST, &vars))],
            max_tokens: self.max_tokens,
        };

        let response = self.llm.complete(request).await?;
        debug!(
            section_name,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            cost_usd = response.usage.cost_usd(&self.model),
            "Section completion finished"
        );

        let Some(text) = response.content else {
            return Err(LlmError::InvalidResponse("completion carried no text content".to_string()));
        };

        Ok(strip_fences(&text))
    }
}

/// Strip Markdown code-fence artifacts around generated HTML
pub(crate) fn strip_fences(raw: &str) -> String {
    raw.replace("```html", "").replace("```", "").trim().to_string()
}

/// Deterministic fallback section shown when generation fails
pub(crate) fn placeholder_section(section_name: &str) -> String {
    format!(
        "<div data-section=\"{}\"><p>Error generating content. Please try again.</p></div>",
        section_name
    )
}
