//! Section planner
//!
//! Resolves a template type to an ordered list of section names. Known
//! templates resolve statically without touching the LLM; unknown templates
//! get an LLM-proposed list with a guaranteed fixed fallback. This boundary
//! never fails: every error path degrades to the default list.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::llm::{CompletionRequest, LlmClient, LlmError, Message};
use crate::prompts::{PLANNER_REQUEST, PLANNER_SYSTEM, render};
use crate::templates;

/// Max tokens for a section name list
const PLAN_MAX_TOKENS: u32 = 1024;

/// Plans the section structure of a document
pub struct SectionPlanner {
    llm: Arc<dyn LlmClient>,
}

impl SectionPlanner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Produce the ordered section names for a document (always ≥ 1)
    pub async fn plan(&self, template_type: &str, query: &str) -> Vec<String> {
        if let Some(sections) = templates::template_sections(template_type) {
            info!(template_type, ?sections, "Using template sections");
            return sections;
        }

        match self.plan_with_llm(template_type, query).await {
            Ok(names) if !names.is_empty() => {
                info!(?names, "Generated sections");
                names
            }
            Ok(_) => {
                warn!(template_type, "Planner returned no usable sections, using fallback");
                templates::default_sections()
            }
            Err(e) => {
                warn!(error = %e, template_type, "Error generating sections, using fallback");
                templates::default_sections()
            }
        }
    }

    async fn plan_with_llm(&self, template_type: &str, query: &str) -> Result<Vec<String>, LlmError> {
        let mut vars = HashMap::new();
        vars.insert("template_type", template_type.to_string());
        vars.insert("query", query.to_string());

        let request = CompletionRequest {
            system_prompt: PLANNER_SYSTEM.to_string(),
            messages: vec![Message::user(render(PLANNER_REQUEST, &vars))],
            max_tokens: PLAN_MAX_TOKENS,
        };

        let response = self.llm.complete(request).await?;
        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Planner completion finished"
        );

        let content = response.content.unwrap_or_default();
        Ok(parse_section_list(&content))
    }
}

/// Parse a section name list out of model output
///
/// Accepts a bare JSON array, or an array embedded in surrounding prose or
/// code fences. Anything else yields an empty list for the caller to
/// replace with the fallback.
pub(crate) fn parse_section_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();

    if let Ok(names) = serde_json::from_str::<Vec<String>>(trimmed) {
        return clean_names(names);
    }

    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']'))
        && start < end
        && let Ok(names) = serde_json::from_str::<Vec<String>>(&trimmed[start..=end])
    {
        return clean_names(names);
    }

    Vec::new()
}

fn clean_names(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;

    #[tokio::test]
    async fn test_known_template_needs_no_llm_call() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let planner = SectionPlanner::new(llm.clone());

        let sections = planner.plan("Case Study", "Acme Corp turnaround").await;

        assert_eq!(
            sections,
            vec![
                "Company Background",
                "Problem Statement",
                "Solution Implemented",
                "Results Achieved",
                "Lessons Learned"
            ]
        );
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_every_known_template_plans_without_llm() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let planner = SectionPlanner::new(llm.clone());

        for name in templates::known_templates() {
            let sections = planner.plan(name, "anything").await;
            assert_eq!(sections, templates::template_sections(name).unwrap());
        }
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_template_uses_llm_list() {
        let llm = Arc::new(MockLlmClient::with_texts(vec![
            r#"["What is Rust", "Memory Safety", "The Borrow Checker"]"#,
        ]));
        let planner = SectionPlanner::new(llm.clone());

        let sections = planner.plan("Essay", "Why Rust?").await;

        assert_eq!(sections, vec!["What is Rust", "Memory Safety", "The Borrow Checker"]);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fenced_array_is_parsed() {
        let llm = Arc::new(MockLlmClient::with_texts(vec![
            "Here you go:\n```json\n[\"One\", \"Two\", \"Three\"]\n```",
        ]));
        let planner = SectionPlanner::new(llm);

        let sections = planner.plan("Essay", "anything").await;
        assert_eq!(sections, vec!["One", "Two", "Three"]);
    }

    #[tokio::test]
    async fn test_llm_error_falls_back_to_default() {
        // Exhausted mock errors on the first call
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let planner = SectionPlanner::new(llm);

        let sections = planner.plan("Essay", "anything").await;
        assert_eq!(sections, vec!["Introduction", "Main Content", "Conclusion"]);
    }

    #[tokio::test]
    async fn test_empty_or_malformed_output_falls_back_to_default() {
        for reply in ["[]", "I can't help with that", "{\"sections\": 3}"] {
            let llm = Arc::new(MockLlmClient::with_texts(vec![reply]));
            let planner = SectionPlanner::new(llm);

            let sections = planner.plan("Essay", "anything").await;
            assert_eq!(
                sections,
                vec!["Introduction", "Main Content", "Conclusion"],
                "reply {:?} should fall back",
                reply
            );
        }
    }

    #[test]
    fn test_parse_section_list_drops_blank_entries() {
        let names = parse_section_list(r#"["One", "  ", "Two"]"#);
        assert_eq!(names, vec!["One", "Two"]);
    }
}
