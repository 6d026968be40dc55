//! Embedded prompts
//!
//! Prompt text is compiled into the binary; variables are substituted with
//! Handlebars at call time.

use std::collections::HashMap;

use handlebars::Handlebars;
use tracing::warn;

/// System prompt for section name planning (unknown templates)
pub const PLANNER_SYSTEM: &str = r#"You are an AI writing assistant integrated into a collaborative document generation application.

You must generate at least 3 section names for the document based on the query.
Return them as a JSON array of strings and nothing else. Each section name
should be clear and descriptive.

For example, for a query about machine learning, you might return:
["Introduction to Machine Learning", "Types of Machine Learning Algorithms", "Applications of Machine Learning"]
"#;

/// User message for section name planning
pub const PLANNER_REQUEST: &str = r#"Template: {{template_type}}
Query: {{query}}
"#;

/// System prompt for generating one section of HTML content
pub const SECTION_SYSTEM: &str = r#"You are an AI content writer. Write detailed HTML content for the following section of a document.
Do not include headings that duplicate the section name. Return HTML only.

## OUTPUT FORMAT RULES:
- Wrap the section in an outer `<div data-section="SectionName">...</div>` so the frontend can isolate and edit sections.
- Use appropriate HTML tags:
  - `<h1>`, `<h2>` for headings
  - `<p>` for paragraphs
  - `<ul><li>` for bullet lists
  - `<pre><code>` for code blocks (include comments if needed)
- Do **not** output the full document at once. Output only the section currently being generated.

## EXAMPLE OUTPUT (for a "Heading" section):
```html
<div data-section="Heading">
<h1>Understanding REST APIs: A Beginner's Guide</h1>
</div>
```
"#;

/// User message for section content generation
pub const SECTION_REQUEST: &str = r#"Document Query: {{query}}
Section: {{section_name}}
"#;

/// Render a prompt template with the given variables
///
/// Rendering failures fall back to the raw template so a broken placeholder
/// never takes down a generation call.
pub fn render(template: &str, vars: &HashMap<&str, String>) -> String {
    match Handlebars::new().render_template(template, vars) {
        Ok(rendered) => rendered,
        Err(e) => {
            warn!(error = %e, "Prompt render failed, using raw template");
            template.to_string()
        }
    }
}
