//! Document template registry
//!
//! A template is a named, predefined ordered list of section names. Unknown
//! template types fall through to LLM-driven planning with a fixed default
//! as the last resort.

/// Fallback section list used when planning cannot produce anything better
pub const DEFAULT_SECTIONS: [&str; 3] = ["Introduction", "Main Content", "Conclusion"];

/// Section names containing any of these (case-insensitively) are not
/// directly editable in the client
const NON_EDITABLE_KEYWORDS: [&str; 6] = [
    "code",
    "configuration",
    "installation",
    "setup",
    "technical",
    "api reference",
];

const TECHNICAL_BLOG: [&str; 6] = [
    "Title",
    "Introduction",
    "Background",
    "Key Features",
    "Use Cases",
    "Conclusion",
];

const DOCUMENTATION: [&str; 7] = [
    "Heading",
    "Overview",
    "Installation",
    "Usage",
    "Configuration",
    "Troubleshooting",
    "FAQ",
];

const CASE_STUDY: [&str; 5] = [
    "Company Background",
    "Problem Statement",
    "Solution Implemented",
    "Results Achieved",
    "Lessons Learned",
];

/// Look up the predefined section list for a template type
pub fn template_sections(template_type: &str) -> Option<Vec<String>> {
    let sections: &[&str] = match template_type {
        "Technical Blog" => &TECHNICAL_BLOG,
        "Documentation" => &DOCUMENTATION,
        "Case Study" => &CASE_STUDY,
        _ => return None,
    };
    Some(sections.iter().map(|s| s.to_string()).collect())
}

/// Names of all known templates
pub fn known_templates() -> Vec<&'static str> {
    vec!["Technical Blog", "Documentation", "Case Study"]
}

/// The default fallback section list
pub fn default_sections() -> Vec<String> {
    DEFAULT_SECTIONS.iter().map(|s| s.to_string()).collect()
}

/// Whether a section should be editable in the client UI
pub fn is_editable(section_name: &str) -> bool {
    let lower = section_name.to_lowercase();
    !NON_EDITABLE_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_study_sections() {
        let sections = template_sections("Case Study").unwrap();
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
    }

    #[test]
    fn test_unknown_template_has_no_sections() {
        assert!(template_sections("Shopping List").is_none());
        assert!(template_sections("").is_none());
    }

    #[test]
    fn test_all_known_templates_resolve() {
        for name in known_templates() {
            let sections = template_sections(name).unwrap();
            assert!(!sections.is_empty());
        }
    }

    #[test]
    fn test_editability_keywords() {
        assert!(!is_editable("API Reference"));
        assert!(!is_editable("Code Sample"));
        assert!(!is_editable("Installation"));
        assert!(!is_editable("SETUP Guide"));
        assert!(is_editable("Introduction"));
        assert!(is_editable("Lessons Learned"));
    }
}
