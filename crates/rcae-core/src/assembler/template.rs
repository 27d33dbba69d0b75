//! Context rendering templates (§4.7 step 5)

use super::evidence::{Evidence, EvidenceSection};

/// Controls how packed evidence is rendered into the final context text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextTemplate {
    /// Headed sections with full evidence text.
    Default,
    /// Single-line-per-item digest, for tight budgets.
    Compact,
    /// Headed sections plus a relevance score annotation per item.
    Detailed,
}

impl Default for ContextTemplate {
    fn default() -> Self {
        ContextTemplate::Default
    }
}

fn section_heading(section: EvidenceSection) -> &'static str {
    match section {
        EvidenceSection::Memories => "## Memories",
        EvidenceSection::Code => "## Code",
        EvidenceSection::Graph => "## Entities",
        EvidenceSection::Reports => "## Community reports",
    }
}

/// Renders evidence (already ordered deterministically: section, then by
/// descending score, then by id) into the template's text form.
pub fn render(template: ContextTemplate, evidence: &[Evidence]) -> String {
    let mut out = String::new();
    let mut current_section: Option<EvidenceSection> = None;

    for item in evidence {
        if current_section != Some(item.section) {
            if current_section.is_some() {
                out.push('\n');
            }
            out.push_str(section_heading(item.section));
            out.push('\n');
            current_section = Some(item.section);
        }
        match template {
            ContextTemplate::Compact => {
                out.push_str(&format!("- {}: {}\n", item.title, first_line(&item.text)));
            }
            ContextTemplate::Default => {
                out.push_str(&format!("### {}\n{}\n\n", item.title, item.text));
            }
            ContextTemplate::Detailed => {
                out.push_str(&format!(
                    "### {} (score {:.3}, {} tokens)\n{}\n\n",
                    item.title, item.score, item.tokens, item.text
                ));
            }
        }
    }
    out
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_compact_is_single_line_per_item() {
        let evidence = vec![Evidence::new(EvidenceSection::Memories, "m1", "Title", "line one\nline two", 0.9)];
        let rendered = render(ContextTemplate::Compact, &evidence);
        assert!(rendered.contains("- Title: line one"));
        assert!(!rendered.contains("line two"));
    }

    #[test]
    fn test_render_detailed_includes_score() {
        let evidence = vec![Evidence::new(EvidenceSection::Code, "c1", "fn foo", "body", 0.5)];
        let rendered = render(ContextTemplate::Detailed, &evidence);
        assert!(rendered.contains("score 0.500"));
    }
}
