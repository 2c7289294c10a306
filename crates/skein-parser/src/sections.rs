//! Document splitting: the `# skill:` heading, `##` sections and reference
//! directives.

use regex::Regex;
use skein_core::Reference;

use crate::error::{ParseError, Result};

/// One numbered source line.
pub(crate) type Line<'a> = (usize, &'a str);

/// A `##` section: its lowercased title and content lines.
#[derive(Debug)]
pub(crate) struct Section<'a> {
    /// Heading text, trimmed and lowercased.
    pub title: String,
    /// 1-based line of the heading.
    pub heading_line: usize,
    /// Content lines between this heading and the next.
    pub lines: Vec<Line<'a>>,
}

/// The split document: skill id, sections in order, reference directives.
#[derive(Debug)]
pub(crate) struct Document<'a> {
    pub id: String,
    pub id_line: usize,
    pub sections: Vec<Section<'a>>,
    pub references: Vec<Reference>,
}

/// Matches the `# skill: <id>` heading, case-insensitively.
fn match_skill_heading(line: &str) -> Option<String> {
    let re = Regex::new(r"(?i)^#\s*skill\s*:\s*(.+)$").ok()?;
    let caps = re.captures(line)?;
    Some(caps[1].trim().to_string())
}

/// Matches a `<!-- reference: path -->` directive.
fn match_reference_directive(line: &str) -> Option<String> {
    let re = Regex::new(r"<!--\s*reference:\s*(.+?)\s*-->").ok()?;
    let caps = re.captures(line)?;
    Some(caps[1].to_string())
}

/// Splits a skill document into its sections.
///
/// Heading matching is case-insensitive and ignores lines inside fenced
/// code blocks. Reference directives (`<!-- reference: path -->`) are
/// collected from anywhere outside fences.
pub(crate) fn split_document(source: &str) -> Result<Document<'_>> {
    let mut id: Option<(String, usize)> = None;
    let mut sections: Vec<Section<'_>> = Vec::new();
    let mut references: Vec<Reference> = Vec::new();
    let mut in_fence = false;

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw.trim_end();

        if trimmed.trim_start().starts_with("```") {
            in_fence = !in_fence;
            if let Some(section) = sections.last_mut() {
                section.lines.push((line_no, raw));
            }
            continue;
        }

        if in_fence {
            if let Some(section) = sections.last_mut() {
                section.lines.push((line_no, raw));
            }
            continue;
        }

        if let Some(path) = match_reference_directive(trimmed) {
            references.push(Reference::from_path(path));
            continue;
        }

        if id.is_none() {
            if trimmed.trim().is_empty() {
                continue;
            }
            match match_skill_heading(trimmed) {
                Some(captured) => {
                    id = Some((captured, line_no));
                    continue;
                }
                None => {
                    return Err(ParseError::new(
                        line_no,
                        "expected '# skill: <id>' as the first heading",
                    ))
                }
            }
        }

        if trimmed.starts_with("## ") && !trimmed.starts_with("###") {
            sections.push(Section {
                title: trimmed[3..].trim().to_lowercase(),
                heading_line: line_no,
                lines: Vec::new(),
            });
            continue;
        }

        if let Some(section) = sections.last_mut() {
            section.lines.push((line_no, raw));
        }
        // Content between the H1 and the first H2 is tolerated and ignored.
    }

    let (id, id_line) = id.ok_or_else(|| ParseError::new(1, "missing '# skill: <id>' heading"))?;

    Ok(Document {
        id,
        id_line,
        sections,
        references,
    })
}

/// Extracts the fenced code blocks of a section, in order: language tag,
/// body, and the 1-based line of the opening fence.
pub(crate) fn fenced_blocks(lines: &[Line<'_>]) -> Result<Vec<(String, String, usize)>> {
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let (line_no, text) = lines[i];
        let trimmed = text.trim_start();
        if let Some(tag) = trimmed.strip_prefix("```") {
            let lang = tag.trim().to_string();
            let mut body = String::new();
            let mut closed = false;
            i += 1;
            while i < lines.len() {
                let (_, inner) = lines[i];
                if inner.trim_start().starts_with("```") {
                    closed = true;
                    i += 1;
                    break;
                }
                body.push_str(inner);
                body.push('\n');
                i += 1;
            }
            if !closed {
                return Err(ParseError::new(line_no, "unclosed fenced code block"));
            }
            blocks.push((lang, body, line_no));
        } else {
            i += 1;
        }
    }
    Ok(blocks)
}

/// The section's non-fence text content, trimmed.
pub(crate) fn text_content(lines: &[Line<'_>]) -> String {
    let mut out = String::new();
    let mut in_fence = false;
    for (_, text) in lines {
        if text.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence {
            out.push_str(text);
            out.push('\n');
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_finds_id_and_sections() {
        let doc = split_document("# skill: demo\n\n## description\ntext\n\n## steps\nbody\n")
            .unwrap();
        assert_eq!(doc.id, "demo");
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].title, "description");
        assert_eq!(doc.sections[1].title, "steps");
    }

    #[test]
    fn split_headings_are_case_insensitive() {
        let doc = split_document("# SKILL: demo\n## Description\nx\n").unwrap();
        assert_eq!(doc.id, "demo");
        assert_eq!(doc.sections[0].title, "description");
    }

    #[test]
    fn split_rejects_missing_skill_heading() {
        let err = split_document("# not-a-skill\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("# skill:"));

        let err = split_document("\n\n").unwrap_err();
        assert!(err.message.contains("missing"));
    }

    #[test]
    fn split_collects_reference_directives() {
        let doc = split_document(
            "# skill: demo\n<!-- reference: guides/style.md -->\n## steps\nx\n",
        )
        .unwrap();
        assert_eq!(doc.references.len(), 1);
        assert_eq!(doc.references[0].path, "guides/style.md");
        assert_eq!(doc.references[0].name, "style");
    }

    #[test]
    fn split_ignores_headings_inside_fences() {
        let source = "# skill: demo\n## steps\n```yaml\n## not a heading\n```\n";
        let doc = split_document(source).unwrap();
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].lines.len(), 3);
    }

    #[test]
    fn fenced_blocks_extracts_language_and_body() {
        let lines = vec![
            (10, "```yaml"),
            (11, "key: value"),
            (12, "```"),
            (13, ""),
            (14, "```prompt"),
            (15, "Say hi"),
            (16, "```"),
        ];
        let blocks = fenced_blocks(&lines).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].0, "yaml");
        assert_eq!(blocks[0].1, "key: value\n");
        assert_eq!(blocks[0].2, 10);
        assert_eq!(blocks[1].0, "prompt");
    }

    #[test]
    fn fenced_blocks_rejects_unclosed_fence() {
        let lines = vec![(5, "```yaml"), (6, "key: value")];
        let err = fenced_blocks(&lines).unwrap_err();
        assert_eq!(err.line, 5);
        assert!(err.message.contains("unclosed"));
    }

    #[test]
    fn text_content_skips_fences() {
        let lines = vec![(1, "before"), (2, "```x"), (3, "inside"), (4, "```"), (5, "after")];
        assert_eq!(text_content(&lines), "before\nafter");
    }
}
