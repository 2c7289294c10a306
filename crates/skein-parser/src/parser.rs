//! Top-level skill document parsing.

use skein_core::Skill;

use crate::error::{ParseError, Result};
use crate::schema::{parse_field_specs, parse_yaml_block};
use crate::sections::{fenced_blocks, split_document, text_content, Line, Section};
use crate::steps::parse_steps;

/// Parses a Markdown skill document into a [`Skill`].
///
/// Section headings are case-insensitive; unknown sections are ignored.
/// The earliest structural or semantic problem fails the parse with its
/// source location.
pub fn parse_skill(source: &str) -> Result<Skill> {
    let document = split_document(source)?;
    if document.id.is_empty() {
        return Err(ParseError::new(document.id_line, "skill id is empty"));
    }

    let mut skill = Skill::new(&document.id);
    skill.references = document.references;
    let mut steps_seen = false;

    for section in &document.sections {
        match section.title.as_str() {
            "version" => {
                let version = text_content(&section.lines);
                if !version.is_empty() {
                    skill.version = Some(version);
                }
            }
            "description" => {
                skill.description = text_content(&section.lines);
            }
            "intent" | "intents" => {
                skill.intents = parse_intents(&section.lines);
            }
            "input" | "input_schema" => {
                skill.input_schema = parse_schema_section(section, true)?;
            }
            "output" | "output_schema" => {
                skill.output_contract = parse_schema_section(section, false)?;
            }
            "steps" => {
                skill.steps = parse_steps(&section.lines, section.heading_line)?;
                steps_seen = true;
            }
            title if title.starts_with("x-") => {
                skill
                    .extensions
                    .insert(title.to_string(), text_content(&section.lines));
            }
            _ => {
                // Cosmetic variation is tolerated; unknown sections are not
                // an error.
            }
        }
    }

    if !steps_seen {
        return Err(ParseError::new(
            document.id_line,
            format!("skill '{}' has no steps section", skill.id),
        ));
    }

    skill
        .validate()
        .map_err(|e| ParseError::new(document.id_line, e.to_string()))?;
    Ok(skill)
}

/// Whether a document parses as a skill. Never panics.
pub fn is_valid(source: &str) -> bool {
    parse_skill(source).is_ok()
}

/// Parses a bullet list into an ordered, de-duplicated intent list.
fn parse_intents(lines: &[Line<'_>]) -> Vec<String> {
    let mut intents: Vec<String> = Vec::new();
    for (_, text) in lines {
        let trimmed = text.trim();
        let item = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
            .map(str::trim);
        if let Some(item) = item {
            if !item.is_empty() && !intents.iter().any(|existing| existing == item) {
                intents.push(item.to_string());
            }
        }
    }
    intents
}

/// Parses a schema section: the first fenced block when one is present,
/// otherwise the section text as YAML.
fn parse_schema_section(
    section: &Section<'_>,
    required_default: bool,
) -> Result<Vec<skein_core::FieldSpec>> {
    let blocks = fenced_blocks(&section.lines)?;
    let (body, line) = match blocks.first() {
        Some((_, body, fence_line)) => (body.clone(), *fence_line),
        None => (text_content(&section.lines), section.heading_line),
    };
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value = parse_yaml_block(&body, line)?;
    parse_field_specs(&value, required_default, line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::{FieldType, StepKind};

    const DOCUMENT: &str = r#"# skill: greet-user

## version
1.2.0

## description
Greets a user by name and reports the result.

## intent
- greet someone
- say hello
- greet someone

## input
```yaml
name: string
formal:
  type: boolean
  required: false
```

## steps

### step: greet
**varName**: greeting
```prompt
Say hi to {{name}}
```

### step: final
**varName**: final_text
```template
Result: {{greeting}}
```

## output
```yaml
final_text:
  type: string
  required: true
```

## x-category
demo

<!-- reference: guides/tone.md -->
"#;

    #[test]
    fn parses_a_complete_document() {
        let skill = parse_skill(DOCUMENT).unwrap();
        assert_eq!(skill.id, "greet-user");
        assert_eq!(skill.version.as_deref(), Some("1.2.0"));
        assert!(skill.description.starts_with("Greets a user"));
        assert_eq!(skill.intents, vec!["greet someone", "say hello"]);

        assert_eq!(skill.input_schema.len(), 2);
        assert!(skill.input_schema[0].required);
        assert_eq!(skill.input_schema[1].field_type, FieldType::Boolean);
        assert!(!skill.input_schema[1].required);

        assert_eq!(skill.steps.len(), 2);
        assert_eq!(skill.steps[0].kind(), StepKind::Prompt);
        assert_eq!(skill.steps[0].var_name.as_deref(), Some("greeting"));

        assert_eq!(skill.output_contract.len(), 1);
        assert!(skill.output_contract[0].required);

        assert_eq!(skill.extensions.get("x-category").map(String::as_str), Some("demo"));
        assert_eq!(skill.references.len(), 1);
    }

    #[test]
    fn output_shorthand_defaults_to_optional() {
        let source = "# skill: s\n## steps\n### step: a\n```template\nx\n```\n## output\n```yaml\nresult: string\n```\n";
        let skill = parse_skill(source).unwrap();
        assert!(!skill.output_contract[0].required);
    }

    #[test]
    fn missing_steps_section_is_rejected() {
        let err = parse_skill("# skill: s\n## description\nonly text\n").unwrap_err();
        assert!(err.message.contains("no steps section"));
    }

    #[test]
    fn is_valid_never_panics() {
        assert!(!is_valid(""));
        assert!(!is_valid("# skill:\n"));
        assert!(!is_valid("# skill: x\n## steps\n"));
        assert!(is_valid(DOCUMENT));
    }

    #[test]
    fn unknown_sections_are_ignored() {
        let source = "# skill: s\n## notes\nanything\n## steps\n### step: a\n```template\nx\n```\n";
        assert!(parse_skill(source).is_ok());
    }
}
