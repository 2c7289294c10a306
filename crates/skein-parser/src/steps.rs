//! Parsing of `### step:` blocks inside the steps section.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value as Json;
use skein_core::{
    AwaitStepConfig, PromptStepConfig, Step, StepConfig, StepKind, TemplateStepConfig,
    ToolStepConfig,
};
use skein_expr::Condition;

use crate::error::{ParseError, Result};
use crate::schema::{parse_field_specs, parse_yaml_block};
use crate::sections::{fenced_blocks, Line};

/// Longest message an AWAIT step may declare.
const MAX_AWAIT_MESSAGE_CHARS: usize = 1000;

/// Parses the steps section into the ordered step list.
pub(crate) fn parse_steps(lines: &[Line<'_>], section_line: usize) -> Result<Vec<Step>> {
    let blocks = split_step_blocks(lines);
    if blocks.is_empty() {
        return Err(ParseError::new(
            section_line,
            "steps section declares no steps",
        ));
    }

    let mut steps = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (name, heading_line, block_lines) in blocks {
        if let Some(first_line) = seen.get(&name) {
            return Err(ParseError::new(
                heading_line,
                format!("duplicate step name '{name}' (first declared at line {first_line})"),
            ));
        }
        seen.insert(name.clone(), heading_line);
        steps.push(parse_step_block(&name, heading_line, &block_lines)?);
    }
    Ok(steps)
}

fn match_step_heading(line: &str) -> Option<String> {
    let re = Regex::new(r"(?i)^###\s*step\s*:\s*(.+)$").ok()?;
    let caps = re.captures(line.trim_end())?;
    Some(caps[1].trim().to_string())
}

fn match_attribute(line: &str) -> Option<(String, String)> {
    let re = Regex::new(r"^\*\*([A-Za-z][A-Za-z0-9_]*)\*\*\s*:\s*(.*)$").ok()?;
    let caps = re.captures(line.trim())?;
    Some((caps[1].to_lowercase(), caps[2].trim().to_string()))
}

type StepBlock<'a> = (String, usize, Vec<Line<'a>>);

fn split_step_blocks<'a>(lines: &[Line<'a>]) -> Vec<StepBlock<'a>> {
    let mut blocks: Vec<StepBlock<'a>> = Vec::new();
    let mut in_fence = false;
    for &(line_no, text) in lines {
        if text.trim_start().starts_with("```") {
            in_fence = !in_fence;
            if let Some(block) = blocks.last_mut() {
                block.2.push((line_no, text));
            }
            continue;
        }
        if !in_fence {
            if let Some(name) = match_step_heading(text) {
                blocks.push((name, line_no, Vec::new()));
                continue;
            }
        }
        if let Some(block) = blocks.last_mut() {
            block.2.push((line_no, text));
        }
    }
    blocks
}

fn parse_step_block(name: &str, heading_line: usize, lines: &[Line<'_>]) -> Result<Step> {
    // Attributes, outside fences only.
    let mut attributes: HashMap<String, (String, usize)> = HashMap::new();
    let mut in_fence = false;
    for &(line_no, text) in lines {
        if text.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some((key, value)) = match_attribute(text) {
            attributes.insert(key, (value, line_no));
        }
    }

    let fences = fenced_blocks(lines)?;

    // The guard: a `**when**:` attribute or a dedicated ```when fence.
    let mut when: Option<(String, usize)> = attributes
        .get("when")
        .map(|(value, line)| (value.clone(), *line));
    for (lang, body, fence_line) in &fences {
        if lang == "when" {
            if when.is_some() {
                return Err(ParseError::new(
                    *fence_line,
                    format!("step '{name}' declares 'when' twice"),
                ));
            }
            let parsed = parse_yaml_block(body, *fence_line)?;
            let expr = parsed
                .get("expr")
                .and_then(Json::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    ParseError::new(
                        *fence_line,
                        format!("step '{name}': a ```when block must set 'expr'"),
                    )
                })?;
            when = Some((expr.to_string(), *fence_line));
        }
    }
    let when = match when {
        Some((text, line)) => Some(Condition::parse(&text).map_err(|e| {
            ParseError::new(line, format!("step '{name}': {e}"))
        })?),
        None => None,
    };

    // The body fences the configuration may come from.
    let yaml_fence = fences
        .iter()
        .find(|(lang, _, _)| matches!(lang.as_str(), "yaml" | "yml" | "json"));
    let parsed_yaml = match yaml_fence {
        Some((_, body, fence_line)) => Some((parse_yaml_block(body, *fence_line)?, *fence_line)),
        None => None,
    };
    let prompt_fence = fences.iter().find(|(lang, _, _)| lang == "prompt");
    let body_fence = fences
        .iter()
        .find(|(lang, _, _)| matches!(lang.as_str(), "template" | "text" | ""))
        .or(prompt_fence)
        .or(yaml_fence);

    let kind = step_kind(name, heading_line, &attributes, &parsed_yaml, prompt_fence.is_some(), !fences.is_empty())?;

    let config = match kind {
        StepKind::Tool => {
            let tool_name = attributes
                .get("tool")
                .map(|(value, _)| value.clone())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    ParseError::new(
                        heading_line,
                        format!("tool step '{name}' requires a **tool** attribute"),
                    )
                })?;
            let (input_template, output_fields) = match &parsed_yaml {
                Some((value, line)) => split_tool_body(value.clone(), *line)?,
                None => (Json::Object(serde_json::Map::new()), Vec::new()),
            };
            StepConfig::Tool(ToolStepConfig {
                tool_name,
                input_template,
                output_fields,
            })
        }
        StepKind::Prompt => {
            let body = prompt_fence
                .or(body_fence)
                .map(|(_, body, _)| body.trim_end().to_string())
                .filter(|b| !b.trim().is_empty())
                .ok_or_else(|| {
                    ParseError::new(
                        heading_line,
                        format!("prompt step '{name}' requires a non-empty ```prompt block"),
                    )
                })?;
            StepConfig::Prompt(PromptStepConfig { template: body })
        }
        StepKind::Template => {
            let body = body_fence
                .map(|(_, body, _)| body.trim_end().to_string())
                .filter(|b| !b.trim().is_empty())
                .ok_or_else(|| {
                    ParseError::new(
                        heading_line,
                        format!("template step '{name}' requires a non-empty fenced block"),
                    )
                })?;
            StepConfig::Template(TemplateStepConfig { template: body })
        }
        StepKind::Await => {
            let (value, fence_line) = parsed_yaml.as_ref().ok_or_else(|| {
                ParseError::new(
                    heading_line,
                    format!("await step '{name}' requires a ```yaml block"),
                )
            })?;
            StepConfig::Await(parse_await_config(name, value, *fence_line)?)
        }
    };

    let mut step = Step::new(name, config);
    if let Some(condition) = when {
        step = step.with_when(condition);
    }
    if let Some((alias, _)) = attributes.get("varname").or_else(|| attributes.get("var_name")) {
        if !alias.is_empty() {
            step = step.with_var_name(alias.clone());
        }
    }
    Ok(step)
}

/// Determines the step kind: an explicit `**type**` wins, then inference
/// from the attributes and fences present.
fn step_kind(
    name: &str,
    heading_line: usize,
    attributes: &HashMap<String, (String, usize)>,
    parsed_yaml: &Option<(Json, usize)>,
    has_prompt_fence: bool,
    has_any_fence: bool,
) -> Result<StepKind> {
    if let Some((type_name, line)) = attributes.get("type") {
        return match type_name.to_lowercase().as_str() {
            "tool" => Ok(StepKind::Tool),
            "prompt" => Ok(StepKind::Prompt),
            "await" => Ok(StepKind::Await),
            "template" => Ok(StepKind::Template),
            "compose" => Err(ParseError::new(
                *line,
                format!("step '{name}': unsupported step type 'compose'"),
            )),
            other => Err(ParseError::new(
                *line,
                format!("step '{name}': unknown step type '{other}'"),
            )),
        };
    }

    if attributes.contains_key("tool") {
        return Ok(StepKind::Tool);
    }
    if has_prompt_fence {
        return Ok(StepKind::Prompt);
    }
    if let Some((value, _)) = parsed_yaml {
        if value.get("message").is_some() && value.get("input_schema").is_some() {
            return Ok(StepKind::Await);
        }
    }
    if has_any_fence {
        return Ok(StepKind::Template);
    }
    Err(ParseError::new(
        heading_line,
        format!("step '{name}' has no recognisable configuration"),
    ))
}

/// Splits a TOOL step's yaml body into the input template and the declared
/// output field names.
fn split_tool_body(mut value: Json, line: usize) -> Result<(Json, Vec<String>)> {
    let Some(map) = value.as_object_mut() else {
        return Err(ParseError::new(line, "tool input must be a mapping"));
    };
    let output_fields = match map.shift_remove("output_schema") {
        None => Vec::new(),
        Some(Json::Object(schema)) => schema.keys().cloned().collect(),
        Some(Json::Array(items)) => items
            .iter()
            .filter_map(Json::as_str)
            .map(String::from)
            .collect(),
        Some(_) => {
            return Err(ParseError::new(
                line,
                "output_schema must be a mapping or a list of field names",
            ))
        }
    };
    Ok((value, output_fields))
}

fn parse_await_config(name: &str, value: &Json, line: usize) -> Result<AwaitStepConfig> {
    let message = value
        .get("message")
        .and_then(Json::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| {
            ParseError::new(
                line,
                format!("await step '{name}' requires a non-blank 'message'"),
            )
        })?;
    if message.chars().count() > MAX_AWAIT_MESSAGE_CHARS {
        return Err(ParseError::new(
            line,
            format!(
                "await step '{name}': message exceeds {MAX_AWAIT_MESSAGE_CHARS} characters"
            ),
        ));
    }
    let schema_value = value.get("input_schema").ok_or_else(|| {
        ParseError::new(
            line,
            format!("await step '{name}' requires an 'input_schema'"),
        )
    })?;
    let input_schema = parse_field_specs(schema_value, true, line)?;
    if input_schema.is_empty() {
        return Err(ParseError::new(
            line,
            format!("await step '{name}': input_schema must not be empty"),
        ));
    }
    Ok(AwaitStepConfig {
        message: message.to_string(),
        input_schema,
    })
}
