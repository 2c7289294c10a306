//! skein command-line interface: list, inspect, validate and run skills.

mod adapters;

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use skein_core::{AwaitRequest, FieldType, Skill, SkillResult, SkillStatus, SkillSummary};
use skein_engine::{LlmRegistry, SkillEngine, ToolRegistry};
use skein_parser::{parse_skill, FsSkillRepository};
use skein_store::InMemoryExecutionStore;
use skein_validate::SkillValidator;

use crate::adapters::EchoAdapter;

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Pretty-printed JSON for programmatic consumption.
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "skein")]
#[command(about = "Markdown-defined skill workflows: parse, validate, execute")]
#[command(version)]
struct Cli {
    /// Output format.
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the skills found in a directory.
    List {
        /// Directory to scan for skill documents.
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
    /// Show one skill's summary.
    Show {
        /// Directory to scan for skill documents.
        #[arg(value_name = "DIR")]
        dir: PathBuf,
        /// Skill id.
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Parse and statically validate a skill document.
    Validate {
        /// Path to the skill document.
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Execute a skill document, answering awaits interactively.
    Execute {
        /// Path to the skill document.
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Input values, `key=value`. Values that parse as JSON are passed
        /// structurally, anything else as a string.
        #[arg(short, long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,

        /// All inputs as one JSON object; merged under explicit --input
        /// flags.
        #[arg(long, value_name = "JSON")]
        inputs_json: Option<String>,

        /// Fail instead of asking on stdin when the skill awaits input.
        #[arg(long)]
        no_prompt: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::List { dir } => list(dir, cli.output).await,
        Commands::Show { dir, id } => show(dir, &id, cli.output).await,
        Commands::Validate { file } => validate(file, cli.output),
        Commands::Execute {
            file,
            inputs,
            inputs_json,
            no_prompt,
        } => execute(file, inputs, inputs_json, no_prompt, cli.output).await,
    }
}

async fn list(dir: PathBuf, output: OutputFormat) -> anyhow::Result<()> {
    let repo = FsSkillRepository::new(&dir);
    let summaries = repo.scan()?;
    match output {
        OutputFormat::Json => {
            let summaries: Vec<SkillSummary> =
                summaries.iter().map(|(s, _, _)| SkillSummary::from(s)).collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        OutputFormat::Text => {
            if summaries.is_empty() {
                println!("no skills found under {}", dir.display());
            }
            for (skill, _, path) in &summaries {
                let version = skill.version.as_deref().unwrap_or("-");
                println!(
                    "{:<24} {:<10} {}  ({})",
                    skill.id,
                    version,
                    skill.description.lines().next().unwrap_or(""),
                    path.display()
                );
            }
        }
    }
    Ok(())
}

async fn show(dir: PathBuf, id: &str, output: OutputFormat) -> anyhow::Result<()> {
    let repo = FsSkillRepository::new(&dir);
    let found = repo
        .scan()?
        .into_iter()
        .find(|(skill, _, _)| skill.id == id);
    let Some((skill, _, path)) = found else {
        bail!("skill '{id}' not found under {}", dir.display());
    };

    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&SkillSummary::from(&skill))?);
        }
        OutputFormat::Text => {
            println!("id:          {}", skill.id);
            println!("version:     {}", skill.version.as_deref().unwrap_or("-"));
            println!("source:      {}", path.display());
            println!("description: {}", skill.description);
            if !skill.intents.is_empty() {
                println!("intents:     {}", skill.intents.join(", "));
            }
            println!("steps:");
            for step in &skill.steps {
                let guard = step
                    .when
                    .as_ref()
                    .map(|w| format!("  [when {}]", w.raw))
                    .unwrap_or_default();
                println!("  - {} ({}){}", step.name, step.kind(), guard);
            }
            print_schema("inputs", &skill.input_schema);
            print_schema("outputs", &skill.output_contract);
        }
    }
    Ok(())
}

fn print_schema(label: &str, fields: &[skein_core::FieldSpec]) {
    if fields.is_empty() {
        return;
    }
    println!("{label}:");
    for field in fields {
        let flag = if field.required { "required" } else { "optional" };
        println!("  - {}: {} ({flag})", field.name, field.field_type.as_str());
    }
}

fn validate(file: PathBuf, output: OutputFormat) -> anyhow::Result<()> {
    let source =
        std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
    let skill = match parse_skill(&source) {
        Ok(skill) => skill,
        Err(e) => {
            match output {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({"valid": false, "parse_error": e.to_string()}))?
                ),
                OutputFormat::Text => println!("{e}"),
            }
            std::process::exit(1);
        }
    };

    let report = SkillValidator::new().validate(&skill);
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("{}", report.summary);
            for issue in &report.issues {
                let step = issue
                    .step
                    .as_deref()
                    .map(|s| format!(" [{s}]"))
                    .unwrap_or_default();
                println!(
                    "  {:<10} {:<9}{} {}",
                    issue.level.as_str(),
                    issue.category.as_str(),
                    step,
                    issue.message
                );
            }
        }
    }
    Ok(())
}

async fn execute(
    file: PathBuf,
    input_flags: Vec<String>,
    inputs_json: Option<String>,
    no_prompt: bool,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let source =
        std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
    let skill = parse_skill(&source).map_err(|e| anyhow::anyhow!("{e}"))?;

    let inputs = gather_inputs(&input_flags, inputs_json.as_deref())?;

    let tools = Arc::new(ToolRegistry::new());
    let llms = Arc::new(LlmRegistry::new());
    llms.register(Arc::new(EchoAdapter)).await;
    let store = Arc::new(InMemoryExecutionStore::new());
    let engine = SkillEngine::new(tools, llms, store);

    let mut result = engine
        .execute(&skill, inputs)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    while result.status == SkillStatus::WaitingForInput {
        let request = result
            .await_request
            .clone()
            .ok_or_else(|| anyhow::anyhow!("waiting result without an await request"))?;
        if no_prompt {
            print_result(&skill, &result, output)?;
            bail!("skill is waiting for input and --no-prompt is set");
        }
        let answers = ask_await_input(&request)?;
        result = engine
            .resume(&skill, &result.execution_id, answers)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
    }

    print_result(&skill, &result, output)?;
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

/// Merges `--inputs-json` and `key=value` flags (flags win).
fn gather_inputs(
    flags: &[String],
    inputs_json: Option<&str>,
) -> anyhow::Result<HashMap<String, Value>> {
    let mut inputs: HashMap<String, Value> = match inputs_json {
        Some(text) => serde_json::from_str::<serde_json::Map<String, Value>>(text)
            .context("--inputs-json must be a JSON object")?
            .into_iter()
            .collect(),
        None => HashMap::new(),
    };

    for flag in flags {
        let Some((key, raw)) = flag.split_once('=') else {
            bail!("input '{flag}' is not of the form key=value");
        };
        let value = serde_json::from_str::<Value>(raw).unwrap_or(Value::String(raw.to_string()));
        inputs.insert(key.trim().to_string(), value);
    }
    Ok(inputs)
}

/// Prompts on stdin for each field of an await request.
fn ask_await_input(request: &AwaitRequest) -> anyhow::Result<HashMap<String, Value>> {
    println!();
    println!("{}", request.message);

    let mut answers = HashMap::new();
    let stdin = std::io::stdin();
    for field in &request.input_schema {
        let flag = if field.required { "" } else { " (optional)" };
        loop {
            print!("  {} [{}]{}: ", field.name, field.field_type.as_str(), flag);
            std::io::stdout().flush()?;
            let mut line = String::new();
            stdin.read_line(&mut line)?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                if field.required {
                    continue;
                }
                break;
            }
            match parse_field_value(field.field_type, trimmed) {
                Some(value) => {
                    answers.insert(field.name.clone(), value);
                    break;
                }
                None => println!("  expected a {} value", field.field_type.as_str()),
            }
        }
    }
    Ok(answers)
}

fn parse_field_value(field_type: FieldType, raw: &str) -> Option<Value> {
    match field_type {
        FieldType::String => Some(Value::String(raw.to_string())),
        FieldType::Boolean => match raw {
            "true" | "yes" | "y" => Some(Value::Bool(true)),
            "false" | "no" | "n" => Some(Value::Bool(false)),
            _ => None,
        },
        FieldType::Number => serde_json::from_str::<Value>(raw)
            .ok()
            .filter(Value::is_number),
        FieldType::Array | FieldType::Object => serde_json::from_str(raw).ok(),
    }
}

fn print_result(skill: &Skill, result: &SkillResult, output: OutputFormat) -> anyhow::Result<()> {
    match output {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "skillId": skill.id,
                    "version": skill.version,
                    "status": result.status,
                    "success": result.success,
                    "executionId": result.execution_id,
                    "output": result.output,
                    "error": result.error,
                    "awaitMessage": result.await_request.as_ref().map(|r| r.message.clone()),
                    "durationMs": result.duration_ms,
                }))?
            );
        }
        OutputFormat::Text => {
            println!();
            for step in &result.step_results {
                println!("  {:<24} {:?}", step.step_name, step.status);
            }
            match result.status {
                SkillStatus::Completed => {
                    println!("\ncompleted in {}ms", result.duration_ms);
                    if let Some(output) = &result.output {
                        println!("{}", serde_json::to_string_pretty(output)?);
                    }
                }
                SkillStatus::Failed => {
                    println!(
                        "\nfailed: {}",
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
                SkillStatus::WaitingForInput => {
                    println!("\nwaiting for input (execution {})", result.execution_id);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_inputs_parses_json_values_and_strings() {
        let inputs = gather_inputs(
            &["name=Ada".to_string(), "count=3".to_string(), "ok=true".to_string()],
            None,
        )
        .unwrap();
        assert_eq!(inputs["name"], Value::String("Ada".to_string()));
        assert_eq!(inputs["count"], json!(3));
        assert_eq!(inputs["ok"], json!(true));
    }

    #[test]
    fn gather_inputs_merges_flags_over_json() {
        let inputs = gather_inputs(
            &["mode=fast".to_string()],
            Some(r#"{"mode": "slow", "extra": 1}"#),
        )
        .unwrap();
        assert_eq!(inputs["mode"], Value::String("fast".to_string()));
        assert_eq!(inputs["extra"], json!(1));
    }

    #[test]
    fn gather_inputs_rejects_malformed_flags() {
        assert!(gather_inputs(&["oops".to_string()], None).is_err());
        assert!(gather_inputs(&[], Some("[1,2]")).is_err());
    }

    #[test]
    fn field_values_parse_by_declared_type() {
        assert_eq!(
            parse_field_value(FieldType::Boolean, "yes"),
            Some(json!(true))
        );
        assert_eq!(parse_field_value(FieldType::Boolean, "maybe"), None);
        assert_eq!(parse_field_value(FieldType::Number, "2.5"), Some(json!(2.5)));
        assert_eq!(parse_field_value(FieldType::Number, "abc"), None);
        assert_eq!(
            parse_field_value(FieldType::String, "true"),
            Some(json!("true"))
        );
        assert_eq!(
            parse_field_value(FieldType::Array, "[1,2]"),
            Some(json!([1, 2]))
        );
    }
}
