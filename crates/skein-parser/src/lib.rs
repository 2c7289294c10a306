//! # skein-parser
//!
//! Markdown skill document parsing for skein.
//!
//! A skill document is a Markdown file with a `# skill: <id>` heading,
//! `##` sections for description, intents, schemas and steps, and fenced
//! blocks for step configurations. [`parse_skill`] turns a document into a
//! [`skein_core::Skill`]; [`to_markdown`] renders one back so the round
//! trip preserves the model.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod loader;
mod parser;
mod schema;
mod sections;
mod serializer;
mod steps;

pub use error::{ParseError, Result};
pub use loader::FsSkillRepository;
pub use parser::{is_valid, parse_skill};
pub use serializer::to_markdown;
