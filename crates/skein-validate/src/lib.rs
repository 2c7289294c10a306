//! # skein-validate
//!
//! Static analysis for parsed skein skills.
//!
//! Where the parser rejects documents that are structurally wrong, this
//! crate reports problems a well-formed skill will still hit at run time:
//! template references that nothing binds, guards that can never pass,
//! tool bindings that do not line up with the registered tools, and output
//! contract keys nothing produces.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod report;
mod validator;

pub use report::{
    IssueCategory, IssueCounts, IssueLevel, SkillValidationReport, ValidationIssue,
};
pub use validator::SkillValidator;
