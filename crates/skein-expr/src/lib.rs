//! # skein-expr
//!
//! Template rendering and condition evaluation for skein skills.
//!
//! Everything a skill author writes between `{{` and `}}` — variable paths,
//! arithmetic, string concatenation, `{{#for}}` iteration — is evaluated
//! here, as are the boolean `when` guards that gate steps. Both evaluators
//! share one path syntax and resolve against the same variable view, in
//! which step outputs are bound wrapped (see [`VarValue`]) and everything
//! else plain.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod condition;
mod error;
mod lex;
mod path;
mod template;
mod vars;

pub use condition::{CmpOp, CondExpr, Condition};
pub use error::{ExprError, Result};
pub use path::{lookup_path, PathExpr, PathRoot, PathSegment, Scope};
pub use template::{
    extract_variables, referenced_variables, render, render_structure, render_value, TemplateRefs,
};
pub use vars::{display_value, format_number, number_value, VarMap, VarValue};
