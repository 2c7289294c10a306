//! Condition guards for step gating.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr   := or
//! or     := and ( "||" and )*
//! and    := not ( "&&" not )*
//! not    := "!"? cmp
//! cmp    := atom ( ( "==" | "!=" | "<" | "<=" | ">" | ">=" ) atom )?
//! atom   := literal | path | "(" expr ")"
//! literal:= number | string | "true" | "false" | "null"
//! ```
//!
//! Paths may be written bare (`x.y`) or wrapped in template braces
//! (`{{x.y}}`); the braces are decoration. Parse errors are reported at
//! skill parse time, never during execution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ExprError, Result};
use crate::lex::{lex, Token};
use crate::path::{parse_path, PathExpr, Scope};
use crate::vars::{as_number, VarMap};

/// A parsed `when` guard: the author's original text plus the AST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Original expression text, kept for re-serialisation and reports.
    pub raw: String,
    /// Parsed form.
    pub expr: CondExpr,
}

impl Condition {
    /// Parses a guard expression.
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = lex(text).map_err(|reason| ExprError::InvalidCondition {
            text: text.to_string(),
            reason,
        })?;
        let mut pos = 0;
        let expr = parse_or(&tokens, &mut pos).map_err(|reason| ExprError::InvalidCondition {
            text: text.to_string(),
            reason,
        })?;
        if pos != tokens.len() {
            return Err(ExprError::InvalidCondition {
                text: text.to_string(),
                reason: format!("unexpected trailing tokens at position {pos}"),
            });
        }
        Ok(Self {
            raw: text.to_string(),
            expr,
        })
    }

    /// Evaluates the guard against a variable view.
    pub fn evaluate(&self, vars: &VarMap) -> bool {
        let scope = Scope::new(vars);
        truthy(&eval(&self.expr, &scope))
    }

    /// Root identifiers the guard references, for static analysis.
    pub fn path_roots(&self) -> Vec<String> {
        let mut roots = Vec::new();
        collect_roots(&self.expr, &mut roots);
        roots
    }

    /// Folds the guard to a constant when it references no variables.
    pub fn constant_value(&self) -> Option<bool> {
        if self.path_roots().is_empty() {
            Some(self.evaluate(&VarMap::new()))
        } else {
            None
        }
    }
}

/// Condition expression AST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CondExpr {
    /// A literal number, string, boolean or null.
    Literal(Value),
    /// A variable path.
    Path(PathExpr),
    /// Logical negation.
    Not(Box<CondExpr>),
    /// A comparison between two atoms.
    Compare {
        /// Comparison operator.
        op: CmpOp,
        /// Left operand.
        lhs: Box<CondExpr>,
        /// Right operand.
        rhs: Box<CondExpr>,
    },
    /// Logical conjunction.
    And(Box<CondExpr>, Box<CondExpr>),
    /// Logical disjunction.
    Or(Box<CondExpr>, Box<CondExpr>),
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

type ParseResult = std::result::Result<CondExpr, String>;

fn parse_or(tokens: &[Token], pos: &mut usize) -> ParseResult {
    let mut lhs = parse_and(tokens, pos)?;
    while tokens.get(*pos) == Some(&Token::Or) {
        *pos += 1;
        let rhs = parse_and(tokens, pos)?;
        lhs = CondExpr::Or(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_and(tokens: &[Token], pos: &mut usize) -> ParseResult {
    let mut lhs = parse_not(tokens, pos)?;
    while tokens.get(*pos) == Some(&Token::And) {
        *pos += 1;
        let rhs = parse_not(tokens, pos)?;
        lhs = CondExpr::And(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_not(tokens: &[Token], pos: &mut usize) -> ParseResult {
    if tokens.get(*pos) == Some(&Token::Not) {
        *pos += 1;
        let inner = parse_cmp(tokens, pos)?;
        return Ok(CondExpr::Not(Box::new(inner)));
    }
    parse_cmp(tokens, pos)
}

fn parse_cmp(tokens: &[Token], pos: &mut usize) -> ParseResult {
    let lhs = parse_atom(tokens, pos)?;
    let op = match tokens.get(*pos) {
        Some(Token::Eq) => CmpOp::Eq,
        Some(Token::Ne) => CmpOp::Ne,
        Some(Token::Lt) => CmpOp::Lt,
        Some(Token::Le) => CmpOp::Le,
        Some(Token::Gt) => CmpOp::Gt,
        Some(Token::Ge) => CmpOp::Ge,
        _ => return Ok(lhs),
    };
    *pos += 1;
    let rhs = parse_atom(tokens, pos)?;
    Ok(CondExpr::Compare {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

fn parse_atom(tokens: &[Token], pos: &mut usize) -> ParseResult {
    match tokens.get(*pos) {
        Some(Token::Number(n)) => {
            *pos += 1;
            Ok(CondExpr::Literal(crate::vars::number_value(*n)))
        }
        Some(Token::Minus) => {
            *pos += 1;
            match tokens.get(*pos) {
                Some(Token::Number(n)) => {
                    *pos += 1;
                    Ok(CondExpr::Literal(crate::vars::number_value(-n)))
                }
                other => Err(format!("expected number after '-', found {other:?}")),
            }
        }
        Some(Token::Str(s)) => {
            *pos += 1;
            Ok(CondExpr::Literal(Value::String(s.clone())))
        }
        Some(Token::LParen) => {
            *pos += 1;
            let inner = parse_or(tokens, pos)?;
            match tokens.get(*pos) {
                Some(Token::RParen) => {
                    *pos += 1;
                    Ok(inner)
                }
                other => Err(format!("expected ')', found {other:?}")),
            }
        }
        Some(Token::Ident(name)) => match name.as_str() {
            "true" => {
                *pos += 1;
                Ok(CondExpr::Literal(Value::Bool(true)))
            }
            "false" => {
                *pos += 1;
                Ok(CondExpr::Literal(Value::Bool(false)))
            }
            "null" => {
                *pos += 1;
                Ok(CondExpr::Literal(Value::Null))
            }
            _ => Ok(CondExpr::Path(parse_path(tokens, pos)?)),
        },
        other => Err(format!("expected atom, found {other:?}")),
    }
}

fn eval(expr: &CondExpr, scope: &Scope<'_>) -> Value {
    match expr {
        CondExpr::Literal(v) => v.clone(),
        CondExpr::Path(path) => scope.resolve(path),
        CondExpr::Not(inner) => Value::Bool(!truthy(&eval(inner, scope))),
        CondExpr::And(lhs, rhs) => {
            Value::Bool(truthy(&eval(lhs, scope)) && truthy(&eval(rhs, scope)))
        }
        CondExpr::Or(lhs, rhs) => {
            Value::Bool(truthy(&eval(lhs, scope)) || truthy(&eval(rhs, scope)))
        }
        CondExpr::Compare { op, lhs, rhs } => {
            let l = eval(lhs, scope);
            let r = eval(rhs, scope);
            Value::Bool(compare(*op, &l, &r))
        }
    }
}

fn compare(op: CmpOp, l: &Value, r: &Value) -> bool {
    match op {
        CmpOp::Eq => values_equal(l, r),
        CmpOp::Ne => !values_equal(l, r),
        // Orderings require both sides numeric; anything else (null
        // included) is false, never an error.
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let (Some(a), Some(b)) = (as_number(l), as_number(r)) else {
                return false;
            };
            match op {
                CmpOp::Lt => a < b,
                CmpOp::Le => a <= b,
                CmpOp::Gt => a > b,
                CmpOp::Ge => a >= b,
                CmpOp::Eq | CmpOp::Ne => unreachable!(),
            }
        }
    }
}

/// Same-type value equality; false across incompatible types.
fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(_), Value::Number(_)) => match (as_number(l), as_number(r)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => a == b,
        _ => false,
    }
}

/// Truthiness of a bare atom: `null` and `false` are false, everything else
/// is true.
fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

fn collect_roots(expr: &CondExpr, roots: &mut Vec<String>) {
    match expr {
        CondExpr::Literal(_) => {}
        CondExpr::Path(path) => {
            if let Some(root) = path.root_ident() {
                roots.push(root.to_string());
            }
            for index in path.index_idents() {
                roots.push(index.to_string());
            }
        }
        CondExpr::Not(inner) => collect_roots(inner, roots),
        CondExpr::Compare { lhs, rhs, .. } => {
            collect_roots(lhs, roots);
            collect_roots(rhs, roots);
        }
        CondExpr::And(lhs, rhs) | CondExpr::Or(lhs, rhs) => {
            collect_roots(lhs, roots);
            collect_roots(rhs, roots);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::VarValue;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> VarMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), VarValue::Plain(v.clone())))
            .collect()
    }

    fn eval_text(text: &str, view: &VarMap) -> bool {
        Condition::parse(text).unwrap().evaluate(view)
    }

    #[test]
    fn equality_with_braced_paths() {
        let view = vars(&[("flag", json!(true))]);
        assert!(eval_text("{{flag}} == true", &view));
        assert!(!eval_text("{{flag}} == false", &view));
    }

    #[test]
    fn null_checks() {
        let view = vars(&[("x", json!("go"))]);
        assert!(eval_text("{{x}} != null", &view));
        assert!(!eval_text("{{missing}} != null", &view));
        assert!(eval_text("{{missing}} == null", &view));
    }

    #[test]
    fn numeric_orderings() {
        let view = vars(&[("n", json!(5))]);
        assert!(eval_text("n > 2", &view));
        assert!(eval_text("n <= 5", &view));
        assert!(!eval_text("n < 5", &view));
        // Ordering against null or a string is false, never an error.
        assert!(!eval_text("missing > 2", &view));
        assert!(!eval_text("\"a\" < \"b\"", &view));
    }

    #[test]
    fn equality_across_types_is_false() {
        let view = vars(&[("s", json!("5"))]);
        assert!(!eval_text("s == 5", &view));
        assert!(eval_text("s != 5", &view));
    }

    #[test]
    fn boolean_combinators_and_parens() {
        let view = vars(&[("a", json!(1)), ("b", json!("x"))]);
        assert!(eval_text("a == 1 && b == \"x\"", &view));
        assert!(eval_text("a == 2 || b == \"x\"", &view));
        assert!(eval_text("!(a == 2) && (b == \"x\" || false)", &view));
    }

    #[test]
    fn bare_atom_truthiness() {
        let view = vars(&[("t", json!(true)), ("f", json!(false)), ("s", json!("yes"))]);
        assert!(eval_text("t", &view));
        assert!(!eval_text("f", &view));
        assert!(eval_text("s", &view));
        assert!(!eval_text("missing", &view));
        assert!(eval_text("!f", &view));
    }

    #[test]
    fn negative_number_literals() {
        let view = vars(&[("n", json!(-3))]);
        assert!(eval_text("n == -3", &view));
        assert!(eval_text("n > -5", &view));
    }

    #[test]
    fn parse_errors_carry_text() {
        let err = Condition::parse("a ==").unwrap_err();
        assert!(matches!(err, ExprError::InvalidCondition { ref text, .. } if text == "a =="));
        assert!(Condition::parse("a && (b").is_err());
        assert!(Condition::parse("a ?? b").is_err());
    }

    #[test]
    fn path_roots_collects_every_reference() {
        let cond = Condition::parse("{{a.b}} == 1 && !c || items[#i] != null").unwrap();
        let roots = cond.path_roots();
        assert!(roots.contains(&"a".to_string()));
        assert!(roots.contains(&"c".to_string()));
        assert!(roots.contains(&"items".to_string()));
        assert!(roots.contains(&"i".to_string()));
    }

    #[test]
    fn constant_conditions_fold() {
        assert_eq!(Condition::parse("false").unwrap().constant_value(), Some(false));
        assert_eq!(Condition::parse("1 < 2").unwrap().constant_value(), Some(true));
        assert_eq!(Condition::parse("x == 1").unwrap().constant_value(), None);
    }

    #[test]
    fn ast_round_trips_through_serde() {
        let cond = Condition::parse("{{x}} != null && n >= 2").unwrap();
        let json = serde_json::to_string(&cond).unwrap();
        let back: Condition = serde_json::from_str(&json).unwrap();
        assert_eq!(cond, back);
    }
}
