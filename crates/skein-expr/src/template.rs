//! Template rendering.
//!
//! A template is plain text interleaved with `{{ … }}` substitution sites
//! and `{{#for name}} … {{/for}}` iteration blocks. Sites hold a variable
//! path, a literal, or a left-associative arithmetic/concatenation
//! expression. Missing variables render empty; only structural problems
//! (an unterminated `{{`, an unbalanced loop) are errors.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::{ExprError, Result};
use crate::lex::{lex, Token};
use crate::path::{parse_path, PathExpr, Scope};
use crate::vars::{as_number, display_value, number_value, VarMap};

/// Substitutes every `{{ … }}` site in `template` against `vars`.
pub fn render(template: &str, vars: &VarMap) -> Result<String> {
    let segments = parse_segments(template)?;
    let mut scope = Scope::new(vars);
    Ok(render_segments(&segments, &mut scope))
}

/// Like [`render`], but a template whose entire body is a single bare path
/// returns the referenced value with its native type, so nested renderings
/// can preserve structure.
pub fn render_value(template: &str, vars: &VarMap) -> Result<Value> {
    let segments = parse_segments(template.trim())?;
    if let [Segment::Expr(src)] = segments.as_slice() {
        if let Some(path) = PathExpr::parse(src) {
            return Ok(Scope::new(vars).resolve(&path));
        }
    }
    Ok(Value::String(render(template, vars)?))
}

/// Recursively renders every string leaf of a configuration tree. Leaves
/// that are a single bare path keep the referenced value's type.
pub fn render_structure(value: &Value, vars: &VarMap) -> Result<Value> {
    match value {
        Value::String(s) => render_value(s, vars),
        Value::Array(items) => {
            let rendered: Result<Vec<Value>> =
                items.iter().map(|v| render_structure(v, vars)).collect();
            Ok(Value::Array(rendered?))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, item) in map {
                out.insert(key.clone(), render_structure(item, vars)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

/// Root variables a template references, split by whether the reference sits
/// inside a `#for` body (where mapping-element keys may shadow it, so static
/// analysis cannot decide what it binds to).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateRefs {
    /// Names referenced outside any loop body, including loop targets.
    pub outer: BTreeSet<String>,
    /// Names referenced inside a loop body.
    pub loop_scoped: BTreeSet<String>,
}

/// Collects the root variables referenced by a template.
pub fn referenced_variables(template: &str) -> Result<TemplateRefs> {
    let segments = parse_segments(template)?;
    let mut refs = TemplateRefs::default();
    collect_refs(&segments, false, &mut refs);
    Ok(refs)
}

/// All root variables referenced by a template, loop-scoped or not. Empty
/// when the template does not parse.
pub fn extract_variables(template: &str) -> BTreeSet<String> {
    match referenced_variables(template) {
        Ok(refs) => refs.outer.into_iter().chain(refs.loop_scoped).collect(),
        Err(_) => BTreeSet::new(),
    }
}

// ---------------------------------------------------------------------------
// Segmentation

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Expr(String),
    Loop { path: String, body: Vec<Segment> },
}

fn parse_segments(template: &str) -> Result<Vec<Segment>> {
    let mut stack: Vec<(String, Vec<Segment>)> = Vec::new();
    let mut current: Vec<Segment> = Vec::new();
    let mut rest = template;

    loop {
        match rest.find("{{") {
            None => {
                if !rest.is_empty() {
                    current.push(Segment::Literal(rest.to_string()));
                }
                break;
            }
            Some(start) => {
                if start > 0 {
                    current.push(Segment::Literal(rest[..start].to_string()));
                }
                let after = &rest[start + 2..];
                let end = after.find("}}").ok_or_else(|| {
                    ExprError::UnterminatedPlaceholder(template.len() - rest.len() + start)
                })?;
                let inner = after[..end].trim().to_string();
                rest = &after[end + 2..];

                if let Some(target) = loop_open_target(&inner) {
                    stack.push((target.to_string(), std::mem::take(&mut current)));
                } else if inner == "/for" {
                    match stack.pop() {
                        Some((path, outer)) => {
                            let body = std::mem::replace(&mut current, outer);
                            current.push(Segment::Loop { path, body });
                        }
                        None => return Err(ExprError::UnexpectedLoopClose),
                    }
                } else {
                    current.push(Segment::Expr(inner));
                }
            }
        }
    }

    if let Some((path, _)) = stack.pop() {
        return Err(ExprError::UnclosedLoop(path));
    }
    Ok(current)
}

/// Returns the loop target when `inner` is a `#for NAME` opener.
fn loop_open_target(inner: &str) -> Option<&str> {
    let rest = inner.strip_prefix("#for")?;
    if rest.is_empty() {
        return Some("");
    }
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn render_segments(segments: &[Segment], scope: &mut Scope<'_>) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Expr(src) => out.push_str(&display_value(&eval_expr_src(src, scope))),
            Segment::Loop { path, body } => {
                let target = PathExpr::parse(path)
                    .map(|p| scope.resolve(&p))
                    .unwrap_or(Value::Null);
                // A non-sequence or missing target renders nothing.
                if let Value::Array(items) = target {
                    for item in items {
                        scope.push_frame(item);
                        out.push_str(&render_segments(body, scope));
                        scope.pop_frame();
                    }
                }
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Site expressions

#[derive(Debug, Clone, PartialEq)]
enum ExprAst {
    Literal(Value),
    Path(PathExpr),
    Binary {
        op: BinOp,
        lhs: Box<ExprAst>,
        rhs: Box<ExprAst>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Evaluates the body of one substitution site. Any malformed expression
/// resolves to `null`, keeping the missing-variable tolerance uniform.
fn eval_expr_src(src: &str, scope: &Scope<'_>) -> Value {
    match parse_expr_src(src) {
        Some(ast) => eval_ast(&ast, scope),
        None => Value::Null,
    }
}

fn parse_expr_src(src: &str) -> Option<ExprAst> {
    let tokens = lex(src).ok()?;
    let mut pos = 0;
    let ast = parse_additive(&tokens, &mut pos).ok()?;
    if pos == tokens.len() {
        Some(ast)
    } else {
        None
    }
}

fn parse_additive(tokens: &[Token], pos: &mut usize) -> std::result::Result<ExprAst, String> {
    let mut lhs = parse_multiplicative(tokens, pos)?;
    loop {
        let op = match tokens.get(*pos) {
            Some(Token::Plus) => BinOp::Add,
            Some(Token::Minus) => BinOp::Sub,
            _ => break,
        };
        *pos += 1;
        let rhs = parse_multiplicative(tokens, pos)?;
        lhs = ExprAst::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

fn parse_multiplicative(tokens: &[Token], pos: &mut usize) -> std::result::Result<ExprAst, String> {
    let mut lhs = parse_primary(tokens, pos)?;
    loop {
        let op = match tokens.get(*pos) {
            Some(Token::Star) => BinOp::Mul,
            Some(Token::Slash) => BinOp::Div,
            _ => break,
        };
        *pos += 1;
        let rhs = parse_primary(tokens, pos)?;
        lhs = ExprAst::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
    }
    Ok(lhs)
}

fn parse_primary(tokens: &[Token], pos: &mut usize) -> std::result::Result<ExprAst, String> {
    match tokens.get(*pos) {
        Some(Token::Number(n)) => {
            *pos += 1;
            Ok(ExprAst::Literal(number_value(*n)))
        }
        Some(Token::Str(s)) => {
            *pos += 1;
            Ok(ExprAst::Literal(Value::String(s.clone())))
        }
        Some(Token::Ident(_)) => Ok(ExprAst::Path(parse_path(tokens, pos)?)),
        other => Err(format!("expected operand, found {other:?}")),
    }
}

fn eval_ast(ast: &ExprAst, scope: &Scope<'_>) -> Value {
    match ast {
        ExprAst::Literal(v) => v.clone(),
        ExprAst::Path(path) => scope.resolve(path),
        ExprAst::Binary { op, lhs, rhs } => {
            let l = eval_ast(lhs, scope);
            let r = eval_ast(rhs, scope);
            apply_binary(*op, &l, &r)
        }
    }
}

fn apply_binary(op: BinOp, l: &Value, r: &Value) -> Value {
    if op == BinOp::Add && (l.is_string() || r.is_string()) {
        return Value::String(format!("{}{}", display_value(l), display_value(r)));
    }
    let (Some(a), Some(b)) = (as_number(l), as_number(r)) else {
        // Missing or non-numeric operands never fail a render.
        return Value::Null;
    };
    match op {
        BinOp::Add => number_value(a + b),
        BinOp::Sub => number_value(a - b),
        BinOp::Mul => number_value(a * b),
        BinOp::Div => {
            if b == 0.0 {
                Value::from(0)
            } else {
                number_value(a / b)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Static reference collection

fn collect_refs(segments: &[Segment], in_loop: bool, refs: &mut TemplateRefs) {
    for segment in segments {
        match segment {
            Segment::Literal(_) => {}
            Segment::Expr(src) => {
                if let Some(ast) = parse_expr_src(src) {
                    collect_ast_refs(&ast, in_loop, refs);
                }
            }
            Segment::Loop { path, body } => {
                if let Some(parsed) = PathExpr::parse(path) {
                    add_path_refs(&parsed, in_loop, refs);
                }
                collect_refs(body, true, refs);
            }
        }
    }
}

fn collect_ast_refs(ast: &ExprAst, in_loop: bool, refs: &mut TemplateRefs) {
    match ast {
        ExprAst::Literal(_) => {}
        ExprAst::Path(path) => add_path_refs(path, in_loop, refs),
        ExprAst::Binary { lhs, rhs, .. } => {
            collect_ast_refs(lhs, in_loop, refs);
            collect_ast_refs(rhs, in_loop, refs);
        }
    }
}

fn add_path_refs(path: &PathExpr, in_loop: bool, refs: &mut TemplateRefs) {
    let bucket = if in_loop {
        &mut refs.loop_scoped
    } else {
        &mut refs.outer
    };
    if let Some(root) = path.root_ident() {
        bucket.insert(root.to_string());
    }
    for index in path.index_idents() {
        bucket.insert(index.to_string());
    }
}
