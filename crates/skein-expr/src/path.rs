//! Variable paths: parsing and resolution against the variable view.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lex::{lex, Token};
use crate::vars::{VarMap, VarValue};

/// The head of a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathRoot {
    /// A named variable in scope.
    Ident(String),
    /// `_`, the current `#for` element.
    Current,
}

/// One trailing path segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathSegment {
    /// `.name` member access.
    Key(String),
    /// `[3]` literal index.
    Index(usize),
    /// `[#name]` variable index.
    IndexVar(String),
}

/// A parsed variable path such as `items[#i].name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathExpr {
    /// Path head.
    pub root: PathRoot,
    /// Trailing segments, in order.
    pub segments: Vec<PathSegment>,
}

impl PathExpr {
    /// Parses a string holding exactly one path and nothing else.
    pub fn parse(text: &str) -> Option<Self> {
        let tokens = lex(text).ok()?;
        let mut pos = 0;
        let path = parse_path(&tokens, &mut pos).ok()?;
        if pos == tokens.len() {
            Some(path)
        } else {
            None
        }
    }

    /// The root identifier, if the path starts from a named variable.
    pub fn root_ident(&self) -> Option<&str> {
        match &self.root {
            PathRoot::Ident(name) => Some(name),
            PathRoot::Current => None,
        }
    }

    /// Identifiers referenced by `[#name]` index segments.
    pub fn index_idents(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|seg| match seg {
            PathSegment::IndexVar(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Parses a path from a token stream, advancing `pos` past it.
pub(crate) fn parse_path(tokens: &[Token], pos: &mut usize) -> Result<PathExpr, String> {
    let root = match tokens.get(*pos) {
        Some(Token::Ident(name)) => {
            *pos += 1;
            if name == "_" {
                PathRoot::Current
            } else {
                PathRoot::Ident(name.clone())
            }
        }
        other => return Err(format!("expected identifier, found {other:?}")),
    };

    let mut segments = Vec::new();
    loop {
        match tokens.get(*pos) {
            Some(Token::Dot) => {
                *pos += 1;
                match tokens.get(*pos) {
                    Some(Token::Ident(name)) => {
                        segments.push(PathSegment::Key(name.clone()));
                        *pos += 1;
                    }
                    other => return Err(format!("expected member name, found {other:?}")),
                }
            }
            Some(Token::LBracket) => {
                *pos += 1;
                let segment = match tokens.get(*pos) {
                    Some(Token::Number(n)) if n.fract() == 0.0 && *n >= 0.0 => {
                        *pos += 1;
                        PathSegment::Index(*n as usize)
                    }
                    Some(Token::Hash) => {
                        *pos += 1;
                        match tokens.get(*pos) {
                            Some(Token::Ident(name)) => {
                                *pos += 1;
                                PathSegment::IndexVar(name.clone())
                            }
                            other => {
                                return Err(format!("expected index variable, found {other:?}"))
                            }
                        }
                    }
                    other => return Err(format!("expected index, found {other:?}")),
                };
                match tokens.get(*pos) {
                    Some(Token::RBracket) => *pos += 1,
                    other => return Err(format!("expected ']', found {other:?}")),
                }
                segments.push(segment);
            }
            _ => break,
        }
    }

    Ok(PathExpr { root, segments })
}

/// Evaluation scope: the outer variable view plus the stack of `#for`
/// iteration elements, innermost last.
#[derive(Debug)]
pub struct Scope<'a> {
    vars: &'a VarMap,
    frames: Vec<Value>,
}

impl<'a> Scope<'a> {
    /// Creates a scope over a variable view with no active iteration.
    pub fn new(vars: &'a VarMap) -> Self {
        Self {
            vars,
            frames: Vec::new(),
        }
    }

    pub(crate) fn push_frame(&mut self, element: Value) {
        self.frames.push(element);
    }

    pub(crate) fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Resolves a path to its raw value. Missing roots and segments resolve
    /// to `null`; the step-output wrapper is transparent at the end of the
    /// path.
    pub fn resolve(&self, path: &PathExpr) -> Value {
        let (mut current, wrapped) = match &path.root {
            PathRoot::Current => match self.frames.last() {
                Some(frame) => (frame.clone(), false),
                None => return Value::Null,
            },
            PathRoot::Ident(name) => match self.lookup_root(name) {
                Some(VarValue::Plain(v)) => (v, false),
                Some(VarValue::StepOutput(v)) => (v, true),
                None => return Value::Null,
            },
        };

        let mut segments = path.segments.iter();
        // The wrapper's own `value` member takes one segment; any other
        // first segment falls through to the inner mapping.
        if wrapped && matches!(path.segments.first(), Some(PathSegment::Key(k)) if k == "value") {
            segments.next();
        }

        for segment in segments {
            current = self.apply_segment(&current, segment);
            if current.is_null() {
                return Value::Null;
            }
        }
        current
    }

    fn apply_segment(&self, current: &Value, segment: &PathSegment) -> Value {
        match segment {
            PathSegment::Key(key) => match current {
                Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            },
            PathSegment::Index(i) => match current {
                Value::Array(items) => items.get(*i).cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            },
            PathSegment::IndexVar(name) => {
                let index = self
                    .lookup_root(name)
                    .map(VarValue::into_raw)
                    .unwrap_or(Value::Null);
                match (current, &index) {
                    (Value::Array(items), Value::Number(n)) => n
                        .as_u64()
                        .and_then(|i| items.get(i as usize))
                        .cloned()
                        .unwrap_or(Value::Null),
                    (Value::Object(map), Value::String(key)) => {
                        map.get(key).cloned().unwrap_or(Value::Null)
                    }
                    _ => Value::Null,
                }
            }
        }
    }

    /// Looks a root identifier up: iteration elements shadow the outer view
    /// when the element is a mapping carrying that key.
    fn lookup_root(&self, name: &str) -> Option<VarValue> {
        for frame in self.frames.iter().rev() {
            if let Value::Object(map) = frame {
                if let Some(v) = map.get(name) {
                    return Some(VarValue::Plain(v.clone()));
                }
            }
        }
        self.vars.get(name).cloned()
    }
}

/// Resolves a dotted path against a variable view with no iteration scope.
///
/// Used for output assembly and anywhere a path arrives as text. Returns
/// `null` when the text is not a well-formed path or nothing is bound.
pub fn lookup_path(text: &str, vars: &VarMap) -> Value {
    match PathExpr::parse(text) {
        Some(path) => Scope::new(vars).resolve(&path),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, VarValue)]) -> VarMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn parse_rejects_trailing_tokens() {
        assert!(PathExpr::parse("a.b").is_some());
        assert!(PathExpr::parse("a + b").is_none());
        assert!(PathExpr::parse("\"literal\"").is_none());
    }

    #[test]
    fn resolve_nested_members_and_indexes() {
        let view = vars(&[(
            "order",
            VarValue::Plain(json!({"lines": [{"sku": "A-1"}, {"sku": "B-2"}]})),
        )]);
        let scope = Scope::new(&view);

        let path = PathExpr::parse("order.lines[1].sku").unwrap();
        assert_eq!(scope.resolve(&path), json!("B-2"));
    }

    #[test]
    fn resolve_variable_index() {
        let view = vars(&[
            ("items", VarValue::Plain(json!(["a", "b", "c"]))),
            ("i", VarValue::Plain(json!(2))),
        ]);
        let scope = Scope::new(&view);

        let path = PathExpr::parse("items[#i]").unwrap();
        assert_eq!(scope.resolve(&path), json!("c"));
    }

    #[test]
    fn missing_segments_resolve_to_null() {
        let view = vars(&[("a", VarValue::Plain(json!({"b": 1})))]);
        let scope = Scope::new(&view);

        assert_eq!(scope.resolve(&PathExpr::parse("a.zzz").unwrap()), json!(null));
        assert_eq!(scope.resolve(&PathExpr::parse("nope").unwrap()), json!(null));
    }

    #[test]
    fn step_output_wrapper_exposes_value_member() {
        let view = vars(&[("greet", VarValue::StepOutput(json!("Hello, Ada!")))]);
        let scope = Scope::new(&view);

        assert_eq!(
            scope.resolve(&PathExpr::parse("greet").unwrap()),
            json!("Hello, Ada!")
        );
        assert_eq!(
            scope.resolve(&PathExpr::parse("greet.value").unwrap()),
            json!("Hello, Ada!")
        );
    }

    #[test]
    fn step_output_wrapper_falls_through_to_mapping_keys() {
        let view = vars(&[(
            "confirm",
            VarValue::StepOutput(json!({"approved": true, "value": "shadowed"})),
        )]);
        let scope = Scope::new(&view);

        assert_eq!(
            scope.resolve(&PathExpr::parse("confirm.approved").unwrap()),
            json!(true)
        );
        // The wrapper's own member wins over a same-named mapping key.
        assert_eq!(
            scope.resolve(&PathExpr::parse("confirm.value").unwrap()),
            json!({"approved": true, "value": "shadowed"})
        );
    }

    #[test]
    fn lookup_path_is_null_on_garbage() {
        let view = vars(&[]);
        assert_eq!(lookup_path("a ++ b", &view), json!(null));
    }
}
