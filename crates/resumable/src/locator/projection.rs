//! Captured-variable projections evaluated at invocation time
//!
//! A projection such as `value=$.target.value` says "when this behavior is
//! invoked, read `target.value` off the first argument and pass it in as
//! `value`". Paths are parsed with the locator and evaluated lazily.

use std::fmt;

use crate::error::ProjectionError;
use crate::value::{InvocationContext, Reactive, Value};

/// One step of a projection path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProjectionStep {
    /// `$`: the invocation's implicit first argument
    ImplicitArg,
    /// `.name`: field or string-keyed entry
    Member(String),
    /// `.0`: sequence element
    Index(usize),
}

impl fmt::Display for ProjectionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionStep::ImplicitArg => write!(f, "$"),
            ProjectionStep::Member(name) => write!(f, "{}", name),
            ProjectionStep::Index(i) => write!(f, "{}", i),
        }
    }
}

/// A parsed projection path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectionPath {
    steps: Vec<ProjectionStep>,
}

impl ProjectionPath {
    /// Parse a dotted path such as `$.target.value` or `items.0`.
    pub fn parse(path: &str) -> Result<Self, String> {
        if path.is_empty() {
            return Err("empty projection path".to_string());
        }
        let mut steps = Vec::new();
        for (i, segment) in path.split('.').enumerate() {
            let step = if segment == "$" {
                if i != 0 {
                    return Err(format!("`$` may only start a path, found in `{}`", path));
                }
                ProjectionStep::ImplicitArg
            } else if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                let index = segment
                    .parse()
                    .map_err(|_| format!("index `{}` out of range", segment))?;
                ProjectionStep::Index(index)
            } else if is_identifier(segment) {
                ProjectionStep::Member(segment.to_string())
            } else {
                return Err(format!("invalid projection segment `{}` in `{}`", segment, path));
            };
            steps.push(step);
        }
        Ok(Self { steps })
    }

    /// The path's steps in order
    pub fn steps(&self) -> &[ProjectionStep] {
        &self.steps
    }

    /// Evaluate against an invocation context.
    ///
    /// Paths starting with `$` begin at the first call argument; all others
    /// begin at the context's scope value.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::Unresolved` naming the first step that
    /// found nothing.
    pub fn evaluate(&self, ctx: &InvocationContext) -> Result<Value, ProjectionError> {
        let mut current = ctx.scope.clone();
        for step in &self.steps {
            let next = match step {
                ProjectionStep::ImplicitArg => ctx.args.first().cloned(),
                ProjectionStep::Member(name) => member(&current, name),
                ProjectionStep::Index(i) => index(&current, *i),
            };
            current = next.ok_or_else(|| ProjectionError::Unresolved {
                path: self.to_string(),
                step: step.to_string(),
            })?;
        }
        Ok(current)
    }
}

impl fmt::Display for ProjectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

/// A named projection: `key=path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Projection {
    /// Name the projected value is passed under
    pub key: String,
    /// Where to read it from
    pub path: ProjectionPath,
}

impl Projection {
    /// Parse `key=path`.
    pub fn parse(pair: &str) -> Result<Self, String> {
        let (key, path) = pair
            .split_once('=')
            .ok_or_else(|| format!("projection `{}` is missing `=`", pair))?;
        if !is_identifier(key) {
            return Err(format!("invalid projection key `{}`", key));
        }
        Ok(Self {
            key: key.to_string(),
            path: ProjectionPath::parse(path)?,
        })
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.path)
    }
}

/// Parse a `key=path&key=path` query section.
pub(crate) fn parse_query(query: &str) -> Result<Vec<Projection>, String> {
    let mut projections: Vec<Projection> = Vec::new();
    for pair in query.split('&') {
        let projection = Projection::parse(pair)?;
        if projections.iter().any(|p| p.key == projection.key) {
            return Err(format!("duplicate projection key `{}`", projection.key));
        }
        projections.push(projection);
    }
    Ok(projections)
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn member(value: &Value, name: &str) -> Option<Value> {
    match value {
        Value::Object(obj) => obj.read().get(name).cloned(),
        Value::Map(map) => map.read().get(&Value::string(name)).cloned(),
        Value::Reactive(r) => member(&r.unwrap(), name),
        _ => None,
    }
}

fn index(value: &Value, i: usize) -> Option<Value> {
    match value {
        Value::Array(items) => items.read().get(i).cloned(),
        Value::Object(obj) => obj.read().get(&i.to_string()).cloned(),
        Value::Map(map) => map.read().get(&Value::Int(i as i64)).cloned(),
        Value::Reactive(r) => index(&r.unwrap(), i),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectValue;

    fn event(value: &str) -> Value {
        Value::object(ObjectValue::new().with_field(
            "target",
            Value::object(ObjectValue::new().with_field("value", Value::string(value))),
        ))
    }

    #[test]
    fn test_parse_steps() {
        let path = ProjectionPath::parse("$.target.items.2").unwrap();
        assert_eq!(
            path.steps(),
            &[
                ProjectionStep::ImplicitArg,
                ProjectionStep::Member("target".into()),
                ProjectionStep::Member("items".into()),
                ProjectionStep::Index(2),
            ]
        );
        assert_eq!(path.to_string(), "$.target.items.2");
    }

    #[test]
    fn test_parse_rejects_misplaced_escape() {
        assert!(ProjectionPath::parse("target.$").is_err());
        assert!(ProjectionPath::parse("a..b").is_err());
        assert!(ProjectionPath::parse("").is_err());
    }

    #[test]
    fn test_evaluate_against_implicit_argument() {
        let path = ProjectionPath::parse("$.target.value").unwrap();
        let ctx = InvocationContext::new().with_args(vec![event("hello")]);
        assert_eq!(path.evaluate(&ctx).unwrap(), Value::string("hello"));
    }

    #[test]
    fn test_evaluate_against_scope() {
        let path = ProjectionPath::parse("items.1").unwrap();
        let scope = Value::object(ObjectValue::new().with_field(
            "items",
            Value::array(vec![Value::Int(10), Value::Int(20)]),
        ));
        let ctx = InvocationContext::new().with_scope(scope);
        assert_eq!(path.evaluate(&ctx).unwrap(), Value::Int(20));
    }

    #[test]
    fn test_missing_path_is_unresolved() {
        let path = ProjectionPath::parse("$.target.checked").unwrap();
        let ctx = InvocationContext::new().with_args(vec![event("x")]);
        assert_eq!(
            path.evaluate(&ctx),
            Err(ProjectionError::Unresolved {
                path: "$.target.checked".into(),
                step: "checked".into(),
            })
        );

        let no_args = InvocationContext::new();
        assert!(ProjectionPath::parse("$").unwrap().evaluate(&no_args).is_err());
    }

    #[test]
    fn test_query_rejects_duplicate_keys() {
        assert!(parse_query("a=$&a=x").is_err());
        assert_eq!(parse_query("a=$&b=x.y").unwrap().len(), 2);
    }
}
