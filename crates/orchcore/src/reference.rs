//! Reference expressions
//!
//! Step inputs and workflow outputs may name values produced elsewhere in a
//! run:
//!
//! - `$context.<path>` reads from the initial context of the run
//! - `$steps.<stepId>.output.<path>` reads from a completed step's output
//!
//! Expressions are parsed once, when the workflow is registered, into a
//! [`Reference`] so that resolution is a plain walk over [`PathSegment`]s.

use crate::{PathSegment, ReferenceParseError, Value};
use std::fmt;
use std::str::FromStr;

const CONTEXT_ROOT: &str = "$context";
const STEPS_ROOT: &str = "$steps";
const OUTPUT_KEYWORD: &str = "output";

/// Where a reference starts reading from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceRoot {
    Context,
    Step(String),
}

/// A parsed reference expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    root: ReferenceRoot,
    path: Vec<PathSegment>,
    expression: String,
}

impl Reference {
    /// Returns true when `raw` is written in reference syntax.
    ///
    /// Only strings rooted at `$context` or `$steps` are expressions; other
    /// strings, including ones that merely start with `$`, are literals.
    pub fn is_expression(raw: &str) -> bool {
        [CONTEXT_ROOT, STEPS_ROOT].iter().any(|root| {
            raw.strip_prefix(root)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
        })
    }

    pub fn parse(raw: &str) -> Result<Self, ReferenceParseError> {
        let mut segments = raw.split('.');
        let root = segments.next().unwrap_or_default();
        let rest: Vec<&str> = segments.collect();

        if rest.iter().any(|s| s.is_empty()) {
            return Err(ReferenceParseError::new(raw, "empty path segment"));
        }

        let (root, path) = match root {
            CONTEXT_ROOT => (ReferenceRoot::Context, &rest[..]),
            STEPS_ROOT => {
                let Some((step_id, after)) = rest.split_first() else {
                    return Err(ReferenceParseError::new(raw, "missing step id"));
                };
                match after.split_first() {
                    Some((keyword, path)) if *keyword == OUTPUT_KEYWORD => {
                        (ReferenceRoot::Step(step_id.to_string()), path)
                    }
                    _ => {
                        return Err(ReferenceParseError::new(
                            raw,
                            format!("expected `{}` after step id", OUTPUT_KEYWORD),
                        ))
                    }
                }
            }
            other => {
                return Err(ReferenceParseError::new(
                    raw,
                    format!("unknown root '{}', expected $context or $steps", other),
                ))
            }
        };

        Ok(Self {
            root,
            path: path.iter().map(|s| PathSegment::parse(s)).collect(),
            expression: raw.to_string(),
        })
    }

    pub fn root(&self) -> &ReferenceRoot {
        &self.root
    }

    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    /// The step this reference reads from, if any.
    pub fn step_id(&self) -> Option<&str> {
        match &self.root {
            ReferenceRoot::Step(id) => Some(id),
            ReferenceRoot::Context => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.expression
    }
}

impl FromStr for Reference {
    type Err = ReferenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reference::parse(s)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// A step input after parsing: either a literal or a reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Literal(Value),
    Reference(Reference),
}

impl Binding {
    pub fn from_value(value: &Value) -> Result<Self, ReferenceParseError> {
        match value {
            Value::String(raw) if Reference::is_expression(raw) => Reference::parse(raw)
                .map(Binding::Reference)
                .map_err(|e| {
                    tracing::debug!("Rejected reference {}: {}", raw, e.reason);
                    e
                }),
            other => Ok(Binding::Literal(other.clone())),
        }
    }

    pub fn reference(&self) -> Option<&Reference> {
        match self {
            Binding::Reference(reference) => Some(reference),
            Binding::Literal(_) => None,
        }
    }
}
