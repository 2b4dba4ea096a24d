//! Context interpolation
//!
//! Rule documents reference runtime data through placeholders, `{{expr}}`
//! by default. Before a rule's conditions or actions are used, every string
//! in them is interpolated against the current context: a string that is
//! exactly one placeholder becomes the looked-up value in its native type,
//! while placeholders embedded in larger strings are coerced to text.
//!
//! Expressions resolve through the engine's [`Resolver`], so a custom
//! resolver changes placeholder syntax and `path` lookups together.

use crate::resolve::SharedResolver;
use regex::{Captures, Regex};
use serde_json::Value;

const DEFAULT_PATTERN: &str = r"\{\{(.+?)\}\}";

/// The delimiter pattern used when none is configured
pub(crate) fn default_pattern() -> Regex {
    Regex::new(DEFAULT_PATTERN).expect("default interpolation pattern is valid")
}

/// Applies placeholder substitution to rule data
#[derive(Clone)]
pub struct Interpolator {
    pattern: Regex,
    resolver: SharedResolver,
}

impl Interpolator {
    pub fn new(pattern: Regex, resolver: SharedResolver) -> Self {
        Self { pattern, resolver }
    }

    /// Interpolate a value tree against `context`
    ///
    /// Recurses into arrays and object values; object keys and non-string
    /// primitives pass through untouched.
    pub fn value(&self, subject: &Value, context: &Value) -> Value {
        match subject {
            Value::String(text) => self.string(text, context),
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.value(item, context)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, item)| (key.clone(), self.value(item, context)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Interpolate a single string
    ///
    /// A lone placeholder spanning the whole string substitutes natively; an
    /// unresolvable expression yields `Null` rather than failing the rule.
    pub fn string(&self, text: &str, context: &Value) -> Value {
        if let Some(caps) = self.pattern.captures(text) {
            let full = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            if full == text {
                return self.resolver.resolve(context, expression(&caps));
            }
        }

        let replaced = self.pattern.replace_all(text, |caps: &Captures| {
            coerce(&self.resolver.resolve(context, expression(caps)))
        });
        Value::String(replaced.into_owned())
    }
}

/// The lookup expression of a match: the first capture group, or the whole
/// match for patterns without one
fn expression<'a>(caps: &'a Captures) -> &'a str {
    caps.get(1)
        .or_else(|| caps.get(0))
        .map(|m| m.as_str())
        .unwrap_or_default()
}

/// String form of a value embedded in a larger string
///
/// Missing data renders as empty rather than a `null` literal; composites
/// render as compact JSON.
pub(crate) fn coerce(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        composite => serde_json::to_string(composite).unwrap_or_default(),
    }
}
