//! Value path resolution
//!
//! A [`Resolver`] extracts a sub-value from a JSON value by path. The same
//! resolver serves condition `path` lookups and interpolation expressions,
//! so swapping it (say, for JSON Pointer syntax) changes both consistently.
//!
//! Lookups never fail: an unresolvable path yields `Null`. Fact checks then
//! fail validation on the missing data rather than aborting the rule.

use serde_json::Value;
use std::sync::Arc;

/// Extracts a sub-value from a resolved value
pub trait Resolver: Send + Sync {
    fn resolve(&self, value: &Value, path: &str) -> Value;
}

impl<F> Resolver for F
where
    F: Fn(&Value, &str) -> Value + Send + Sync,
{
    fn resolve(&self, value: &Value, path: &str) -> Value {
        self(value, path)
    }
}

/// Shared resolver handle
pub type SharedResolver = Arc<dyn Resolver>;

/// Default resolver handling `a.b`, `a[0]`, and `a['key']` segments
///
/// Array elements resolve through either bracket indices or bare numeric
/// segments, so `results[0].user` and `results.0.user` are equivalent.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathResolver;

impl PathResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Resolver for PathResolver {
    fn resolve(&self, value: &Value, path: &str) -> Value {
        let mut current = value;
        for segment in segments(path) {
            match lookup(current, &segment) {
                Some(next) => current = next,
                None => return Value::Null,
            }
        }
        current.clone()
    }
}

fn lookup<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(list) => segment.parse::<usize>().ok().and_then(|i| list.get(i)),
        _ => None,
    }
}

fn segments(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                let mut inner = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    inner.push(c);
                }
                out.push(inner.trim_matches(|c| c == '\'' || c == '"').to_string());
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        out.push(current);
    }
    out
}
