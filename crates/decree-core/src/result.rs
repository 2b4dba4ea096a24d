//! Evaluation result types
//!
//! Every run produces a flat tree of per-rule results keyed by dotted rule
//! path (`"rule"`, `"rule.then"`, `"rule.then.then"`). Each node records
//! whether the rule passed or errored, its per-fact-map results, and the
//! outcome of any dispatched actions.

use crate::ordered::OrderedMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Identifier of a fact map within a `when`
///
/// Positional (array form) identifiers serialize as numbers, named-map
/// identifiers as strings, matching the form the rule was written in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MapId {
    Index(usize),
    Name(String),
}

impl MapId {
    /// Key form used in results objects and interpolation lookups
    pub fn as_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapId::Index(i) => write!(f, "{}", i),
            MapId::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<usize> for MapId {
    fn from(index: usize) -> Self {
        MapId::Index(index)
    }
}

impl From<&str> for MapId {
    fn from(name: &str) -> Self {
        MapId::Name(name.to_string())
    }
}

impl From<String> for MapId {
    fn from(name: String) -> Self {
        MapId::Name(name)
    }
}

/// Outcome reported by a validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    /// Whether the subject satisfied the schema
    pub result: bool,

    /// Validator-specific diagnostics, forwarded verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
}

impl Validation {
    /// A passing validation with no diagnostics
    pub fn pass() -> Self {
        Self {
            result: true,
            errors: None,
        }
    }

    /// A failing validation with no diagnostics
    pub fn fail() -> Self {
        Self {
            result: false,
            errors: None,
        }
    }

    /// Attach diagnostics
    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }
}

/// Result of evaluating one fact against its condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactCheck {
    /// The fact resolved and the validator returned a verdict
    Evaluated {
        result: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        errors: Option<Value>,
        value: Value,
        resolved: Value,
    },

    /// The fact or the validator failed; details went to the error channel
    Failed { error: bool },
}

impl FactCheck {
    /// Error marker for a fact that could not be evaluated
    pub fn failed() -> Self {
        FactCheck::Failed { error: true }
    }

    /// Successful evaluation carrying the validator's verdict
    pub fn evaluated(validation: Validation, value: Value, resolved: Value) -> Self {
        FactCheck::Evaluated {
            result: validation.result,
            errors: validation.errors,
            value,
            resolved,
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, FactCheck::Evaluated { result: true, .. })
    }

    pub fn errored(&self) -> bool {
        matches!(self, FactCheck::Failed { .. })
    }
}

/// Aggregated result of one fact map
///
/// Serializes as the per-fact entries in evaluation order followed by the
/// `__passed` and `__error` flags, e.g.
/// `{"firstName": {...}, "__passed": true, "__error": false}`.
#[derive(Debug, Clone, PartialEq)]
pub struct FactMapResult {
    /// Per-fact results, trimmed at the first error
    pub facts: Vec<(String, FactCheck)>,

    /// True when no fact errored and every fact's result was true
    pub passed: bool,

    /// True when any fact errored
    pub error: bool,
}

impl FactMapResult {
    pub fn get(&self, fact_name: &str) -> Option<&FactCheck> {
        self.facts
            .iter()
            .find(|(name, _)| name == fact_name)
            .map(|(_, check)| check)
    }

    /// The per-fact entries alone, without the aggregate flags
    pub fn facts_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (name, check) in &self.facts {
            map.insert(
                name.clone(),
                serde_json::to_value(check).unwrap_or(Value::Null),
            );
        }
        Value::Object(map)
    }
}

impl Serialize for FactMapResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.facts.len() + 2))?;
        for (name, check) in &self.facts {
            map.serialize_entry(name, check)?;
        }
        map.serialize_entry("__passed", &self.passed)?;
        map.serialize_entry("__error", &self.error)?;
        map.end()
    }
}

/// Results for every fact map of a `when`, keyed by map id
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WhenResults {
    entries: Vec<(MapId, FactMapResult)>,
}

impl WhenResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: MapId, result: FactMapResult) {
        self.entries.push((id, result));
    }

    pub fn get(&self, id: &MapId) -> Option<&FactMapResult> {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, result)| result)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MapId, &FactMapResult)> {
        self.entries.iter().map(|(id, result)| (id, result))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when any map errored
    pub fn any_errored(&self) -> bool {
        self.entries.iter().any(|(_, result)| result.error)
    }

    /// True when at least one map fully passed
    pub fn any_passed(&self) -> bool {
        self.entries.iter().any(|(_, result)| result.passed)
    }
}

impl Serialize for WhenResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, result) in &self.entries {
            map.serialize_entry(&id.as_key(), result)?;
        }
        map.end()
    }
}

/// Outcome of one dispatched action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult {
    /// The action's registered type name
    #[serde(rename = "type")]
    pub kind: String,

    /// Interpolated parameters the handler was invoked with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    /// Handler return value, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Failure message, present when the handler failed or was missing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn succeeded(kind: String, params: Option<Value>, result: Value) -> Self {
        Self {
            kind,
            params,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(kind: String, params: Option<Value>, error: String) -> Self {
        Self {
            kind,
            params,
            result: None,
            error: Some(error),
        }
    }
}

/// Result node for a single rule-tree position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleResult {
    /// Whether at least one fact map passed (always false on error)
    pub passed: bool,

    /// Whether any fact map errored, blocking branch selection
    pub error: bool,

    /// Per-fact-map results keyed by map id
    pub results: WhenResults,

    /// Per-action outcomes, present when the taken branch dispatched actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<ActionResult>>,
}

impl RuleResult {
    /// Node for a rule whose conditions could not be evaluated
    pub fn errored(results: WhenResults) -> Self {
        Self {
            passed: false,
            error: true,
            results,
            actions: None,
        }
    }
}

/// Flat result tree of a whole run, keyed by dotted rule path
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct RunResults {
    entries: OrderedMap<RuleResult>,
}

impl RunResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rule: impl Into<String>, result: RuleResult) {
        self.entries.insert(rule, result);
    }

    /// Look up a node by dotted rule path
    pub fn get(&self, rule: &str) -> Option<&RuleResult> {
        self.entries.get(rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuleResult)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold another tree's entries into this one
    pub fn merge(&mut self, other: RunResults) {
        self.entries.extend_from(other.entries);
    }
}
