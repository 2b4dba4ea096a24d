//! Rule document model
//!
//! Rules are data: a `when` listing fact conditions, plus optional `then` /
//! `otherwise` branches carrying actions and/or a nested rule. Documents may
//! be written in JSON or YAML; entry order is preserved everywhere it is
//! visible in results and events.

use crate::error::Result;
use crate::ordered::OrderedMap;
use crate::patch::Merge;
use crate::result::MapId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single fact condition: optional call params, optional sub-value path,
/// and the schema the resolved value must satisfy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Parameters handed to the fact handler, interpolated before the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    /// Path selecting a sub-value of the fact's resolved value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Opaque schema handed to the validator
    pub is: Value,
}

/// An ordered conjunction of fact conditions: every entry must validate for
/// the map to pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactMap(pub OrderedMap<Condition>);

impl FactMap {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The disjunction of fact maps a rule evaluates
///
/// Array form identifies maps by position, named form by key. The form is
/// preserved through interpolation and into emitted events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum When {
    List(Vec<FactMap>),
    Named(OrderedMap<FactMap>),
}

impl When {
    /// Fact maps in document order, each with its id
    pub fn maps(&self) -> Vec<(MapId, &FactMap)> {
        match self {
            When::List(list) => list
                .iter()
                .enumerate()
                .map(|(index, map)| (MapId::Index(index), map))
                .collect(),
            When::Named(named) => named
                .iter()
                .map(|(name, map)| (MapId::from(name), map))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            When::List(list) => list.len(),
            When::Named(named) => named.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One action dispatch: a registered handler type plus optional params
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Accept either an action list or a single action object
fn actions_field<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Vec<ActionSpec>>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<ActionSpec>),
        One(ActionSpec),
    }

    Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(|value| match value {
        OneOrMany::Many(list) => list,
        OneOrMany::One(action) => vec![action],
    }))
}

/// Wire shape of a branch; validated into [`Branch`] on deserialization
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawBranch {
    #[serde(default, deserialize_with = "actions_field", skip_serializing_if = "Option::is_none")]
    actions: Option<Vec<ActionSpec>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    when: Option<When>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    then: Option<Box<Branch>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    otherwise: Option<Box<Branch>>,
}

/// One arm of a rule: actions to dispatch, a nested rule, or both
///
/// Malformed shapes (`then`/`otherwise` present without a `when`, or a
/// branch with neither actions nor a nested rule) are rejected when the
/// document is parsed rather than surfacing mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBranch", into = "RawBranch")]
pub struct Branch {
    pub actions: Option<Vec<ActionSpec>>,
    pub rule: Option<Rule>,
}

impl TryFrom<RawBranch> for Branch {
    type Error = String;

    fn try_from(raw: RawBranch) -> std::result::Result<Self, Self::Error> {
        let RawBranch {
            actions,
            when,
            then,
            otherwise,
        } = raw;

        let rule = match when {
            Some(when) => Some(Rule {
                when,
                then,
                otherwise,
            }),
            None if then.is_some() || otherwise.is_some() => {
                return Err("branch defines then/otherwise without a when".to_string());
            }
            None => None,
        };

        if actions.is_none() && rule.is_none() {
            return Err("branch must define actions or a nested when".to_string());
        }

        Ok(Branch { actions, rule })
    }
}

impl From<Branch> for RawBranch {
    fn from(branch: Branch) -> Self {
        let (when, then, otherwise) = match branch.rule {
            Some(rule) => (Some(rule.when), rule.then, rule.otherwise),
            None => (None, None, None),
        };
        RawBranch {
            actions: branch.actions,
            when,
            then,
            otherwise,
        }
    }
}

/// A rule: a `when` disjunction plus optional branches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub when: When,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then: Option<Box<Branch>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<Box<Branch>>,
}

/// The top-level rule registry: an array of rules identified by position or
/// a named map of rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rules {
    List(Vec<Rule>),
    Named(OrderedMap<Rule>),
}

impl Rules {
    /// Parse from an in-memory JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Parse from a JSON document
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse from a YAML document
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Rules in document order, each with its name (array positions
    /// stringify, so nested paths compose uniformly)
    pub fn iter(&self) -> Vec<(String, &Rule)> {
        match self {
            Rules::List(list) => list
                .iter()
                .enumerate()
                .map(|(index, rule)| (index.to_string(), rule))
                .collect(),
            Rules::Named(named) => named
                .iter()
                .map(|(name, rule)| (name.to_string(), rule))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Rules::List(list) => list.len(),
            Rules::Named(named) => named.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Rules {
    fn default() -> Self {
        Rules::Named(OrderedMap::new())
    }
}

impl Merge for Rules {
    /// Named registries merge per key; positional registries have no
    /// meaningful index-merge, so the incoming value replaces wholesale
    fn merge(self, next: Rules) -> Rules {
        match (self, next) {
            (Rules::Named(mut current), Rules::Named(incoming)) => {
                current.extend_from(incoming);
                Rules::Named(current)
            }
            (_, incoming) => incoming,
        }
    }
}
