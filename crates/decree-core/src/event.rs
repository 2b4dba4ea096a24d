//! Engine event model
//!
//! Everything observable about a run flows through four channels: `start`
//! and `complete` bracket the run, `debug` traces rule and fact progress,
//! and `error` carries the failure taxonomy. Payloads serialize with a
//! `type` tag so subscribers can dispatch on the wire shape alone.

use crate::context::Context;
use crate::result::{MapId, RuleResult, RunResults, Validation};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// The channels a subscriber can attach to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Start,
    Complete,
    Debug,
    Error,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Start => "start",
            Channel::Complete => "complete",
            Channel::Debug => "debug",
            Channel::Error => "error",
        };
        f.write_str(name)
    }
}

/// Progress tracing for rules, fact maps, and individual facts
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum DebugEvent {
    StartingRule {
        rule: String,
        /// The rule's `when` after interpolation, in its original form
        interpolated: Value,
        context: Context,
    },
    StartingFactMap {
        rule: String,
        map_id: MapId,
        fact_map: Value,
    },
    StartingFact {
        rule: String,
        map_id: MapId,
        fact_name: String,
    },
    ExecutedFact {
        rule: String,
        map_id: MapId,
        fact_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        value: Value,
        resolved: Value,
    },
    EvaluatedFact {
        rule: String,
        map_id: MapId,
        fact_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        value: Value,
        resolved: Value,
        is: Value,
        result: Validation,
    },
    FinishedFactMap {
        rule: String,
        map_id: MapId,
        /// Per-fact outcomes without the `__passed` / `__error` markers
        results: Value,
        passed: bool,
        error: bool,
    },
    FinishedRule {
        rule: String,
        interpolated: Value,
        context: Context,
        result: RuleResult,
    },
}

/// The failure taxonomy
///
/// Fact errors block their rule's branch selection; action errors mark only
/// their own slot; `RuleExecutionError` is the catch-all that keeps one
/// malformed rule from aborting the run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ErrorEvent {
    FactExecutionError {
        rule: String,
        map_id: MapId,
        fact_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
        error: String,
    },
    FactEvaluationError {
        rule: String,
        map_id: MapId,
        fact_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        is: Value,
        value: Value,
        resolved: Value,
        error: String,
    },
    ActionExecutionError {
        rule: String,
        action: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
        error: String,
    },
    RuleExecutionError {
        rule: String,
        error: String,
    },
}

/// Emitted once per run before any rule starts
#[derive(Debug, Clone, Serialize)]
pub struct RunStart {
    pub run: String,
    pub context: Context,
    pub facts: Vec<String>,
    pub actions: Vec<String>,
    pub rules: Value,
}

/// Emitted once per run after every rule has settled
#[derive(Debug, Clone, Serialize)]
pub struct RunComplete {
    pub run: String,
    pub context: Context,
    pub results: RunResults,
}

/// Any event the engine emits, routed by [`EngineEvent::channel`]
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EngineEvent {
    Start(RunStart),
    Complete(RunComplete),
    Debug(DebugEvent),
    Error(ErrorEvent),
}

impl EngineEvent {
    pub fn channel(&self) -> Channel {
        match self {
            EngineEvent::Start(_) => Channel::Start,
            EngineEvent::Complete(_) => Channel::Complete,
            EngineEvent::Debug(_) => Channel::Debug,
            EngineEvent::Error(_) => Channel::Error,
        }
    }

    pub fn as_debug(&self) -> Option<&DebugEvent> {
        match self {
            EngineEvent::Debug(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorEvent> {
        match self {
            EngineEvent::Error(event) => Some(event),
            _ => None,
        }
    }
}

impl From<DebugEvent> for EngineEvent {
    fn from(event: DebugEvent) -> Self {
        EngineEvent::Debug(event)
    }
}

impl From<ErrorEvent> for EngineEvent {
    fn from(event: ErrorEvent) -> Self {
        EngineEvent::Error(event)
    }
}

impl From<RunStart> for EngineEvent {
    fn from(event: RunStart) -> Self {
        EngineEvent::Start(event)
    }
}

impl From<RunComplete> for EngineEvent {
    fn from(event: RunComplete) -> Self {
        EngineEvent::Complete(event)
    }
}
