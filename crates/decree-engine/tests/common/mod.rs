//! Common test utilities for engine integration tests

#![allow(dead_code)]

use decree_engine::{Actions, Channel, Context, Rules, RulesEngine, SchemaValidator};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Shared log of recorded values
pub type Recorded = Arc<Mutex<Vec<Value>>>;

pub fn recorded() -> Recorded {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(recorded: &Recorded) -> Vec<Value> {
    recorded.lock().unwrap().clone()
}

/// An action registry with `log` and `call` handlers recording their params
pub fn recording_actions() -> (Actions, Recorded, Recorded) {
    let log = recorded();
    let call = recorded();
    let log_sink = Arc::clone(&log);
    let call_sink = Arc::clone(&call);

    let actions = Actions::new()
        .with_fn("log", move |params| {
            log_sink.lock().unwrap().push(params);
            Ok(Value::Null)
        })
        .with_fn("call", move |params| {
            call_sink.lock().unwrap().push(params);
            Ok(Value::Null)
        });
    (actions, log, call)
}

/// Engine wired with the JSON Schema validator and recording actions
pub fn engine_with_rules(rules: Value) -> (RulesEngine, Recorded, Recorded) {
    let (actions, log, call) = recording_actions();
    let engine = RulesEngine::builder(SchemaValidator::new())
        .with_rules(Rules::from_value(rules).unwrap())
        .with_actions(actions)
        .build();
    (engine, log, call)
}

/// Record every event on a channel as serialized JSON
pub fn record_channel(engine: &RulesEngine, channel: Channel) -> Recorded {
    let seen = recorded();
    let sink = Arc::clone(&seen);
    engine.on(channel, move |event| {
        sink.lock()
            .unwrap()
            .push(serde_json::to_value(event).unwrap());
    });
    seen
}

pub fn context(value: Value) -> Context {
    Context::from_value(value).unwrap()
}
