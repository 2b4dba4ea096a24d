//! Fact evaluation
//!
//! One evaluation turns a `(fact, condition)` pair into a [`FactCheck`]:
//! resolve the fact (registry handler, registry value, or context fallback),
//! apply the optional path, and hand the resolved value to the validator.
//! The condition arrives already interpolated by the rule runner; params are
//! forwarded to the handler verbatim. A failing handler or validator never
//! escapes; it becomes an error marker plus an error event.

use crate::bus::EventBus;
use crate::memo::MemoFacts;
use crate::resolve::SharedResolver;
use crate::validate::SharedValidator;
use decree_core::{Condition, Context, DebugEvent, ErrorEvent, FactCheck, MapId};
use serde_json::Value;

pub(crate) struct FactEvaluator<'a> {
    validator: &'a SharedValidator,
    resolver: &'a SharedResolver,
    facts: &'a MemoFacts,
    bus: &'a EventBus,
}

impl<'a> FactEvaluator<'a> {
    pub fn new(
        validator: &'a SharedValidator,
        resolver: &'a SharedResolver,
        facts: &'a MemoFacts,
        bus: &'a EventBus,
    ) -> Self {
        Self {
            validator,
            resolver,
            facts,
            bus,
        }
    }

    pub async fn evaluate(
        &self,
        rule: &str,
        map_id: &MapId,
        fact_name: &str,
        condition: &Condition,
        context: &Context,
    ) -> (String, FactCheck) {
        self.bus.emit(DebugEvent::StartingFact {
            rule: rule.to_string(),
            map_id: map_id.clone(),
            fact_name: fact_name.to_string(),
        });

        let params = condition.params.clone();

        let value = match self.resolve_fact(fact_name, params.clone(), context).await {
            Ok(value) => value,
            Err(error) => {
                self.bus.emit(ErrorEvent::FactExecutionError {
                    rule: rule.to_string(),
                    map_id: map_id.clone(),
                    fact_name: fact_name.to_string(),
                    params,
                    error: format!("{:#}", error),
                });
                return (fact_name.to_string(), FactCheck::failed());
            }
        };

        let resolved = match &condition.path {
            Some(path) => self.resolver.resolve(&value, path),
            None => value.clone(),
        };

        self.bus.emit(DebugEvent::ExecutedFact {
            rule: rule.to_string(),
            map_id: map_id.clone(),
            fact_name: fact_name.to_string(),
            path: condition.path.clone(),
            value: value.clone(),
            resolved: resolved.clone(),
        });

        match self
            .validator
            .validate(&resolved, &condition.is, context)
            .await
        {
            Ok(validation) => {
                self.bus.emit(DebugEvent::EvaluatedFact {
                    rule: rule.to_string(),
                    map_id: map_id.clone(),
                    fact_name: fact_name.to_string(),
                    path: condition.path.clone(),
                    value: value.clone(),
                    resolved: resolved.clone(),
                    is: condition.is.clone(),
                    result: validation.clone(),
                });
                (
                    fact_name.to_string(),
                    FactCheck::evaluated(validation, value, resolved),
                )
            }
            Err(error) => {
                self.bus.emit(ErrorEvent::FactEvaluationError {
                    rule: rule.to_string(),
                    map_id: map_id.clone(),
                    fact_name: fact_name.to_string(),
                    path: condition.path.clone(),
                    is: condition.is.clone(),
                    value,
                    resolved,
                    error: format!("{:#}", error),
                });
                (fact_name.to_string(), FactCheck::failed())
            }
        }
    }

    /// Registry sources win over context entries; a name known to neither
    /// resolves to `Null` and fails its check rather than erroring
    async fn resolve_fact(
        &self,
        fact_name: &str,
        params: Option<Value>,
        context: &Context,
    ) -> anyhow::Result<Value> {
        match self.facts.get(fact_name) {
            Some(source) => source.resolve(params, context).await,
            None => Ok(context.get(fact_name).cloned().unwrap_or(Value::Null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::Facts;
    use crate::memo::Equality;
    use crate::resolve::PathResolver;
    use crate::validate::{validator_fn, Validator};
    use decree_core::{Channel, EngineEvent, Validation};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct Harness {
        validator: SharedValidator,
        resolver: SharedResolver,
        facts: MemoFacts,
        bus: EventBus,
    }

    impl Harness {
        fn new(facts: Facts) -> Self {
            let validator: SharedValidator = Arc::new(validator_fn(|subject, schema| {
                Ok(Validation {
                    result: subject == schema.get("const").unwrap_or(&Value::Null),
                    errors: None,
                })
            }));
            let resolver: SharedResolver = Arc::new(PathResolver);
            Self {
                facts: MemoFacts::new(&facts, &Equality::Shallow),
                validator,
                resolver,
                bus: EventBus::new(),
            }
        }

        fn evaluator(&self) -> FactEvaluator<'_> {
            FactEvaluator::new(&self.validator, &self.resolver, &self.facts, &self.bus)
        }

        fn record(&self, channel: Channel) -> Arc<Mutex<Vec<Value>>> {
            let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&seen);
            self.bus.on(channel, move |event: &EngineEvent| {
                sink.lock().unwrap().push(serde_json::to_value(event).unwrap());
            });
            seen
        }
    }

    #[tokio::test]
    async fn test_context_fact_with_path() {
        let harness = Harness::new(Facts::new());
        let debug = harness.record(Channel::Debug);

        let mut context = Context::new();
        context.insert("user", json!({"firstName": "John"}));
        let condition = Condition {
            params: None,
            path: Some("firstName".to_string()),
            is: json!({"const": "John"}),
        };

        let (name, check) = harness
            .evaluator()
            .evaluate("salutation", &MapId::from("myFacts"), "user", &condition, &context)
            .await;

        assert_eq!(name, "user");
        assert!(check.passed());

        let events = debug.lock().unwrap();
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| e["type"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["STARTING_FACT", "EXECUTED_FACT", "EVALUATED_FACT"]);
        assert_eq!(events[1]["value"], json!({"firstName": "John"}));
        assert_eq!(events[1]["resolved"], json!("John"));
        assert_eq!(events[2]["result"], json!({"result": true}));
    }

    #[tokio::test]
    async fn test_handler_failure_emits_execution_error() {
        let facts = Facts::new().with_fn("myFact", |_| -> anyhow::Result<Value> {
            Err(anyhow::anyhow!("bad"))
        });
        let harness = Harness::new(facts);
        let errors = harness.record(Channel::Error);

        let condition = Condition {
            params: Some(json!({"firstName": "fred"})),
            path: None,
            is: json!({"const": "x"}),
        };

        let (_, check) = harness
            .evaluator()
            .evaluate("salutation", &MapId::Index(0), "myFact", &condition, &Context::new())
            .await;

        assert!(check.errored());
        let events = errors.lock().unwrap();
        assert_eq!(
            events[0],
            json!({
                "type": "FactExecutionError",
                "rule": "salutation",
                "mapId": 0,
                "factName": "myFact",
                "params": {"firstName": "fred"},
                "error": "bad",
            })
        );
    }

    #[tokio::test]
    async fn test_params_are_forwarded_verbatim() {
        let received: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&received);
        let facts = Facts::new().with_fn("echo", move |params| {
            *sink.lock().unwrap() = params.clone();
            Ok(params.unwrap_or(Value::Null))
        });
        let harness = Harness::new(facts);

        let mut context = Context::new();
        context.insert("tpl", json!("resolved elsewhere"));
        let condition = Condition {
            params: Some(json!({"a": "{{tpl}}"})),
            path: None,
            is: json!({"const": "x"}),
        };

        harness
            .evaluator()
            .evaluate("r", &MapId::Index(0), "echo", &condition, &context)
            .await;

        // Interpolation happened upstream in the rule runner; the evaluator
        // must not resolve placeholders a second time
        assert_eq!(*received.lock().unwrap(), Some(json!({"a": "{{tpl}}"})));
    }

    #[tokio::test]
    async fn test_validator_failure_emits_evaluation_error() {
        struct Exploding;

        #[async_trait::async_trait]
        impl Validator for Exploding {
            async fn validate(
                &self,
                _subject: &Value,
                _schema: &Value,
                _context: &Context,
            ) -> anyhow::Result<Validation> {
                Err(anyhow::anyhow!("bad"))
            }
        }

        let mut harness = Harness::new(Facts::new());
        harness.validator = Arc::new(Exploding);
        let errors = harness.record(Channel::Error);

        let mut context = Context::new();
        context.insert("user", json!({"firstName": "John"}));
        let condition = Condition {
            params: None,
            path: Some("firstName".to_string()),
            is: json!({"type": "string"}),
        };

        let (_, check) = harness
            .evaluator()
            .evaluate("salutation", &MapId::from("myFacts"), "user", &condition, &context)
            .await;

        assert!(check.errored());
        let events = errors.lock().unwrap();
        assert_eq!(
            events[0],
            json!({
                "type": "FactEvaluationError",
                "rule": "salutation",
                "mapId": "myFacts",
                "factName": "user",
                "path": "firstName",
                "is": {"type": "string"},
                "value": {"firstName": "John"},
                "resolved": "John",
                "error": "bad",
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_fact_soft_misses() {
        let harness = Harness::new(Facts::new());
        let condition = Condition {
            params: None,
            path: None,
            is: json!({"const": "x"}),
        };

        let (_, check) = harness
            .evaluator()
            .evaluate("r", &MapId::Index(0), "ghost", &condition, &Context::new())
            .await;

        assert!(!check.errored());
        assert!(!check.passed());
    }
}
