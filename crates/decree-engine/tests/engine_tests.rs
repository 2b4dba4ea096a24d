//! Integration tests for rule execution
//!
//! Covers branch selection, fact map combination, nested rules, pluggable
//! resolution and interpolation, and registry patching.

mod common;

use common::{context, engine_with_rules, entries, recording_actions};
use decree_engine::{
    async_fact_fn, Actions, Context, Equality, Facts, Patch, Rules, RulesEngine, SchemaValidator,
};
use futures::FutureExt;
use serde_json::{json, Value};

fn salutation_rules() -> Value {
    json!({
        "salutation": {
            "when": [
                {"firstName": {"is": {"type": "string", "pattern": "^J"}}}
            ],
            "then": {
                "actions": [{"type": "log", "params": {"message": "Hi friend!"}}]
            },
            "otherwise": {
                "actions": [{"type": "call", "params": {"message": "Who are you?"}}]
            }
        }
    })
}

// ============================================================================
// Branch selection
// ============================================================================

#[tokio::test]
async fn test_executes_a_rule() {
    let (engine, log, call) = engine_with_rules(salutation_rules());

    engine.run(context(json!({"firstName": "John"}))).await;
    assert_eq!(entries(&log), vec![json!({"message": "Hi friend!"})]);
    assert!(entries(&call).is_empty());

    engine.run(context(json!({"firstName": "Bill"}))).await;
    assert_eq!(entries(&log).len(), 1);
    assert_eq!(entries(&call), vec![json!({"message": "Who are you?"})]);
}

#[tokio::test]
async fn test_result_tree_shape() {
    let (engine, _log, _call) = engine_with_rules(salutation_rules());

    let results = engine.run(context(json!({"firstName": "John"}))).await;
    assert_eq!(
        serde_json::to_value(&results).unwrap(),
        json!({
            "salutation": {
                "passed": true,
                "error": false,
                "results": {
                    "0": {
                        "firstName": {"result": true, "value": "John", "resolved": "John"},
                        "__passed": true,
                        "__error": false,
                    }
                },
                "actions": [
                    {"type": "log", "params": {"message": "Hi friend!"}, "result": null}
                ],
            }
        })
    );
}

#[tokio::test]
async fn test_named_fact_map() {
    let (engine, log, _call) = engine_with_rules(json!({
        "salutation": {
            "when": {
                "myFacts": {
                    "firstName": {"is": {"type": "string", "pattern": "^J"}}
                }
            },
            "then": {
                "actions": [{"type": "log", "params": {"message": "Hi friend!"}}]
            }
        }
    }));

    let results = engine.run(context(json!({"firstName": "John"}))).await;
    assert_eq!(entries(&log).len(), 1);

    let node = results.get("salutation").unwrap();
    assert!(node.passed);
    let map = node.results.get(&"myFacts".into()).unwrap();
    assert!(map.passed);
}

#[tokio::test]
async fn test_fact_maps_combine_as_disjunction() {
    let rules = json!({
        "eligibility": {
            "when": [
                {"age": {"is": {"type": "integer", "minimum": 65}}},
                {"status": {"is": {"const": "veteran"}}}
            ],
            "then": {"actions": [{"type": "log", "params": {"message": "eligible"}}]},
            "otherwise": {"actions": [{"type": "call", "params": {"message": "not eligible"}}]}
        }
    });

    let (engine, log, _call) = engine_with_rules(rules.clone());
    engine
        .run(context(json!({"age": 30, "status": "veteran"})))
        .await;
    assert_eq!(entries(&log).len(), 1);

    let (engine, _log, call) = engine_with_rules(rules);
    engine
        .run(context(json!({"age": 30, "status": "civilian"})))
        .await;
    assert_eq!(entries(&call).len(), 1);
}

#[tokio::test]
async fn test_conditions_within_a_map_are_conjoined() {
    let (engine, log, call) = engine_with_rules(json!({
        "fullName": {
            "when": [{
                "firstName": {"is": {"type": "string", "pattern": "^J"}},
                "lastName": {"is": {"type": "string", "pattern": "^S"}}
            }],
            "then": {"actions": [{"type": "log", "params": {"message": "both"}}]},
            "otherwise": {"actions": [{"type": "call", "params": {"message": "partial"}}]}
        }
    }));

    engine
        .run(context(json!({"firstName": "John", "lastName": "Brown"})))
        .await;
    assert!(entries(&log).is_empty());
    assert_eq!(entries(&call).len(), 1);
}

#[tokio::test]
async fn test_empty_when_takes_otherwise() {
    let (engine, log, call) = engine_with_rules(json!({
        "fallthrough": {
            "when": [],
            "then": {"actions": [{"type": "log", "params": {"message": "then"}}]},
            "otherwise": {"actions": [{"type": "call", "params": {"message": "otherwise"}}]}
        }
    }));

    engine.run(Context::new()).await;
    assert!(entries(&log).is_empty());
    assert_eq!(entries(&call), vec![json!({"message": "otherwise"})]);
}

// ============================================================================
// Nested rules
// ============================================================================

#[tokio::test]
async fn test_nested_rules() {
    let rules = json!({
        "salutation": {
            "when": [
                {"firstName": {"is": {"type": "string", "pattern": "^A"}}}
            ],
            "then": {
                "when": [
                    {"lastName": {"is": {"type": "string", "pattern": "^J"}}}
                ],
                "then": {
                    "actions": [{"type": "log", "params": {"message": "You have the same initials as me!"}}]
                },
                "otherwise": {
                    "actions": [{"type": "log", "params": {"message": "Hi"}}]
                }
            }
        }
    });

    let (engine, log, _call) = engine_with_rules(rules.clone());
    let results = engine.run(context(json!({"firstName": "Andrew"}))).await;
    assert_eq!(entries(&log), vec![json!({"message": "Hi"})]);

    let keys: Vec<&str> = results.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["salutation", "salutation.then"]);
    assert!(results.get("salutation").unwrap().passed);
    assert!(!results.get("salutation.then").unwrap().passed);

    let (engine, log, _call) = engine_with_rules(rules);
    engine
        .run(context(json!({"firstName": "Andrew", "lastName": "Jackson"})))
        .await;
    assert_eq!(
        entries(&log),
        vec![json!({"message": "You have the same initials as me!"})]
    );
}

#[tokio::test]
async fn test_nested_branch_can_carry_actions_too() {
    let (engine, log, _call) = engine_with_rules(json!({
        "audit": {
            "when": [{"kind": {"is": {"const": "order"}}}],
            "then": {
                "actions": [{"type": "log", "params": {"message": "outer"}}],
                "when": [{"total": {"is": {"type": "number", "minimum": 100}}}],
                "then": {
                    "actions": [{"type": "log", "params": {"message": "inner"}}]
                }
            }
        }
    }));

    let results = engine
        .run(context(json!({"kind": "order", "total": 250})))
        .await;

    let mut messages = entries(&log);
    messages.sort_by_key(|m| m["message"].as_str().unwrap_or_default().to_string());
    assert_eq!(
        messages,
        vec![json!({"message": "inner"}), json!({"message": "outer"})]
    );
    assert!(results.get("audit.then").unwrap().passed);
}

// ============================================================================
// Paths and resolvers
// ============================================================================

#[tokio::test]
async fn test_condition_path_selects_sub_value() {
    let (engine, log, _call) = engine_with_rules(json!({
        "salutation": {
            "when": [
                {"user": {"path": "firstName", "is": {"type": "string", "pattern": "^J"}}}
            ],
            "then": {"actions": [{"type": "log", "params": {"message": "Hi friend!"}}]}
        }
    }));

    engine
        .run(context(json!({"user": {"firstName": "John"}})))
        .await;
    assert_eq!(entries(&log).len(), 1);

    engine
        .run(context(json!({"user": {"firstName": "Bill"}})))
        .await;
    assert_eq!(entries(&log).len(), 1);
}

fn pointer_resolver(value: &Value, path: &str) -> Value {
    let mut current = value;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(list) => segment.parse::<usize>().ok().and_then(|i| list.get(i)),
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

#[tokio::test]
async fn test_custom_resolver() {
    let (actions, log, _call) = recording_actions();
    let engine = RulesEngine::builder(SchemaValidator::new())
        .with_resolver(pointer_resolver)
        .with_actions(actions)
        .with_rules(
            Rules::from_value(json!({
                "salutation": {
                    "when": {
                        "myFacts": {
                            "user": {"path": "/firstName", "is": {"type": "string", "pattern": "^J"}}
                        }
                    },
                    "then": {"actions": [{"type": "log", "params": {"message": "Hi friend!"}}]}
                }
            }))
            .unwrap(),
        )
        .build();

    engine
        .run(context(json!({"user": {"firstName": "John"}})))
        .await;
    assert_eq!(entries(&log), vec![json!({"message": "Hi friend!"})]);
}

// ============================================================================
// Facts
// ============================================================================

#[tokio::test]
async fn test_async_fact() {
    let (actions, log, _call) = recording_actions();
    let facts = Facts::new().with_handler(
        "lookupUser",
        async_fact_fn(|_params, _context| {
            async move { Ok(json!({"firstName": "John"})) }.boxed()
        }),
    );

    let engine = RulesEngine::builder(SchemaValidator::new())
        .with_facts(facts)
        .with_actions(actions)
        .with_rules(
            Rules::from_value(json!({
                "salutation": {
                    "when": [{
                        "lookupUser": {
                            "is": {
                                "type": "object",
                                "properties": {"firstName": {"type": "string", "pattern": "^J"}}
                            }
                        }
                    }],
                    "then": {"actions": [{"type": "log", "params": {"message": "Hi friend!"}}]}
                }
            }))
            .unwrap(),
        )
        .build();

    engine.run(Context::new()).await;
    assert_eq!(entries(&log), vec![json!({"message": "Hi friend!"})]);
}

#[tokio::test]
async fn test_fact_params_interpolate_from_context() {
    let (actions, log, _call) = recording_actions();
    let facts = Facts::new().with_fn("greetingFor", |params| {
        let name = params
            .as_ref()
            .and_then(|p| p.get("user"))
            .and_then(|u| u.get("firstName"))
            .and_then(Value::as_str)
            .unwrap_or("stranger");
        Ok(json!(format!("Hello {}", name)))
    });

    let engine = RulesEngine::builder(SchemaValidator::new())
        .with_facts(facts)
        .with_actions(actions)
        .with_rules(
            Rules::from_value(json!({
                "greet": {
                    "when": [{
                        "greetingFor": {
                            "params": {"user": "{{user}}"},
                            "is": {"const": "Hello Ada"}
                        }
                    }],
                    "then": {"actions": [{"type": "log", "params": {"message": "matched"}}]}
                }
            }))
            .unwrap(),
        )
        .build();

    engine
        .run(context(json!({"user": {"firstName": "Ada"}})))
        .await;
    assert_eq!(entries(&log).len(), 1);
}

#[tokio::test]
async fn test_fact_params_interpolate_in_a_single_pass() {
    let received = common::recorded();
    let sink = std::sync::Arc::clone(&received);
    let facts = Facts::new().with_fn("echo", move |params| {
        sink.lock().unwrap().push(params.clone().unwrap_or(Value::Null));
        Ok(params.unwrap_or(Value::Null))
    });

    let (actions, _log, _call) = recording_actions();
    let engine = RulesEngine::builder(SchemaValidator::new())
        .with_facts(facts)
        .with_actions(actions)
        .with_rules(
            Rules::from_value(json!({
                "check": {
                    "when": [{
                        "echo": {
                            "params": {"a": "{{tpl}}"},
                            "is": {"type": "object"}
                        }
                    }]
                }
            }))
            .unwrap(),
        )
        .build();

    // A context value that itself looks like a placeholder stays literal:
    // one interpolation pass resolves `tpl`, never its contents
    engine
        .run(context(json!({"tpl": "{{secret}}", "secret": "x"})))
        .await;

    assert_eq!(entries(&received), vec![json!({"a": "{{secret}}"})]);
}

// ============================================================================
// Interpolation of results into actions
// ============================================================================

#[tokio::test]
async fn test_interpolates_results() {
    let (engine, log, _call) = engine_with_rules(json!({
        "salutation": {
            "when": [
                {"user": {"path": "firstName", "is": {"type": "string", "pattern": "^F"}}}
            ],
            "then": {
                "actions": [{
                    "type": "log",
                    "params": {
                        "value": "{{results[0].user.value}}",
                        "resolved": "{{results[0].user.resolved}}",
                        "message": "Hi {{results[0].user.resolved}}!"
                    }
                }]
            }
        }
    }));

    let user = json!({"firstName": "Freddie", "lastName": "Mercury"});
    engine.run(context(json!({"user": user.clone()}))).await;

    assert_eq!(
        entries(&log),
        vec![json!({
            "value": user,
            "resolved": "Freddie",
            "message": "Hi Freddie!",
        })]
    );
}

#[tokio::test]
async fn test_interpolates_results_with_named_fact_map() {
    let (engine, log, _call) = engine_with_rules(json!({
        "salutation": {
            "when": {
                "checkName": {
                    "user": {"path": "firstName", "is": {"type": "string", "pattern": "^F"}}
                }
            },
            "then": {
                "actions": [{
                    "type": "log",
                    "params": {
                        "value": "{{results.checkName.user.value}}",
                        "resolved": "{{results.checkName.user.resolved}}",
                        "message": "Hi {{results.checkName.user.resolved}}!"
                    }
                }]
            }
        }
    }));

    let user = json!({"firstName": "Freddie", "lastName": "Mercury"});
    engine.run(context(json!({"user": user.clone()}))).await;

    assert_eq!(
        entries(&log),
        vec![json!({
            "value": user,
            "resolved": "Freddie",
            "message": "Hi Freddie!",
        })]
    );
}

#[tokio::test]
async fn test_custom_interpolation_pattern() {
    let (actions, log, _call) = recording_actions();
    let engine = RulesEngine::builder(SchemaValidator::new())
        .with_pattern_str(r"\$(.+?)\$")
        .unwrap()
        .with_actions(actions)
        .with_rules(
            Rules::from_value(json!({
                "salutation": {
                    "when": [
                        {"user": {"path": "firstName", "is": {"type": "string", "pattern": "^F"}}}
                    ],
                    "then": {
                        "actions": [{
                            "type": "log",
                            "params": {"message": "Hi $results[0].user.resolved$!"}
                        }]
                    }
                }
            }))
            .unwrap(),
        )
        .build();

    engine
        .run(context(json!({"user": {"firstName": "Freddie"}})))
        .await;
    assert_eq!(entries(&log), vec![json!({"message": "Hi Freddie!"})]);
}

#[tokio::test]
async fn test_interpolates_with_custom_resolver() {
    let (actions, log, _call) = recording_actions();
    let engine = RulesEngine::builder(SchemaValidator::new())
        .with_resolver(pointer_resolver)
        .with_actions(actions)
        .with_rules(
            Rules::from_value(json!({
                "salutation": {
                    "when": [
                        {"user": {"path": "/firstName", "is": {"type": "string", "pattern": "^F"}}}
                    ],
                    "then": {
                        "actions": [{
                            "type": "log",
                            "params": {"message": "Hi {{/results/0/user/resolved}}!"}
                        }]
                    }
                }
            }))
            .unwrap(),
        )
        .build();

    engine
        .run(context(json!({"user": {"firstName": "Freddie"}})))
        .await;
    assert_eq!(entries(&log), vec![json!({"message": "Hi Freddie!"})]);
}

// ============================================================================
// Error blocking
// ============================================================================

#[tokio::test]
async fn test_map_error_blocks_branch_selection() {
    let (actions, _log, call) = recording_actions();
    let facts = Facts::new().with_fn("myFact", |_| -> anyhow::Result<Value> {
        Err(anyhow::anyhow!("bad"))
    });

    let engine = RulesEngine::builder(SchemaValidator::new())
        .with_facts(facts)
        .with_actions(actions)
        .with_rules(
            Rules::from_value(json!({
                "salutation": {
                    "when": [
                        {"myFact": {"is": {"type": "string"}}},
                        {"fromContext": {"path": "firstName", "is": {"const": "fred"}}}
                    ],
                    "then": {"actions": [{"type": "call", "params": {"message": "called then"}}]},
                    "otherwise": {"actions": [{"type": "call", "params": {"message": "called otherwise"}}]}
                }
            }))
            .unwrap(),
        )
        .build();

    let results = engine
        .run(context(json!({"fromContext": {"firstName": "fred"}})))
        .await;

    assert!(entries(&call).is_empty());
    let node = results.get("salutation").unwrap();
    assert!(node.error);
    assert!(!node.passed);
    assert!(node.actions.is_none());

    let tree = serde_json::to_value(&results).unwrap();
    assert_eq!(tree["salutation"]["results"]["0"]["myFact"], json!({"error": true}));
    assert_eq!(tree["salutation"]["results"]["1"]["__passed"], json!(true));
}

#[tokio::test]
async fn test_sibling_rules_survive_a_failing_rule() {
    let (actions, log, _call) = recording_actions();
    let facts = Facts::new().with_fn("broken", |_| -> anyhow::Result<Value> {
        Err(anyhow::anyhow!("down"))
    });

    let engine = RulesEngine::builder(SchemaValidator::new())
        .with_facts(facts)
        .with_actions(actions)
        .with_rules(
            Rules::from_value(json!({
                "failing": {
                    "when": [{"broken": {"is": {"type": "string"}}}],
                    "then": {"actions": [{"type": "log", "params": {"message": "never"}}]}
                },
                "healthy": {
                    "when": [{"firstName": {"is": {"type": "string", "pattern": "^J"}}}],
                    "then": {"actions": [{"type": "log", "params": {"message": "still here"}}]}
                }
            }))
            .unwrap(),
        )
        .build();

    let results = engine.run(context(json!({"firstName": "John"}))).await;

    assert_eq!(entries(&log), vec![json!({"message": "still here"})]);
    assert!(results.get("failing").unwrap().error);
    assert!(results.get("healthy").unwrap().passed);
}

// ============================================================================
// Registries and rule forms
// ============================================================================

#[tokio::test]
async fn test_rules_as_array() {
    let (engine, log, _call) = engine_with_rules(json!([
        {
            "when": [{"firstName": {"is": {"type": "string", "pattern": "^J"}}}],
            "then": {"actions": [{"type": "log", "params": {"message": "first"}}]}
        },
        {
            "when": [{"firstName": {"is": {"type": "string"}}}],
            "then": {"actions": [{"type": "log", "params": {"message": "second"}}]}
        }
    ]));

    let results = engine.run(context(json!({"firstName": "John"}))).await;

    let keys: Vec<&str> = results.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["0", "1"]);
    assert_eq!(entries(&log).len(), 2);
}

#[tokio::test]
async fn test_rules_from_yaml() {
    let rules = Rules::from_yaml_str(
        r#"
salutation:
  when:
    - firstName:
        is:
          type: string
          pattern: "^J"
  then:
    actions:
      - type: log
        params:
          message: Hi friend!
"#,
    )
    .unwrap();

    let (actions, log, _call) = recording_actions();
    let engine = RulesEngine::builder(SchemaValidator::new())
        .with_rules(rules)
        .with_actions(actions)
        .build();

    engine.run(context(json!({"firstName": "John"}))).await;
    assert_eq!(entries(&log), vec![json!({"message": "Hi friend!"})]);
}

#[tokio::test]
async fn test_set_rules_merges_values_and_applies_functions() {
    let (engine, log, _call) = engine_with_rules(salutation_rules());
    let mut engine = engine;

    engine.set_rules(
        Rules::from_value(json!({
            "followup": {
                "when": [{"firstName": {"is": {"type": "string"}}}],
                "then": {"actions": [{"type": "log", "params": {"message": "followup"}}]}
            }
        }))
        .unwrap(),
    );

    let results = engine.run(context(json!({"firstName": "John"}))).await;
    assert_eq!(results.len(), 2);
    assert_eq!(entries(&log).len(), 2);

    engine.set_rules(Patch::apply(|_| Rules::default()));
    let results = engine.run(context(json!({"firstName": "John"}))).await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_set_facts_and_actions_patch() {
    let (engine, log, _call) = engine_with_rules(json!({
        "check": {
            "when": [{"plan": {"is": {"const": "pro"}}}],
            "then": {"actions": [{"type": "notify", "params": {"message": "pro plan"}}]}
        }
    }));
    let mut engine = engine;

    engine.set_facts(Facts::new().with_value("plan", json!("pro")));

    let notified = common::recorded();
    let sink = std::sync::Arc::clone(&notified);
    engine.set_actions(Actions::new().with_fn("notify", move |params| {
        sink.lock().unwrap().push(params);
        Ok(Value::Null)
    }));

    engine.run(Context::new()).await;
    assert_eq!(entries(&notified), vec![json!({"message": "pro plan"})]);
    assert!(entries(&log).is_empty());

    engine.set_facts(Patch::apply(|_| Facts::new()));
    assert!(engine.facts().is_empty());
}
