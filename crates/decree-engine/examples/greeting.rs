//! Greeting rule example
//!
//! This example demonstrates:
//! - Declaring rules as YAML data
//! - Registering an async fact and action handlers
//! - Watching the debug and error channels during a run

use decree_engine::{
    async_fact_fn, Actions, Channel, Context, Facts, Rules, RulesEngine, SchemaValidator,
};
use futures::FutureExt;
use serde_json::{json, Value};

const RULES: &str = r#"
salutation:
  when:
    - user:
        path: firstName
        is:
          type: string
          pattern: "^J"
  then:
    actions:
      - type: log
        params:
          message: "Hi {{results[0].user.resolved}}!"
    when:
      - user:
          path: lastName
          is:
            type: string
            pattern: "^S"
    then:
      actions:
        - type: log
          params:
            message: "We may be related, {{results[0].user.resolved}}."
  otherwise:
    actions:
      - type: log
        params:
          message: "Who are you?"
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    println!("=== Greeting Rule Example ===\n");

    let facts = Facts::new().with_handler(
        "user",
        async_fact_fn(|_params, context: Context| {
            async move {
                // Stands in for a user-service lookup
                let id = context.get("userId").cloned().unwrap_or(Value::Null);
                println!("looking up user {}", id);
                Ok(json!({"firstName": "John", "lastName": "Smith"}))
            }
            .boxed()
        }),
    );

    let actions = Actions::new().with_fn("log", |params| {
        if let Some(message) = params.get("message").and_then(Value::as_str) {
            println!("log action: {}", message);
        }
        Ok(Value::Null)
    });

    let engine = RulesEngine::builder(SchemaValidator::new())
        .with_rules(Rules::from_yaml_str(RULES)?)
        .with_facts(facts)
        .with_actions(actions)
        .build();

    let _debug = engine.on(Channel::Debug, |event| {
        if let Ok(payload) = serde_json::to_value(event) {
            println!("debug: {}", payload["type"]);
        }
    });
    let _errors = engine.on(Channel::Error, |event| {
        println!("error: {:?}", event.as_error());
    });

    let mut context = Context::new();
    context.insert("userId", json!("user-123"));
    let results = engine.run(context).await;

    println!("\nResult tree:");
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
