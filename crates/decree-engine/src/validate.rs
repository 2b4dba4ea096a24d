//! Condition validation
//!
//! A [`Validator`] decides whether a resolved fact value satisfies a
//! condition's `is` schema. The engine treats schemas as opaque: whatever
//! vocabulary the configured validator understands is the vocabulary rules
//! are written in.

use async_trait::async_trait;
use decree_core::{Context, Validation};
use serde_json::Value;
use std::sync::Arc;

/// Decides whether a subject satisfies a schema
///
/// Returning `Err` marks the fact as errored and blocks the rule's branch
/// selection; returning `Ok` with `result: false` is an ordinary failed
/// check. The context is available for validators whose vocabulary needs
/// runtime data beyond the subject itself.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(
        &self,
        subject: &Value,
        schema: &Value,
        context: &Context,
    ) -> anyhow::Result<Validation>;
}

/// Shared validator handle
pub type SharedValidator = Arc<dyn Validator>;

/// Adapt a plain function into a [`Validator`]
pub fn validator_fn<F>(f: F) -> FnValidator<F>
where
    F: Fn(&Value, &Value) -> anyhow::Result<Validation> + Send + Sync,
{
    FnValidator(f)
}

pub struct FnValidator<F>(F);

#[async_trait]
impl<F> Validator for FnValidator<F>
where
    F: Fn(&Value, &Value) -> anyhow::Result<Validation> + Send + Sync,
{
    async fn validate(
        &self,
        subject: &Value,
        schema: &Value,
        _context: &Context,
    ) -> anyhow::Result<Validation> {
        (self.0)(subject, schema)
    }
}

/// JSON Schema validator
///
/// Schemas compile per evaluation, so rules may carry interpolated schemas
/// that differ from run to run.
#[cfg(feature = "jsonschema")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

#[cfg(feature = "jsonschema")]
impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "jsonschema")]
#[async_trait]
impl Validator for SchemaValidator {
    async fn validate(
        &self,
        subject: &Value,
        schema: &Value,
        _context: &Context,
    ) -> anyhow::Result<Validation> {
        let compiled = jsonschema::JSONSchema::compile(schema)
            .map_err(|e| anyhow::anyhow!("schema compilation failed: {}", e))?;

        let verdict = match compiled.validate(subject) {
            Ok(()) => Validation::pass(),
            Err(errors) => {
                let details: Vec<Value> = errors
                    .map(|error| {
                        serde_json::json!({
                            "instancePath": error.instance_path.to_string(),
                            "message": error.to_string(),
                        })
                    })
                    .collect();
                Validation::fail().with_errors(Value::Array(details))
            }
        };
        Ok(verdict)
    }
}
