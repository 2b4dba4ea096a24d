//! Per-run fact memoization
//!
//! Each run wraps every fact handler in a single-slot memo: a call with
//! params equal to the previous call's returns the same shared future, so
//! concurrent fact maps asking the same question trigger one invocation.
//! Slots live for one run only; a new run always re-resolves.

use crate::facts::{Fact, FactSource, Facts};
use decree_core::Context;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Param equality used to decide whether a memo slot is reusable
///
/// Shallow compares top-level entries of objects and arrays, treating any
/// nested composite as unequal. Deep is full structural equality.
#[derive(Clone)]
pub enum Equality {
    Shallow,
    Deep,
    Custom(Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>),
}

impl Default for Equality {
    fn default() -> Self {
        Equality::Shallow
    }
}

impl Equality {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        Equality::Custom(Arc::new(f))
    }

    fn matches(&self, previous: &Option<Value>, next: &Option<Value>) -> bool {
        match (previous, next) {
            (None, None) => true,
            (Some(a), Some(b)) => match self {
                Equality::Shallow => shallow_equal(a, b),
                Equality::Deep => a == b,
                Equality::Custom(check) => check(a, b),
            },
            _ => false,
        }
    }
}

fn shallow_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, av)| b.get(key).is_some_and(|bv| entry_equal(av, bv)))
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(av, bv)| entry_equal(av, bv))
        }
        _ => entry_equal(a, b),
    }
}

/// Top-level entry comparison: primitives by value, composites never equal
fn entry_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(_), _) | (Value::Array(_), _) => false,
        (_, Value::Object(_)) | (_, Value::Array(_)) => false,
        _ => a == b,
    }
}

type SharedResolve = Shared<BoxFuture<'static, Result<Value, Arc<anyhow::Error>>>>;

struct Slot {
    params: Option<Value>,
    future: SharedResolve,
}

/// A fact handler wrapped in a single-slot memo
pub(crate) struct MemoFact {
    handler: Arc<dyn Fact>,
    equality: Equality,
    slot: Mutex<Option<Slot>>,
}

impl MemoFact {
    fn new(handler: Arc<dyn Fact>, equality: Equality) -> Self {
        Self {
            handler,
            equality,
            slot: Mutex::new(None),
        }
    }

    pub async fn resolve(&self, params: Option<Value>, context: &Context) -> anyhow::Result<Value> {
        let future = {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            match slot.as_ref() {
                Some(entry) if self.equality.matches(&entry.params, &params) => {
                    entry.future.clone()
                }
                _ => {
                    let handler = Arc::clone(&self.handler);
                    let call_params = params.clone();
                    let call_context = context.clone();
                    let future = async move {
                        handler
                            .resolve(call_params, &call_context)
                            .await
                            .map_err(Arc::new)
                    }
                    .boxed()
                    .shared();
                    *slot = Some(Slot {
                        params,
                        future: future.clone(),
                    });
                    future
                }
            }
        };

        future.await.map_err(|error| anyhow::anyhow!("{:#}", error))
    }
}

/// One run's view of the fact registry, handlers memoized
pub(crate) enum MemoSource {
    Value(Value),
    Handler(MemoFact),
}

impl MemoSource {
    pub async fn resolve(&self, params: Option<Value>, context: &Context) -> anyhow::Result<Value> {
        match self {
            MemoSource::Value(value) => Ok(value.clone()),
            MemoSource::Handler(memo) => memo.resolve(params, context).await,
        }
    }
}

pub(crate) struct MemoFacts {
    entries: HashMap<String, MemoSource>,
}

impl MemoFacts {
    pub fn new(facts: &Facts, equality: &Equality) -> Self {
        let entries = facts
            .iter()
            .map(|(name, source)| {
                let memoed = match source {
                    FactSource::Value(value) => MemoSource::Value(value.clone()),
                    FactSource::Handler(handler) => MemoSource::Handler(MemoFact::new(
                        Arc::clone(handler),
                        equality.clone(),
                    )),
                };
                (name.to_string(), memoed)
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&MemoSource> {
        self.entries.get(name)
    }
}
