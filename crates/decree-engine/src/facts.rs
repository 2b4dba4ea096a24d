//! Fact sources
//!
//! A fact is either a static value or an async handler invoked with the
//! condition's interpolated params and the run context. Handlers registered
//! here are memoized per run; names not found in the registry fall back to
//! a context lookup at evaluation time.

use async_trait::async_trait;
use decree_core::{Context, Merge};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A callable fact
#[async_trait]
pub trait Fact: Send + Sync {
    async fn resolve(&self, params: Option<Value>, context: &Context) -> anyhow::Result<Value>;
}

/// Adapt a plain function into a [`Fact`]
pub fn fact_fn<F>(f: F) -> FnFact<F>
where
    F: Fn(Option<Value>) -> anyhow::Result<Value> + Send + Sync,
{
    FnFact(f)
}

pub struct FnFact<F>(F);

#[async_trait]
impl<F> Fact for FnFact<F>
where
    F: Fn(Option<Value>) -> anyhow::Result<Value> + Send + Sync,
{
    async fn resolve(&self, params: Option<Value>, _context: &Context) -> anyhow::Result<Value> {
        (self.0)(params)
    }
}

/// Adapt an async function into a [`Fact`]
///
/// The function receives its own clone of the context and returns a boxed
/// future, e.g. `async_fact_fn(|params, ctx| async move { .. }.boxed())`.
pub fn async_fact_fn<F>(f: F) -> AsyncFnFact<F>
where
    F: Fn(Option<Value>, Context) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync,
{
    AsyncFnFact(f)
}

pub struct AsyncFnFact<F>(F);

#[async_trait]
impl<F> Fact for AsyncFnFact<F>
where
    F: Fn(Option<Value>, Context) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync,
{
    async fn resolve(&self, params: Option<Value>, context: &Context) -> anyhow::Result<Value> {
        (self.0)(params, context.clone()).await
    }
}

/// A registered fact: a value read directly, or a handler to invoke
#[derive(Clone)]
pub enum FactSource {
    Value(Value),
    Handler(Arc<dyn Fact>),
}

/// The fact registry
#[derive(Clone, Default)]
pub struct Facts {
    entries: HashMap<String, FactSource>,
}

impl Facts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a static value
    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert_value(name, value);
        self
    }

    /// Register an async handler
    pub fn with_handler(mut self, name: impl Into<String>, handler: impl Fact + 'static) -> Self {
        self.insert_handler(name, handler);
        self
    }

    /// Register a plain function
    pub fn with_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Option<Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.with_handler(name, fact_fn(f))
    }

    pub fn insert_value(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(name.into(), FactSource::Value(value));
    }

    pub fn insert_handler(&mut self, name: impl Into<String>, handler: impl Fact + 'static) {
        self.entries
            .insert(name.into(), FactSource::Handler(Arc::new(handler)));
    }

    pub fn get(&self, name: &str) -> Option<&FactSource> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FactSource)> {
        self.entries.iter().map(|(name, source)| (name.as_str(), source))
    }

    /// Registered names, sorted for stable event payloads
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Merge for Facts {
    fn merge(mut self, next: Facts) -> Facts {
        self.entries.extend(next.entries);
        self
    }
}
