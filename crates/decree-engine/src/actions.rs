//! Action dispatch
//!
//! Actions are side effects a taken branch requests: each spec names a
//! registered handler and optional params. Specs are interpolated against
//! the branch's context (including the rule's `results`) before dispatch,
//! and every spec in a branch runs concurrently. A failed or missing
//! handler marks only its own result slot; siblings are unaffected.

use crate::bus::EventBus;
use crate::interpolate::{coerce, Interpolator};
use async_trait::async_trait;
use decree_core::{ActionResult, ActionSpec, Context, ErrorEvent, Merge};
use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A registered action handler
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn call(&self, params: Value) -> anyhow::Result<Value>;
}

/// Adapt a plain function into an [`ActionHandler`]
pub fn action_fn<F>(f: F) -> FnAction<F>
where
    F: Fn(Value) -> anyhow::Result<Value> + Send + Sync,
{
    FnAction(f)
}

pub struct FnAction<F>(F);

#[async_trait]
impl<F> ActionHandler for FnAction<F>
where
    F: Fn(Value) -> anyhow::Result<Value> + Send + Sync,
{
    async fn call(&self, params: Value) -> anyhow::Result<Value> {
        (self.0)(params)
    }
}

/// Adapt an async function into an [`ActionHandler`]
pub fn async_action_fn<F>(f: F) -> AsyncFnAction<F>
where
    F: Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync,
{
    AsyncFnAction(f)
}

pub struct AsyncFnAction<F>(F);

#[async_trait]
impl<F> ActionHandler for AsyncFnAction<F>
where
    F: Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync,
{
    async fn call(&self, params: Value) -> anyhow::Result<Value> {
        (self.0)(params).await
    }
}

/// The action registry
#[derive(Clone, Default)]
pub struct Actions {
    entries: HashMap<String, Arc<dyn ActionHandler>>,
}

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(
        mut self,
        kind: impl Into<String>,
        handler: impl ActionHandler + 'static,
    ) -> Self {
        self.insert_handler(kind, handler);
        self
    }

    pub fn with_fn<F>(self, kind: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.with_handler(kind, action_fn(f))
    }

    pub fn insert_handler(&mut self, kind: impl Into<String>, handler: impl ActionHandler + 'static) {
        self.entries.insert(kind.into(), Arc::new(handler));
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn ActionHandler>> {
        self.entries.get(kind)
    }

    /// Registered kinds, sorted for stable event payloads
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

impl Merge for Actions {
    fn merge(mut self, next: Actions) -> Actions {
        self.entries.extend(next.entries);
        self
    }
}

/// Runs a branch's action list against the branch context
pub(crate) struct ActionExecutor<'a> {
    actions: &'a Actions,
    interpolator: &'a Interpolator,
    bus: &'a EventBus,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(actions: &'a Actions, interpolator: &'a Interpolator, bus: &'a EventBus) -> Self {
        Self {
            actions,
            interpolator,
            bus,
        }
    }

    pub async fn execute(
        &self,
        rule: &str,
        specs: &[ActionSpec],
        context: &Context,
    ) -> Vec<ActionResult> {
        join_all(
            specs
                .iter()
                .map(|spec| self.dispatch(rule, spec, context)),
        )
        .await
    }

    async fn dispatch(&self, rule: &str, spec: &ActionSpec, context: &Context) -> ActionResult {
        let kind = match self.interpolator.string(&spec.kind, context.as_value()) {
            Value::String(kind) => kind,
            other => coerce(&other),
        };
        let params = spec
            .params
            .as_ref()
            .map(|params| self.interpolator.value(params, context.as_value()));

        let handler = match self.actions.get(&kind) {
            Some(handler) => handler,
            None => {
                let error = format!("No action found for {}", kind);
                self.report(rule, &kind, &params, &error);
                return ActionResult::failed(kind, params, error);
            }
        };

        match handler
            .call(params.clone().unwrap_or(Value::Null))
            .await
        {
            Ok(result) => ActionResult::succeeded(kind, params, result),
            Err(error) => {
                let error = format!("{:#}", error);
                self.report(rule, &kind, &params, &error);
                ActionResult::failed(kind, params, error)
            }
        }
    }

    fn report(&self, rule: &str, kind: &str, params: &Option<Value>, error: &str) {
        self.bus.emit(ErrorEvent::ActionExecutionError {
            rule: rule.to_string(),
            action: kind.to_string(),
            params: params.clone(),
            error: error.to_string(),
        });
    }
}
