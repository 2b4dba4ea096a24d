//! The rules engine
//!
//! Holds the registries and configuration, and drives one run at a time:
//! snapshot the rules, wrap the facts in a per-run memo, execute every rule
//! concurrently, and return the merged result tree. `run` never fails once
//! started; everything that goes wrong is reported through events and
//! error-flagged result nodes.

use crate::actions::Actions;
use crate::builder::RulesEngineBuilder;
use crate::bus::{EventBus, Subscriber, Subscription};
use crate::facts::Facts;
use crate::interpolate::Interpolator;
use crate::memo::{Equality, MemoFacts};
use crate::resolve::SharedResolver;
use crate::runner::RuleRunner;
use crate::validate::{SharedValidator, Validator};
use decree_core::{Channel, Context, EngineEvent, Patch, RunComplete, RunResults, RunStart, Rules};
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// An event-driven rules engine
///
/// # Example
///
/// ```rust,ignore
/// use decree_engine::{Facts, RulesEngine, SchemaValidator};
/// use decree_core::{Context, Rules};
///
/// let rules = Rules::from_yaml_str(rules_yaml)?;
/// let engine = RulesEngine::builder(SchemaValidator::new())
///     .with_rules(rules)
///     .with_facts(Facts::new().with_value("plan", "pro".into()))
///     .build();
///
/// let results = engine.run(Context::new()).await;
/// ```
pub struct RulesEngine {
    validator: SharedValidator,
    resolver: SharedResolver,
    pattern: Regex,
    equality: Equality,
    facts: Facts,
    actions: Actions,
    rules: Rules,
    bus: EventBus,
}

impl RulesEngine {
    /// Start configuring an engine around the given validator
    pub fn builder(validator: impl Validator + 'static) -> RulesEngineBuilder {
        RulesEngineBuilder::new(validator)
    }

    pub(crate) fn new(
        validator: SharedValidator,
        resolver: SharedResolver,
        pattern: Regex,
        equality: Equality,
        facts: Facts,
        actions: Actions,
        rules: Rules,
    ) -> Self {
        Self {
            validator,
            resolver,
            pattern,
            equality,
            facts,
            actions,
            rules,
            bus: EventBus::new(),
        }
    }

    /// Generate a unique run ID
    /// Format: run_YYYYMMDDHHmmss_xxxxxx
    /// Example: run_20240915143052_a3f2e1
    fn generate_run_id() -> String {
        use chrono::Utc;
        use rand::Rng;

        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let random: u32 = rand::thread_rng().gen_range(0..0xFFFFFF);
        format!("run_{}_{:06x}", timestamp, random)
    }

    // ========== Registries ==========

    /// Update the fact registry; a plain value merges, `Patch::apply`
    /// replaces
    pub fn set_facts(&mut self, patch: impl Into<Patch<Facts>>) {
        let current = std::mem::take(&mut self.facts);
        self.facts = patch.into().resolve(current);
    }

    /// Update the action registry
    pub fn set_actions(&mut self, patch: impl Into<Patch<Actions>>) {
        let current = std::mem::take(&mut self.actions);
        self.actions = patch.into().resolve(current);
    }

    /// Update the rule registry
    pub fn set_rules(&mut self, patch: impl Into<Patch<Rules>>) {
        let current = std::mem::take(&mut self.rules);
        self.rules = patch.into().resolve(current);
    }

    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    pub fn actions(&self) -> &Actions {
        &self.actions
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    // ========== Events ==========

    /// Attach a subscriber to a channel
    pub fn on<F>(&self, channel: Channel, subscriber: F) -> Subscription
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.bus.on(channel, subscriber)
    }

    /// Attach a shared subscriber handle
    pub fn subscribe(&self, channel: Channel, subscriber: Subscriber) -> Subscription {
        self.bus.subscribe(channel, subscriber)
    }

    /// Detach a subscriber by handle identity
    pub fn off(&self, channel: Channel, subscriber: &Subscriber) {
        self.bus.off(channel, subscriber)
    }

    // ========== Execution ==========

    /// Run every registered rule against the context
    ///
    /// Facts memoize per run, so repeated conditions with equal params cost
    /// one resolution here and resolve fresh on the next call.
    pub async fn run(&self, context: Context) -> RunResults {
        let run_id = Self::generate_run_id();
        debug!("Starting run {}", run_id);

        self.bus.emit(RunStart {
            run: run_id.clone(),
            context: context.clone(),
            facts: self.facts.names(),
            actions: self.actions.names(),
            rules: serde_json::to_value(&self.rules).unwrap_or(Value::Null),
        });

        let interpolator = Interpolator::new(self.pattern.clone(), Arc::clone(&self.resolver));
        let memoed = MemoFacts::new(&self.facts, &self.equality);
        let runner = RuleRunner::new(
            &self.validator,
            &self.resolver,
            &interpolator,
            &memoed,
            &self.actions,
            &self.bus,
        );

        let results = runner.run_rules(&self.rules, &context).await;
        debug!("Run {} finished with {} rule results", run_id, results.len());

        self.bus.emit(RunComplete {
            run: run_id,
            context,
            results: results.clone(),
        });
        results
    }
}
