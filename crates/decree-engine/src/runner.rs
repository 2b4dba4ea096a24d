//! Rule execution
//!
//! The runner walks one rule tree per registered rule: interpolate the
//! `when` against the context, process its fact maps concurrently, pick the
//! `then` or `otherwise` branch, dispatch branch actions, and recurse into
//! a nested rule under the dotted path `rule.then` / `rule.otherwise`.
//!
//! Branch selection blocks on any fact-map error. Actions and a nested rule
//! on the same branch run concurrently; the node's `FINISHED_RULE` waits
//! only for its own actions, not for the nested subtree.

use crate::actions::{ActionExecutor, Actions};
use crate::bus::EventBus;
use crate::error::Result;
use crate::evaluator::FactEvaluator;
use crate::factmap::FactMapProcessor;
use crate::interpolate::Interpolator;
use crate::memo::MemoFacts;
use crate::resolve::SharedResolver;
use crate::validate::SharedValidator;
use decree_core::{
    Context, DebugEvent, ErrorEvent, Rule, RuleResult, Rules, RunResults, When, WhenResults,
};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};

pub(crate) struct RuleRunner<'a> {
    validator: &'a SharedValidator,
    resolver: &'a SharedResolver,
    interpolator: &'a Interpolator,
    facts: &'a MemoFacts,
    actions: &'a Actions,
    bus: &'a EventBus,
}

impl<'a> RuleRunner<'a> {
    pub fn new(
        validator: &'a SharedValidator,
        resolver: &'a SharedResolver,
        interpolator: &'a Interpolator,
        facts: &'a MemoFacts,
        actions: &'a Actions,
        bus: &'a EventBus,
    ) -> Self {
        Self {
            validator,
            resolver,
            interpolator,
            facts,
            actions,
            bus,
        }
    }

    /// Run every registered rule concurrently and merge their trees
    pub async fn run_rules(&self, rules: &Rules, context: &Context) -> RunResults {
        let trees = join_all(
            rules
                .iter()
                .into_iter()
                .map(|(name, rule)| self.execute(name, rule, context.clone())),
        )
        .await;

        let mut results = RunResults::new();
        for tree in trees {
            results.merge(tree);
        }
        results
    }

    /// Execute one node of the rule tree
    ///
    /// Any failure inside node processing is converted to an errored node
    /// plus a `RuleExecutionError`; a malformed rule never aborts siblings.
    fn execute<'s>(&'s self, name: String, rule: &'s Rule, context: Context) -> BoxFuture<'s, RunResults> {
        async move {
            debug!("Running rule: {}", name);
            match self.execute_node(&name, rule, &context).await {
                Ok(tree) => tree,
                Err(error) => {
                    warn!("Rule {} failed to execute: {}", name, error);
                    self.bus.emit(ErrorEvent::RuleExecutionError {
                        rule: name.clone(),
                        error: error.to_string(),
                    });
                    let mut tree = RunResults::new();
                    tree.insert(name, RuleResult::errored(WhenResults::new()));
                    tree
                }
            }
        }
        .boxed()
    }

    async fn execute_node<'s>(
        &'s self,
        name: &str,
        rule: &'s Rule,
        context: &Context,
    ) -> Result<RunResults> {
        let interpolated = self
            .interpolator
            .value(&serde_json::to_value(&rule.when)?, context.as_value());
        let when: When = serde_json::from_value(interpolated.clone())?;

        self.bus.emit(DebugEvent::StartingRule {
            rule: name.to_string(),
            interpolated: interpolated.clone(),
            context: context.clone(),
        });

        let evaluator = FactEvaluator::new(self.validator, self.resolver, self.facts, self.bus);
        let processor = FactMapProcessor::new(&evaluator, self.bus);

        let maps = when.maps();
        let processed = join_all(
            maps.iter()
                .map(|(id, map)| processor.process(name, id, map, context)),
        )
        .await;

        let mut results = WhenResults::new();
        for ((id, _), outcome) in maps.into_iter().zip(processed) {
            results.push(id, outcome);
        }

        let error = results.any_errored();
        let passed = !error && results.any_passed();

        if error {
            let node = RuleResult::errored(results);
            self.emit_finished(name, &interpolated, context, &node);
            return Ok(single(name, node));
        }

        let (key, branch) = if passed {
            ("then", rule.then.as_deref())
        } else {
            ("otherwise", rule.otherwise.as_deref())
        };

        let branch = match branch {
            Some(branch) => branch,
            None => {
                let node = RuleResult {
                    passed,
                    error: false,
                    results,
                    actions: None,
                };
                self.emit_finished(name, &interpolated, context, &node);
                return Ok(single(name, node));
            }
        };

        let next_context = context.with_results(serde_json::to_value(&results)?);
        let executor = ActionExecutor::new(self.actions, self.interpolator, self.bus);
        let nested_name = format!("{}.{}", name, key);

        let (node, nested_tree) = futures::join!(
            async {
                let action_results = match &branch.actions {
                    Some(specs) => Some(executor.execute(name, specs, &next_context).await),
                    None => None,
                };
                let node = RuleResult {
                    passed,
                    error: false,
                    results,
                    actions: action_results,
                };
                self.emit_finished(name, &interpolated, context, &node);
                node
            },
            async {
                match &branch.rule {
                    Some(nested) => {
                        Some(self.execute(nested_name, nested, next_context.clone()).await)
                    }
                    None => None,
                }
            },
        );

        let mut tree = single(name, node);
        if let Some(nested) = nested_tree {
            tree.merge(nested);
        }
        Ok(tree)
    }

    fn emit_finished(&self, name: &str, interpolated: &Value, context: &Context, node: &RuleResult) {
        self.bus.emit(DebugEvent::FinishedRule {
            rule: name.to_string(),
            interpolated: interpolated.clone(),
            context: context.clone(),
            result: node.clone(),
        });
    }
}

fn single(name: &str, node: RuleResult) -> RunResults {
    let mut tree = RunResults::new();
    tree.insert(name, node);
    tree
}
