//! Fact map processing
//!
//! A fact map is a conjunction: every condition in it must pass. All of a
//! map's facts evaluate concurrently; the aggregate then folds in document
//! order and trims at the first error marker, so a map result contains
//! entries up to and including the erroring fact and nothing after it.

use crate::bus::EventBus;
use crate::evaluator::FactEvaluator;
use decree_core::{Context, DebugEvent, FactMap, FactMapResult, MapId};
use futures::future::join_all;
use serde_json::Value;

pub(crate) struct FactMapProcessor<'a> {
    evaluator: &'a FactEvaluator<'a>,
    bus: &'a EventBus,
}

impl<'a> FactMapProcessor<'a> {
    pub fn new(evaluator: &'a FactEvaluator<'a>, bus: &'a EventBus) -> Self {
        Self { evaluator, bus }
    }

    pub async fn process(
        &self,
        rule: &str,
        map_id: &MapId,
        map: &FactMap,
        context: &Context,
    ) -> FactMapResult {
        self.bus.emit(DebugEvent::StartingFactMap {
            rule: rule.to_string(),
            map_id: map_id.clone(),
            fact_map: serde_json::to_value(map).unwrap_or(Value::Null),
        });

        let checks = join_all(map.iter().map(|(fact_name, condition)| {
            self.evaluator
                .evaluate(rule, map_id, fact_name, condition, context)
        }))
        .await;

        let mut facts = Vec::with_capacity(checks.len());
        let mut passed = true;
        let mut error = false;
        for (fact_name, check) in checks {
            if error {
                break;
            }
            error = check.errored();
            passed = !error && passed && check.passed();
            facts.push((fact_name, check));
        }

        let result = FactMapResult {
            facts,
            passed,
            error,
        };

        self.bus.emit(DebugEvent::FinishedFactMap {
            rule: rule.to_string(),
            map_id: map_id.clone(),
            results: result.facts_value(),
            passed: result.passed,
            error: result.error,
        });

        result
    }
}
