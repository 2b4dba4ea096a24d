//! Builder pattern for RulesEngine

use crate::actions::Actions;
use crate::engine::RulesEngine;
use crate::error::Result;
use crate::facts::Facts;
use crate::interpolate::default_pattern;
use crate::memo::Equality;
use crate::resolve::{PathResolver, Resolver, SharedResolver};
use crate::validate::{SharedValidator, Validator};
use decree_core::Rules;
use regex::Regex;
use std::sync::Arc;

/// Builder for [`RulesEngine`]
///
/// A validator is the one mandatory piece; everything else has defaults:
/// `{{expr}}` interpolation, dot-path resolution, shallow memo equality,
/// and empty registries.
///
/// # Example
///
/// ```rust,ignore
/// use decree_engine::{Equality, RulesEngineBuilder, SchemaValidator};
///
/// let engine = RulesEngineBuilder::new(SchemaValidator::new())
///     .with_rules(rules)
///     .with_memoizer(Equality::Deep)
///     .with_pattern_str(r"\$(.+?)\$")?
///     .build();
/// ```
pub struct RulesEngineBuilder {
    validator: SharedValidator,
    resolver: SharedResolver,
    pattern: Regex,
    equality: Equality,
    facts: Facts,
    actions: Actions,
    rules: Rules,
}

impl RulesEngineBuilder {
    /// Create a new builder around the given validator
    pub fn new(validator: impl Validator + 'static) -> Self {
        Self {
            validator: Arc::new(validator),
            resolver: Arc::new(PathResolver),
            pattern: default_pattern(),
            equality: Equality::default(),
            facts: Facts::new(),
            actions: Actions::new(),
            rules: Rules::default(),
        }
    }

    /// Set the fact registry
    pub fn with_facts(mut self, facts: Facts) -> Self {
        self.facts = facts;
        self
    }

    /// Set the action registry
    pub fn with_actions(mut self, actions: Actions) -> Self {
        self.actions = actions;
        self
    }

    /// Set the rule registry
    pub fn with_rules(mut self, rules: Rules) -> Self {
        self.rules = rules;
        self
    }

    /// Set the interpolation delimiter pattern
    ///
    /// The first capture group is the lookup expression.
    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = pattern;
        self
    }

    /// Compile and set the interpolation delimiter pattern
    pub fn with_pattern_str(mut self, pattern: &str) -> Result<Self> {
        self.pattern = Regex::new(pattern)?;
        Ok(self)
    }

    /// Replace the path resolver used for `path` lookups and interpolation
    pub fn with_resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Set the param equality the per-run fact memo uses
    pub fn with_memoizer(mut self, equality: Equality) -> Self {
        self.equality = equality;
        self
    }

    /// Build the engine
    pub fn build(self) -> RulesEngine {
        RulesEngine::new(
            self.validator,
            self.resolver,
            self.pattern,
            self.equality,
            self.facts,
            self.actions,
            self.rules,
        )
    }
}
