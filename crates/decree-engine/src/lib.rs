//! Decree Engine - Async rule execution for the Decree rules engine
//!
//! Wire up a validator, facts, actions, and rules; subscribe to event
//! channels; then `run` a context through every rule concurrently and read
//! the result tree back.

pub mod actions;
pub mod builder;
pub mod bus;
pub mod engine;
pub mod error;
pub mod facts;
pub mod interpolate;
pub mod memo;
pub mod resolve;
pub mod validate;

mod evaluator;
mod factmap;
mod runner;

// Re-export main types
pub use actions::{action_fn, async_action_fn, ActionHandler, Actions};
pub use builder::RulesEngineBuilder;
pub use bus::{EventBus, Subscriber, Subscription};
pub use engine::RulesEngine;
pub use error::{EngineError, Result};
pub use facts::{async_fact_fn, fact_fn, Fact, FactSource, Facts};
pub use interpolate::Interpolator;
pub use memo::Equality;
pub use resolve::{PathResolver, Resolver, SharedResolver};
pub use validate::{validator_fn, SharedValidator, Validator};

#[cfg(feature = "jsonschema")]
pub use validate::SchemaValidator;

// Re-export commonly used types from decree-core
pub use decree_core::{
    ActionResult, Channel, Context, DebugEvent, EngineEvent, ErrorEvent, FactCheck, MapId, Patch,
    RuleResult, Rules, RunComplete, RunResults, RunStart, Validation,
};
