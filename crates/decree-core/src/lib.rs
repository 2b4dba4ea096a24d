//! Decree Core - Core types and definitions for the Decree rules engine
//!
//! This crate provides the fundamental types shared across the Decree
//! ecosystem:
//! - Rule document model (rules, fact maps, conditions, actions)
//! - Run context and result tree types
//! - Engine event payloads and channels
//! - Registry patch semantics
//! - Error types

pub mod context;
pub mod error;
pub mod event;
pub mod ordered;
pub mod patch;
pub mod result;
pub mod rule;

// Re-export commonly used types
pub use context::Context;
pub use error::CoreError;
pub use event::{Channel, DebugEvent, EngineEvent, ErrorEvent, RunComplete, RunStart};
pub use ordered::OrderedMap;
pub use patch::{Merge, Patch};
pub use result::{
    ActionResult, FactCheck, FactMapResult, MapId, RuleResult, RunResults, Validation, WhenResults,
};
pub use rule::{ActionSpec, Branch, Condition, FactMap, Rule, Rules, When};
