//! Rule evaluation for Cookie Monster.
//!
//! A [`RuleEngine`] runs a priority-ordered list of [`Rule`]s against one
//! cookie, stopping at the first action that asks to. The [`Processor`]
//! wraps the engine with the jar: it loads a cookie's history, serialises
//! passes per cookie, records which rules fired, and falls back to
//! [`EnrichmentLoader`]s when no rule stopped evaluation.

pub mod engine;
pub mod error;
pub mod loader;
pub mod processor;
pub mod rule;

pub use engine::{Evaluation, PassState, RuleEngine};
pub use error::{BoxError, Error, Result};
pub use loader::EnrichmentLoader;
pub use processor::{DEFAULT_MAX_PASSES, Outcome, Processor};
pub use rule::Rule;

#[cfg(test)]
mod tests;
