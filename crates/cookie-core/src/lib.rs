//! Core types and trait definitions for Cookie Monster.
//!
//! This crate is deliberately free of scheduling and database dependencies.
//! It owns the data model (cookies and their enrichments), the fact resolver
//! that merges an enrichment history into currently known facts, and the
//! collaborator traits the engine and pipeline are written against.

pub mod cookie;
pub mod enrichment;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod resolve;
pub mod store;

pub use cookie::Cookie;
pub use enrichment::{Change, Enrichment, EnrichmentKind, Metadata, Payload};
pub use error::{Error, Result};
