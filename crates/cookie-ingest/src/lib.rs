//! Ingestion pipeline for Cookie Monster.
//!
//! A [`Pipeline`] periodically polls an upstream source for changes, applies
//! each change to the cookie jar as an enrichment on a bounded worker pool,
//! and advances a durable checkpoint once a whole batch has been applied.
//! [`RateLimitedJar`] gates every request reaching the jar through one
//! shared [`RateLimiter`].

mod backlog;
mod limiter;
mod pipeline;

pub mod error;

pub use backlog::{Backlog, Submission};
pub use error::{Error, Result};
pub use limiter::{RateLimitedJar, RateLimiter};
pub use pipeline::{ApplyFailure, CycleReport, FailureReason, Pipeline, PipelineConfig};
