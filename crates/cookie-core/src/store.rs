//! Collaborator traits consumed by the engine and the ingestion pipeline.
//!
//! Concrete backends (the cookie jar, the upstream data source, durable
//! checkpoint storage) live outside this crate. Higher layers depend on these
//! abstractions, not on any concrete backend.
//!
//! All async methods return `Send` futures so implementations can be driven
//! from a multi-threaded tokio runtime.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::enrichment::{Change, DataObject, Enrichment};

/// Callback invoked with the identifier of a cookie whose history changed.
pub type Listener = Box<dyn Fn(&str) + Send + Sync>;

// ─── Upstream ────────────────────────────────────────────────────────────────

/// The system whose data objects are tracked.
pub trait UpstreamSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// All changes observed strictly after `since`, in upstream order.
  ///
  /// Repeating a call with the same `since` must be harmless: consumers
  /// tolerate re-delivery.
  fn changes_since(
    &self,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Change>, Self::Error>> + Send + '_;
}

/// On-demand access to the current state of a single data object.
pub trait SnapshotSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The data object at `path` as it is now.
  fn snapshot<'a>(
    &'a self,
    path: &'a str,
  ) -> impl Future<Output = Result<DataObject, Self::Error>> + Send + 'a;
}

// ─── Cookie jar ──────────────────────────────────────────────────────────────

/// Owner of every cookie's enrichment history.
///
/// Histories are append-only. Appending through [`CookieJar::append_enrichment`]
/// notifies every registered listener once the enrichment is durable.
pub trait CookieJar: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Append `enrichment` to the cookie's history, creating the cookie on
  /// first sight, then notify listeners.
  fn append_enrichment<'a>(
    &'a self,
    identifier: &'a str,
    enrichment: Enrichment,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Append without notifying listeners. Used for bookkeeping enrichments
  /// (such as rule applications) that must not trigger another pass.
  fn append_enrichment_quietly<'a>(
    &'a self,
    identifier: &'a str,
    enrichment: Enrichment,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// The cookie's enrichments in insertion order; empty if unknown.
  fn get_history<'a>(
    &'a self,
    identifier: &'a str,
  ) -> impl Future<Output = Result<Vec<Enrichment>, Self::Error>> + Send + 'a;

  /// Register a callback fired after every notifying append.
  fn add_listener(&self, listener: Listener);
}

// ─── Checkpoint ──────────────────────────────────────────────────────────────

/// Durable storage for the ingestion pipeline's "processed through" mark.
pub trait CheckpointStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn read_checkpoint(
    &self,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + '_;

  /// Persist `checkpoint`. Must not return before the write is durable.
  fn write_checkpoint(
    &self,
    checkpoint: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Metrics ─────────────────────────────────────────────────────────────────

/// Fire-and-forget metric recording. Implementations must not block.
pub trait MetricsSink: Send + Sync {
  fn record(&self, name: &str, value: f64);
}
