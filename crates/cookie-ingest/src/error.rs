//! Error type for `cookie-ingest`.

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Cycle-level failures. Failures of individual changes are reported in
/// [`crate::CycleReport::failures`] instead.
#[derive(Debug, Error)]
pub enum Error {
  /// Polling the upstream source failed. Nothing was applied; the next
  /// cycle retries from the same position.
  #[error("upstream poll failed: {0}")]
  Upstream(#[source] BoxError),

  /// Reading or writing the checkpoint failed.
  #[error("checkpoint store error: {0}")]
  Checkpoint(#[source] BoxError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
