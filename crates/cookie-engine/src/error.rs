//! Error type for `cookie-engine`.

use thiserror::Error;

/// Boxed error returned by rule matchers, rule actions and loaders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("cookie jar error: {0}")]
  Jar(#[source] BoxError),

  #[error("rule {rule_id} failed on {identifier}: {source}")]
  Rule {
    identifier: String,
    rule_id:    String,
    #[source]
    source:     BoxError,
  },

  #[error("enrichment loader {loader} failed on {identifier}: {source}")]
  Loader {
    identifier: String,
    loader:     String,
    #[source]
    source:     BoxError,
  },

  #[error("per-cookie lock table poisoned")]
  Poisoned,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
