//! Error type for `cookie-monster`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("{0} lock poisoned")]
  Poisoned(&'static str),

  /// Wiring needs a tokio runtime to schedule processing passes on.
  #[error("no tokio runtime: {0}")]
  NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
