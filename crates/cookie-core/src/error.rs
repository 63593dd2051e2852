//! Error types for `cookie-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0} lock poisoned")]
  Poisoned(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
