//! Error types for `arnica-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("not a 6-digit code or a code id: {0:?}")]
  MalformedRedemption(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
