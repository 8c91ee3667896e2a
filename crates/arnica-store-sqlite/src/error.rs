//! Error type for `arnica-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown discriminant: {0}")]
  UnknownDiscriminant(String),

  #[error("password hash error: {0}")]
  PasswordHash(String),

  /// Attempted to update a directory account that does not exist.
  #[error("identity user not found: {0}")]
  UserNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
