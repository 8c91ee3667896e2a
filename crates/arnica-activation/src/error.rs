//! The activation error taxonomy.
//!
//! The split matters to callers: the first three variants are the user's
//! problem (HTTP 400, never retried automatically), the rest are the
//! deployment's (HTTP 500, safe to retry the whole request because every
//! step downstream of the claim is idempotent).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActivationError {
  #[error("missing required field: {0}")]
  MissingField(&'static str),

  /// Code not found, expired, already used, or malformed.
  #[error("invalid or expired code")]
  CodeInvalid,

  /// The request's email does not match the code's — a tampering or
  /// confusion signal, not retried.
  #[error("email does not match this code")]
  EmailMismatch,

  /// The deployment has zero practitioners; no owner can be assigned.
  #[error("no practitioner available to own the profile")]
  NoPractitionerAvailable,

  #[error("identity provider error: {0}")]
  IdentityProvider(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("persistence error: {0}")]
  Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ActivationError {
  pub(crate) fn persistence<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    ActivationError::Persistence(Box::new(err))
  }

  pub(crate) fn identity<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    ActivationError::IdentityProvider(Box::new(err))
  }

  /// Whether the client caused this error (vs. the deployment).
  pub fn is_client_error(&self) -> bool {
    matches!(
      self,
      ActivationError::MissingField(_)
        | ActivationError::CodeInvalid
        | ActivationError::EmailMismatch
    )
  }
}
