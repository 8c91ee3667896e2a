//! The default-practitioner capability.
//!
//! When neither the invitation nor the code can name an owner for a profile,
//! the deployment decides what happens: fall back to the oldest practitioner
//! on record (the data-driven default), or refuse. The choice is injected
//! rather than hard-coded so it can be disabled per deployment.

use std::{convert::Infallible, future::Future, sync::Arc};

use arnica_core::store::ActivationStore;
use uuid::Uuid;

pub trait DefaultPractitionerResolver: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The practitioner to own otherwise-unowned profiles, if the deployment
  /// allows one.
  fn resolve(
    &self,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;
}

/// The earliest-created practitioner in the store.
pub struct OldestPractitioner<S> {
  store: Arc<S>,
}

impl<S> OldestPractitioner<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }
}

impl<S: ActivationStore> DefaultPractitionerResolver for OldestPractitioner<S> {
  type Error = S::Error;

  async fn resolve(&self) -> Result<Option<Uuid>, S::Error> {
    Ok(
      self
        .store
        .oldest_practitioner()
        .await?
        .map(|p| p.practitioner_id),
    )
  }
}

/// Disables the fallback entirely: an unresolvable owner becomes a hard
/// [`NoPractitionerAvailable`](crate::ActivationError::NoPractitionerAvailable).
pub struct NoDefaultPractitioner;

impl DefaultPractitionerResolver for NoDefaultPractitioner {
  type Error = Infallible;

  async fn resolve(&self) -> Result<Option<Uuid>, Infallible> { Ok(None) }
}
