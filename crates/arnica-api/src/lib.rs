//! JSON REST API for Arnica activation.
//!
//! Exposes an axum [`Router`] backed by any [`ActivationStore`] and
//! [`IdentityProvider`]. Auth, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", arnica_api::router(state.clone()))
//! ```

pub mod error;
pub mod handlers;

use std::{path::PathBuf, sync::Arc};

use arnica_activation::{Activation, DefaultPractitionerResolver};
use arnica_core::{identity::IdentityProvider, store::ActivationStore};
use axum::{Router, routing::post};
use serde::Deserialize;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:           String,
  pub port:           u16,
  pub store_path:     PathBuf,
  pub directory_path: PathBuf,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, P, D> {
  pub activation: Arc<Activation<S, P, D>>,
}

impl<S, P, D> Clone for AppState<S, P, D> {
  fn clone(&self) -> Self {
    Self {
      activation: self.activation.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised activation router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn router<S, P, D>(state: AppState<S, P, D>) -> Router<()>
where
  S: ActivationStore + 'static,
  P: IdentityProvider + 'static,
  D: DefaultPractitionerResolver + 'static,
{
  Router::new()
    .route(
      "/activation/consultant/finalize",
      post(handlers::finalize_consultant::<S, P, D>),
    )
    .route(
      "/activation/patient/finalize",
      post(handlers::finalize_patient::<S, P, D>),
    )
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
