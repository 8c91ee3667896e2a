//! API error type and [`axum::response::IntoResponse`] implementation.

use arnica_activation::ActivationError;
use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
///
/// Client-caused activation errors map to 400, everything else to 500. The
/// body shape matches the success shape's envelope: `{"ok": false, ...}`.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] ActivationError);

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = if self.0.is_client_error() {
      StatusCode::BAD_REQUEST
    } else {
      StatusCode::INTERNAL_SERVER_ERROR
    };
    (
      status,
      Json(json!({ "ok": false, "message": self.0.to_string() })),
    )
      .into_response()
  }
}
