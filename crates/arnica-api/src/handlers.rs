//! Handlers for the activation endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/activation/consultant/finalize` | Body below |
//! | `POST` | `/activation/patient/finalize` | Same shape |
//!
//! Body: `{"email": "...", "newPassword": "...", "otpCodeOrOtpId": "..."}`;
//! `email` is optional, the last field takes either a 6-digit code or the
//! code id returned by a previous successful finalize.

use arnica_activation::{DefaultPractitionerResolver, FinalizeRequest};
use arnica_core::{
  identity::IdentityProvider, profile::SubjectKind, store::ActivationStore,
};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── Wire shapes ─────────────────────────────────────────────────────────────

/// Absent fields deserialise to empty strings so the orchestrator can report
/// them as missing-field errors (400) instead of a rejected body (422).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeBody {
  #[serde(default)]
  pub email:              Option<String>,
  #[serde(default)]
  pub new_password:       String,
  #[serde(default)]
  pub otp_code_or_otp_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
  pub ok:         bool,
  pub user_id:    Uuid,
  pub subject_id: Uuid,
  pub email:      String,
  /// Resubmit this in `otpCodeOrOtpId` to resume after a partial failure.
  pub otp_id:     Uuid,
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// `POST /activation/consultant/finalize`
pub async fn finalize_consultant<S, P, D>(
  State(state): State<AppState<S, P, D>>,
  Json(body): Json<FinalizeBody>,
) -> Result<Json<FinalizeResponse>, ApiError>
where
  S: ActivationStore,
  P: IdentityProvider,
  D: DefaultPractitionerResolver,
{
  finalize(state, SubjectKind::Consultant, body).await
}

/// `POST /activation/patient/finalize`
pub async fn finalize_patient<S, P, D>(
  State(state): State<AppState<S, P, D>>,
  Json(body): Json<FinalizeBody>,
) -> Result<Json<FinalizeResponse>, ApiError>
where
  S: ActivationStore,
  P: IdentityProvider,
  D: DefaultPractitionerResolver,
{
  finalize(state, SubjectKind::Patient, body).await
}

async fn finalize<S, P, D>(
  state: AppState<S, P, D>,
  kind: SubjectKind,
  body: FinalizeBody,
) -> Result<Json<FinalizeResponse>, ApiError>
where
  S: ActivationStore,
  P: IdentityProvider,
  D: DefaultPractitionerResolver,
{
  let outcome = state
    .activation
    .finalize(kind, FinalizeRequest {
      email:        body.email,
      new_password: body.new_password,
      code_or_id:   body.otp_code_or_otp_id,
    })
    .await?;

  Ok(Json(FinalizeResponse {
    ok:         true,
    user_id:    outcome.user_id,
    subject_id: outcome.subject_id,
    email:      outcome.email,
    otp_id:     outcome.code_id,
  }))
}
