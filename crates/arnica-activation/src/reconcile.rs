//! Subject reconciliation — ensure a profile row exists, is activated, and
//! has an owner.
//!
//! Repair on an existing row is limited to `activated` and
//! `practitioner_id`; content fields of an already-activated profile are
//! never overwritten.

use chrono::Utc;
use arnica_core::{
  code::OneTimeCode,
  invitation::Invitation,
  profile::{SubjectKind, SubjectProfile, name_from_email},
  store::ActivationStore,
};
use uuid::Uuid;

use crate::{ActivationError, owner::DefaultPractitionerResolver};

/// Ensure an activated, owned profile for this activation and return it.
pub async fn ensure_profile<S, D>(
  store: &S,
  fallback: &D,
  kind: SubjectKind,
  subject_id: Option<Uuid>,
  invitation: Option<&Invitation>,
  code: &OneTimeCode,
  email: &str,
) -> Result<SubjectProfile, ActivationError>
where
  S: ActivationStore,
  D: DefaultPractitionerResolver,
{
  if let Some(subject_id) = subject_id {
    let existing = store
      .get_profile(kind, subject_id)
      .await
      .map_err(ActivationError::persistence)?;

    if let Some(mut profile) = existing {
      if !profile.activated {
        store
          .activate_profile(kind, subject_id)
          .await
          .map_err(ActivationError::persistence)?;
        profile.activated = true;
        profile.activated_at = Some(Utc::now());
      }
      if profile.practitioner_id.is_none() {
        let owner = resolve_owner(fallback, invitation, code).await?;
        store
          .set_profile_practitioner(kind, subject_id, owner)
          .await
          .map_err(ActivationError::persistence)?;
        profile.practitioner_id = Some(owner);
      }
      return Ok(profile);
    }

    // Orphaned reference: an id is on record but the row is gone. Recreate
    // it; creating here *is* the activation.
    return create_profile(store, fallback, kind, subject_id, invitation, code, email)
      .await;
  }

  create_profile(store, fallback, kind, Uuid::new_v4(), invitation, code, email)
    .await
}

async fn create_profile<S, D>(
  store: &S,
  fallback: &D,
  kind: SubjectKind,
  subject_id: Uuid,
  invitation: Option<&Invitation>,
  code: &OneTimeCode,
  email: &str,
) -> Result<SubjectProfile, ActivationError>
where
  S: ActivationStore,
  D: DefaultPractitionerResolver,
{
  let owner = resolve_owner(fallback, invitation, code).await?;
  let now = Utc::now();

  let profile = match invitation {
    Some(inv) => SubjectProfile {
      subject_id,
      email: email.to_string(),
      full_name: inv.full_name.clone(),
      first_name: inv.first_name.clone(),
      last_name: inv.last_name.clone(),
      phone: inv.phone.clone(),
      city: inv.city.clone(),
      practitioner_id: Some(owner),
      activated: true,
      activated_at: Some(now),
      created_at: now,
    },
    None => SubjectProfile {
      subject_id,
      email: email.to_string(),
      full_name: name_from_email(email),
      first_name: None,
      last_name: None,
      phone: None,
      city: None,
      practitioner_id: Some(owner),
      activated: true,
      activated_at: Some(now),
      created_at: now,
    },
  };

  store
    .insert_profile(kind, profile.clone())
    .await
    .map_err(ActivationError::persistence)?;
  Ok(profile)
}

/// invitation → code → injected fallback → `NoPractitionerAvailable`.
async fn resolve_owner<D: DefaultPractitionerResolver>(
  fallback: &D,
  invitation: Option<&Invitation>,
  code: &OneTimeCode,
) -> Result<Uuid, ActivationError> {
  if let Some(inv) = invitation {
    return Ok(inv.practitioner_id);
  }
  if let Some(practitioner_id) = code.practitioner_id {
    return Ok(practitioner_id);
  }

  // Last resort. This is a data-driven process-wide default, not a normal
  // path; make it loud so deployments notice.
  tracing::warn!(
    code_id = %code.code_id,
    "no practitioner on invitation or code; using default-practitioner fallback"
  );

  fallback
    .resolve()
    .await
    .map_err(ActivationError::persistence)?
    .ok_or(ActivationError::NoPractitionerAvailable)
}
