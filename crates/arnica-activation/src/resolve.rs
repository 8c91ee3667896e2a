//! Invitation and subject-id resolution.
//!
//! Both resolvers walk an ordered fallback chain and take the first hit.
//! The invitation chain itself is built by
//! [`arnica_core::invitation::lookup_chain`]; this module only evaluates it
//! against the store.

use arnica_core::{
  code::OneTimeCode,
  invitation::{Invitation, InvitationLookup, lookup_chain},
  profile::SubjectKind,
  store::ActivationStore,
};
use uuid::Uuid;

use crate::ActivationError;

/// Find the best-matching pending invitation for a claimed code, or `None`.
///
/// `None` is not an error: the profile can still be built from the code
/// alone, but nothing will be marked accepted.
pub async fn resolve_invitation<S: ActivationStore>(
  store: &S,
  kind: SubjectKind,
  code: &OneTimeCode,
  email: &str,
) -> Result<Option<Invitation>, ActivationError> {
  for lookup in lookup_chain(code, email) {
    let found = store
      .find_invitation(kind, &lookup)
      .await
      .map_err(ActivationError::persistence)?;

    if let Some(invitation) = found {
      // The email-only rung can cross practitioners; surface it for audit.
      if matches!(lookup, InvitationLookup::ByEmail(_))
        && code.practitioner_id.is_some()
        && code.practitioner_id != Some(invitation.practitioner_id)
      {
        tracing::warn!(
          code_practitioner = ?code.practitioner_id,
          invitation_practitioner = %invitation.practitioner_id,
          invitation_id = %invitation.invitation_id,
          "invitation matched by email across practitioners"
        );
      }
      return Ok(Some(invitation));
    }
  }
  Ok(None)
}

/// Resolve the subject id for this activation:
/// code → invitation → profile-by-email → `None`.
///
/// `None` is legal — a brand-new profile gets a fresh id downstream.
pub async fn resolve_subject_id<S: ActivationStore>(
  store: &S,
  kind: SubjectKind,
  code: &OneTimeCode,
  invitation: Option<&Invitation>,
  email: &str,
) -> Result<Option<Uuid>, ActivationError> {
  if let Some(subject_id) = code.subject_id {
    return Ok(Some(subject_id));
  }
  if let Some(subject_id) = invitation.and_then(|i| i.subject_id) {
    return Ok(Some(subject_id));
  }
  Ok(
    store
      .find_profile_by_email(kind, email)
      .await
      .map_err(ActivationError::persistence)?
      .map(|p| p.subject_id),
  )
}
