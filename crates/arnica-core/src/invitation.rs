//! Invitations and the ordered lookup chain used to resolve them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::code::OneTimeCode;

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
  Pending,
  Accepted,
}

// ─── Invitation ──────────────────────────────────────────────────────────────

/// A practitioner's invitation for a subject to activate an account.
///
/// More than one may exist per (email, practitioner) over time; only the
/// most recently invited `pending` row is authoritative at redemption time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
  pub invitation_id:   Uuid,
  pub subject_id:      Option<Uuid>,
  pub practitioner_id: Uuid,
  pub email:           String,
  pub full_name:       String,
  pub first_name:      Option<String>,
  pub last_name:       Option<String>,
  pub phone:           Option<String>,
  pub city:            Option<String>,
  pub invitation_code: String,
  pub status:          InvitationStatus,
  pub invited_at:      DateTime<Utc>,
  pub accepted_at:     Option<DateTime<Utc>>,
  pub code_expires_at: DateTime<Utc>,
}

/// Input to [`crate::store::ActivationStore::insert_invitation`].
/// `invited_at` is set by the store; status starts `Pending`.
#[derive(Debug, Clone)]
pub struct NewInvitation {
  pub subject_id:      Option<Uuid>,
  pub practitioner_id: Uuid,
  pub email:           String,
  pub full_name:       String,
  pub first_name:      Option<String>,
  pub last_name:       Option<String>,
  pub phone:           Option<String>,
  pub city:            Option<String>,
  pub invitation_code: String,
  pub code_expires_at: DateTime<Utc>,
}

// ─── Lookup chain ────────────────────────────────────────────────────────────

/// One rung of the invitation fallback chain.
///
/// Every rung is implicitly scoped to `status = pending` with the latest
/// `invited_at` winning. The chain is data, not control flow, so each rung
/// can be enumerated and tested on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvitationLookup {
  BySubject(Uuid),
  ByEmailAndPractitioner {
    email:           String,
    practitioner_id: Uuid,
  },
  ByEmail(String),
  ByCode(String),
}

/// Build the ordered chain for a claimed code. First hit wins; rungs whose
/// inputs are absent on the code are skipped.
pub fn lookup_chain(code: &OneTimeCode, email: &str) -> Vec<InvitationLookup> {
  let mut chain = Vec::with_capacity(4);
  if let Some(subject_id) = code.subject_id {
    chain.push(InvitationLookup::BySubject(subject_id));
  }
  if let Some(practitioner_id) = code.practitioner_id {
    chain.push(InvitationLookup::ByEmailAndPractitioner {
      email: email.to_string(),
      practitioner_id,
    });
  }
  chain.push(InvitationLookup::ByEmail(email.to_string()));
  chain.push(InvitationLookup::ByCode(code.code.clone()));
  chain
}
