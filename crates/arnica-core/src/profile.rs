//! Subject profiles and the subject-kind strategy.
//!
//! Consultants and patients are structurally identical but live in separate
//! table families. [`SubjectKind`] is the strategy value that selects the
//! family; one shared activation flow consumes it instead of two parallel
//! code paths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Subject kind ────────────────────────────────────────────────────────────

/// The kind of subject being activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
  Consultant,
  Patient,
}

/// Table names for one subject-kind family. Storage backends key their
/// statements off this instead of branching on the kind.
#[derive(Debug, Clone, Copy)]
pub struct SubjectTables {
  pub profiles:    &'static str,
  pub invitations: &'static str,
  pub memberships: &'static str,
}

impl SubjectKind {
  pub fn tables(self) -> SubjectTables {
    match self {
      SubjectKind::Consultant => SubjectTables {
        profiles:    "consultant_profiles",
        invitations: "consultant_invitations",
        memberships: "consultant_memberships",
      },
      SubjectKind::Patient => SubjectTables {
        profiles:    "patient_profiles",
        invitations: "patient_invitations",
        memberships: "patient_memberships",
      },
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      SubjectKind::Consultant => "consultant",
      SubjectKind::Patient => "patient",
    }
  }
}

// ─── Subject profile ─────────────────────────────────────────────────────────

/// A consultant-or-patient profile row.
///
/// Lifecycle: absent → pending (`activated = false`) → activated; the flag
/// never reverts. `practitioner_id` is optional in the row so a missing owner
/// can be observed and backfilled rather than silently defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectProfile {
  pub subject_id:      Uuid,
  pub email:           String,
  pub full_name:       String,
  pub first_name:      Option<String>,
  pub last_name:       Option<String>,
  pub phone:           Option<String>,
  pub city:            Option<String>,
  pub practitioner_id: Option<Uuid>,
  pub activated:       bool,
  pub activated_at:    Option<DateTime<Utc>>,
  pub created_at:      DateTime<Utc>,
}

/// Derive a display name from an email's local part, for profiles created
/// without an invitation to draw fields from.
pub fn name_from_email(email: &str) -> String {
  email
    .split('@')
    .next()
    .filter(|s| !s.is_empty())
    .unwrap_or(email)
    .to_string()
}

// ─── Practitioner ────────────────────────────────────────────────────────────

/// A practitioner, modeled only as far as profile ownership needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Practitioner {
  pub practitioner_id: Uuid,
  pub full_name:       String,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::ActivationStore::insert_practitioner`].
#[derive(Debug, Clone)]
pub struct NewPractitioner {
  pub full_name: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn name_from_email_takes_local_part() {
    assert_eq!(name_from_email("alice.b@example.com"), "alice.b");
  }

  #[test]
  fn name_from_email_degrades_to_whole_string() {
    assert_eq!(name_from_email("@example.com"), "@example.com");
    assert_eq!(name_from_email("no-at-sign"), "no-at-sign");
  }

  #[test]
  fn table_families_do_not_overlap() {
    let c = SubjectKind::Consultant.tables();
    let p = SubjectKind::Patient.tables();
    assert_ne!(c.profiles, p.profiles);
    assert_ne!(c.invitations, p.invitations);
    assert_ne!(c.memberships, p.memberships);
  }
}
