//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so lexicographic comparison in SQL matches
//! chronological order. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use arnica_core::{
  code::{CodeKind, OneTimeCode},
  identity::IdentityAccount,
  invitation::{Invitation, InvitationStatus},
  membership::Membership,
  profile::{Practitioner, SubjectProfile},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_uuid_opt(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_dt_opt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── CodeKind ────────────────────────────────────────────────────────────────

pub fn encode_code_kind(k: CodeKind) -> &'static str {
  match k {
    CodeKind::Activation => "activation",
  }
}

pub fn decode_code_kind(s: &str) -> Result<CodeKind> {
  match s {
    "activation" => Ok(CodeKind::Activation),
    other => Err(Error::UnknownDiscriminant(format!("code kind: {other:?}"))),
  }
}

// ─── InvitationStatus ────────────────────────────────────────────────────────

pub fn encode_invitation_status(s: InvitationStatus) -> &'static str {
  match s {
    InvitationStatus::Pending => "pending",
    InvitationStatus::Accepted => "accepted",
  }
}

pub fn decode_invitation_status(s: &str) -> Result<InvitationStatus> {
  match s {
    "pending" => Ok(InvitationStatus::Pending),
    "accepted" => Ok(InvitationStatus::Accepted),
    other => Err(Error::UnknownDiscriminant(format!(
      "invitation status: {other:?}"
    ))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `one_time_codes` row.
pub struct RawCode {
  pub code_id:         String,
  pub email:           String,
  pub code:            String,
  pub kind:            String,
  pub practitioner_id: Option<String>,
  pub subject_id:      Option<String>,
  pub created_at:      String,
  pub expires_at:      String,
  pub used:            bool,
  pub used_at:         Option<String>,
}

impl RawCode {
  pub fn into_code(self) -> Result<OneTimeCode> {
    Ok(OneTimeCode {
      code_id:         decode_uuid(&self.code_id)?,
      email:           self.email,
      code:            self.code,
      kind:            decode_code_kind(&self.kind)?,
      practitioner_id: decode_uuid_opt(self.practitioner_id.as_deref())?,
      subject_id:      decode_uuid_opt(self.subject_id.as_deref())?,
      created_at:      decode_dt(&self.created_at)?,
      expires_at:      decode_dt(&self.expires_at)?,
      used:            self.used,
      used_at:         decode_dt_opt(self.used_at.as_deref())?,
    })
  }
}

/// Raw strings read directly from a `*_invitations` row.
pub struct RawInvitation {
  pub invitation_id:   String,
  pub subject_id:      Option<String>,
  pub practitioner_id: String,
  pub email:           String,
  pub full_name:       String,
  pub first_name:      Option<String>,
  pub last_name:       Option<String>,
  pub phone:           Option<String>,
  pub city:            Option<String>,
  pub invitation_code: String,
  pub status:          String,
  pub invited_at:      String,
  pub accepted_at:     Option<String>,
  pub code_expires_at: String,
}

impl RawInvitation {
  pub fn into_invitation(self) -> Result<Invitation> {
    Ok(Invitation {
      invitation_id:   decode_uuid(&self.invitation_id)?,
      subject_id:      decode_uuid_opt(self.subject_id.as_deref())?,
      practitioner_id: decode_uuid(&self.practitioner_id)?,
      email:           self.email,
      full_name:       self.full_name,
      first_name:      self.first_name,
      last_name:       self.last_name,
      phone:           self.phone,
      city:            self.city,
      invitation_code: self.invitation_code,
      status:          decode_invitation_status(&self.status)?,
      invited_at:      decode_dt(&self.invited_at)?,
      accepted_at:     decode_dt_opt(self.accepted_at.as_deref())?,
      code_expires_at: decode_dt(&self.code_expires_at)?,
    })
  }
}

/// Raw strings read directly from a `*_profiles` row.
pub struct RawProfile {
  pub subject_id:      String,
  pub email:           String,
  pub full_name:       String,
  pub first_name:      Option<String>,
  pub last_name:       Option<String>,
  pub phone:           Option<String>,
  pub city:            Option<String>,
  pub practitioner_id: Option<String>,
  pub activated:       bool,
  pub activated_at:    Option<String>,
  pub created_at:      String,
}

impl RawProfile {
  pub fn into_profile(self) -> Result<SubjectProfile> {
    Ok(SubjectProfile {
      subject_id:      decode_uuid(&self.subject_id)?,
      email:           self.email,
      full_name:       self.full_name,
      first_name:      self.first_name,
      last_name:       self.last_name,
      phone:           self.phone,
      city:            self.city,
      practitioner_id: decode_uuid_opt(self.practitioner_id.as_deref())?,
      activated:       self.activated,
      activated_at:    decode_dt_opt(self.activated_at.as_deref())?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `*_memberships` row.
pub struct RawMembership {
  pub membership_id: String,
  pub subject_id:    String,
  pub identity_id:   String,
}

impl RawMembership {
  pub fn into_membership(self) -> Result<Membership> {
    Ok(Membership {
      membership_id: decode_uuid(&self.membership_id)?,
      subject_id:    decode_uuid(&self.subject_id)?,
      identity_id:   decode_uuid(&self.identity_id)?,
    })
  }
}

/// Raw strings read directly from a `practitioners` row.
pub struct RawPractitioner {
  pub practitioner_id: String,
  pub full_name:       String,
  pub created_at:      String,
}

impl RawPractitioner {
  pub fn into_practitioner(self) -> Result<Practitioner> {
    Ok(Practitioner {
      practitioner_id: decode_uuid(&self.practitioner_id)?,
      full_name:       self.full_name,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `identity_users` row.
pub struct RawIdentityUser {
  pub user_id: String,
  pub email:   String,
}

impl RawIdentityUser {
  pub fn into_account(self) -> Result<IdentityAccount> {
    Ok(IdentityAccount {
      user_id: decode_uuid(&self.user_id)?,
      email:   self.email,
    })
  }
}
