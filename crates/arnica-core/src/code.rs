//! One-time codes and redemption parsing.
//!
//! A code row is written by the invitation-send flow and mutated exactly
//! once, atomically, from unused to used by the claim operation. Rows are
//! never deleted; an expired unused code is simply inert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Code kind ───────────────────────────────────────────────────────────────

/// What a one-time code authorizes. Only activation codes are claimable by
/// this subsystem; other kinds issued upstream are ignored by the claim query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeKind {
  Activation,
}

// ─── One-time code ───────────────────────────────────────────────────────────

/// A one-time activation code, delivered to the subject by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneTimeCode {
  pub code_id:         Uuid,
  pub email:           String,
  /// The 6-digit value the user types in.
  pub code:            String,
  pub kind:            CodeKind,
  /// Absent on stale rows; the reconciler backfills an owner downstream.
  pub practitioner_id: Option<Uuid>,
  pub subject_id:      Option<Uuid>,
  pub created_at:      DateTime<Utc>,
  pub expires_at:      DateTime<Utc>,
  pub used:            bool,
  pub used_at:         Option<DateTime<Utc>>,
}

/// Input to [`crate::store::ActivationStore::insert_code`].
/// `created_at` is set by the store; `used` starts false.
#[derive(Debug, Clone)]
pub struct NewOneTimeCode {
  pub email:           String,
  pub code:            String,
  pub kind:            CodeKind,
  pub practitioner_id: Option<Uuid>,
  pub subject_id:      Option<Uuid>,
  pub expires_at:      DateTime<Utc>,
}

// ─── Redemption ──────────────────────────────────────────────────────────────

/// How the caller identified the code in a finalize request.
///
/// Exactly six ASCII digits are a [`Redemption::Code`], gated on `used` and
/// expiry by the atomic claim. Anything else must parse as a code row id:
/// the resumption path, exempt from both checks so an in-flight activation
/// can be continued after a mid-sequence failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redemption {
  Code(String),
  Resume(Uuid),
}

impl Redemption {
  pub fn parse(raw: &str) -> Result<Self> {
    if raw.len() == 6 && raw.bytes().all(|b| b.is_ascii_digit()) {
      return Ok(Redemption::Code(raw.to_string()));
    }
    Uuid::parse_str(raw)
      .map(Redemption::Resume)
      .map_err(|_| Error::MalformedRedemption(raw.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn six_digits_parse_as_code() {
    assert_eq!(
      Redemption::parse("042137").unwrap(),
      Redemption::Code("042137".into())
    );
  }

  #[test]
  fn uuid_parses_as_resume() {
    let id = Uuid::new_v4();
    assert_eq!(
      Redemption::parse(&id.to_string()).unwrap(),
      Redemption::Resume(id)
    );
  }

  #[test]
  fn five_digits_are_not_a_code() {
    assert!(matches!(
      Redemption::parse("12345"),
      Err(Error::MalformedRedemption(_))
    ));
  }

  #[test]
  fn seven_digits_are_not_a_code() {
    assert!(Redemption::parse("1234567").is_err());
  }

  #[test]
  fn garbage_is_rejected() {
    assert!(Redemption::parse("abc123").is_err());
    assert!(Redemption::parse("").is_err());
  }
}
