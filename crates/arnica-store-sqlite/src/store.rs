//! [`SqliteStore`] — the SQLite implementation of [`ActivationStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use arnica_core::{
  code::{NewOneTimeCode, OneTimeCode},
  invitation::{Invitation, InvitationLookup, InvitationStatus, NewInvitation},
  membership::Membership,
  profile::{NewPractitioner, Practitioner, SubjectKind, SubjectProfile},
  store::ActivationStore,
};

use crate::{
  Error, Result,
  encode::{
    RawCode, RawInvitation, RawMembership, RawPractitioner, RawProfile,
    encode_code_kind, encode_dt, encode_invitation_status, encode_uuid,
  },
  schema::schema,
};

// ─── Row mappers ─────────────────────────────────────────────────────────────

const CODE_COLS: &str = "code_id, email, code, kind, practitioner_id, \
                         subject_id, created_at, expires_at, used, used_at";

const INVITATION_COLS: &str = "invitation_id, subject_id, practitioner_id, \
                               email, full_name, first_name, last_name, phone, \
                               city, invitation_code, status, invited_at, \
                               accepted_at, code_expires_at";

const PROFILE_COLS: &str = "subject_id, email, full_name, first_name, \
                            last_name, phone, city, practitioner_id, \
                            activated, activated_at, created_at";

fn code_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCode> {
  Ok(RawCode {
    code_id:         row.get(0)?,
    email:           row.get(1)?,
    code:            row.get(2)?,
    kind:            row.get(3)?,
    practitioner_id: row.get(4)?,
    subject_id:      row.get(5)?,
    created_at:      row.get(6)?,
    expires_at:      row.get(7)?,
    used:            row.get(8)?,
    used_at:         row.get(9)?,
  })
}

fn invitation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawInvitation> {
  Ok(RawInvitation {
    invitation_id:   row.get(0)?,
    subject_id:      row.get(1)?,
    practitioner_id: row.get(2)?,
    email:           row.get(3)?,
    full_name:       row.get(4)?,
    first_name:      row.get(5)?,
    last_name:       row.get(6)?,
    phone:           row.get(7)?,
    city:            row.get(8)?,
    invitation_code: row.get(9)?,
    status:          row.get(10)?,
    invited_at:      row.get(11)?,
    accepted_at:     row.get(12)?,
    code_expires_at: row.get(13)?,
  })
}

fn profile_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawProfile> {
  Ok(RawProfile {
    subject_id:      row.get(0)?,
    email:           row.get(1)?,
    full_name:       row.get(2)?,
    first_name:      row.get(3)?,
    last_name:       row.get(4)?,
    phone:           row.get(5)?,
    city:            row.get(6)?,
    practitioner_id: row.get(7)?,
    activated:       row.get(8)?,
    activated_at:    row.get(9)?,
    created_at:      row.get(10)?,
  })
}

fn membership_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawMembership> {
  Ok(RawMembership {
    membership_id: row.get(0)?,
    subject_id:    row.get(1)?,
    identity_id:   row.get(2)?,
  })
}

fn practitioner_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<RawPractitioner> {
  Ok(RawPractitioner {
    practitioner_id: row.get(0)?,
    full_name:       row.get(1)?,
    created_at:      row.get(2)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An activation store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let ddl = schema();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&ddl)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ActivationStore impl ────────────────────────────────────────────────────

impl ActivationStore for SqliteStore {
  type Error = Error;

  // ── One-time codes ────────────────────────────────────────────────────────

  async fn claim_code(&self, code: &str) -> Result<Option<OneTimeCode>> {
    let code_val = code.to_owned();
    let now_str  = encode_dt(Utc::now());

    // The claim is a single conditional UPDATE: the subquery pins the newest
    // claimable row and `used = 0` in its WHERE makes two racing claimers
    // resolve to exactly one returned row. No separate read precedes it.
    let sql = format!(
      "UPDATE one_time_codes
       SET used = 1, used_at = ?2
       WHERE code_id = (
         SELECT code_id FROM one_time_codes
         WHERE code = ?1
           AND kind = 'activation'
           AND used = 0
           AND expires_at > ?2
         ORDER BY created_at DESC
         LIMIT 1
       )
       RETURNING {CODE_COLS}"
    );

    let raw: Option<RawCode> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![code_val, now_str], code_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCode::into_code).transpose()
  }

  async fn peek_code(&self, code: &str) -> Result<Option<OneTimeCode>> {
    let code_val = code.to_owned();
    let now_str  = encode_dt(Utc::now());

    // Same predicate as the claim, minus the mutation.
    let sql = format!(
      "SELECT {CODE_COLS} FROM one_time_codes
       WHERE code = ?1
         AND kind = 'activation'
         AND used = 0
         AND expires_at > ?2
       ORDER BY created_at DESC
       LIMIT 1"
    );

    let raw: Option<RawCode> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![code_val, now_str], code_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCode::into_code).transpose()
  }

  async fn get_code(&self, code_id: Uuid) -> Result<Option<OneTimeCode>> {
    let id_str = encode_uuid(code_id);
    let sql = format!("SELECT {CODE_COLS} FROM one_time_codes WHERE code_id = ?1");

    let raw: Option<RawCode> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], code_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCode::into_code).transpose()
  }

  async fn mark_code_used(&self, code_id: Uuid) -> Result<()> {
    let id_str  = encode_uuid(code_id);
    let now_str = encode_dt(Utc::now());

    // `used = 0` keeps the first `used_at` stamp on replays.
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE one_time_codes SET used = 1, used_at = ?2
           WHERE code_id = ?1 AND used = 0",
          rusqlite::params![id_str, now_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn insert_code(&self, input: NewOneTimeCode) -> Result<OneTimeCode> {
    let code = OneTimeCode {
      code_id:         Uuid::new_v4(),
      email:           input.email,
      code:            input.code,
      kind:            input.kind,
      practitioner_id: input.practitioner_id,
      subject_id:      input.subject_id,
      created_at:      Utc::now(),
      expires_at:      input.expires_at,
      used:            false,
      used_at:         None,
    };

    let id_str         = encode_uuid(code.code_id);
    let email          = code.email.clone();
    let code_val       = code.code.clone();
    let kind_str       = encode_code_kind(code.kind).to_owned();
    let practitioner   = code.practitioner_id.map(encode_uuid);
    let subject        = code.subject_id.map(encode_uuid);
    let created_at_str = encode_dt(code.created_at);
    let expires_at_str = encode_dt(code.expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO one_time_codes (
             code_id, email, code, kind, practitioner_id, subject_id,
             created_at, expires_at, used, used_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, NULL)",
          rusqlite::params![
            id_str,
            email,
            code_val,
            kind_str,
            practitioner,
            subject,
            created_at_str,
            expires_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(code)
  }

  // ── Invitations ───────────────────────────────────────────────────────────

  async fn find_invitation(
    &self,
    kind: SubjectKind,
    lookup: &InvitationLookup,
  ) -> Result<Option<Invitation>> {
    let table  = kind.tables().invitations;
    let lookup = lookup.clone();

    let raw: Option<RawInvitation> = self
      .conn
      .call(move |conn| {
        let tail = format!(
          "AND status = '{}' ORDER BY invited_at DESC LIMIT 1",
          encode_invitation_status(InvitationStatus::Pending)
        );
        let row = match &lookup {
          InvitationLookup::BySubject(subject_id) => conn
            .query_row(
              &format!(
                "SELECT {INVITATION_COLS} FROM {table}
                 WHERE subject_id = ?1 {tail}"
              ),
              rusqlite::params![encode_uuid(*subject_id)],
              invitation_row,
            )
            .optional()?,
          InvitationLookup::ByEmailAndPractitioner {
            email,
            practitioner_id,
          } => conn
            .query_row(
              &format!(
                "SELECT {INVITATION_COLS} FROM {table}
                 WHERE lower(email) = lower(?1) AND practitioner_id = ?2 {tail}"
              ),
              rusqlite::params![email, encode_uuid(*practitioner_id)],
              invitation_row,
            )
            .optional()?,
          InvitationLookup::ByEmail(email) => conn
            .query_row(
              &format!(
                "SELECT {INVITATION_COLS} FROM {table}
                 WHERE lower(email) = lower(?1) {tail}"
              ),
              rusqlite::params![email],
              invitation_row,
            )
            .optional()?,
          InvitationLookup::ByCode(code) => conn
            .query_row(
              &format!(
                "SELECT {INVITATION_COLS} FROM {table}
                 WHERE invitation_code = ?1 {tail}"
              ),
              rusqlite::params![code],
              invitation_row,
            )
            .optional()?,
        };
        Ok(row)
      })
      .await?;

    raw.map(RawInvitation::into_invitation).transpose()
  }

  async fn mark_invitation_accepted(
    &self,
    kind: SubjectKind,
    invitation_id: Uuid,
  ) -> Result<()> {
    let table    = kind.tables().invitations;
    let id_str   = encode_uuid(invitation_id);
    let now_str  = encode_dt(Utc::now());
    let accepted = encode_invitation_status(InvitationStatus::Accepted);
    let pending  = encode_invitation_status(InvitationStatus::Pending);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "UPDATE {table} SET status = ?3, accepted_at = ?2
             WHERE invitation_id = ?1 AND status = ?4"
          ),
          rusqlite::params![id_str, now_str, accepted, pending],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn insert_invitation(
    &self,
    kind: SubjectKind,
    input: NewInvitation,
  ) -> Result<Invitation> {
    let invitation = Invitation {
      invitation_id:   Uuid::new_v4(),
      subject_id:      input.subject_id,
      practitioner_id: input.practitioner_id,
      email:           input.email,
      full_name:       input.full_name,
      first_name:      input.first_name,
      last_name:       input.last_name,
      phone:           input.phone,
      city:            input.city,
      invitation_code: input.invitation_code,
      status:          InvitationStatus::Pending,
      invited_at:      Utc::now(),
      accepted_at:     None,
      code_expires_at: input.code_expires_at,
    };

    let table          = kind.tables().invitations;
    let id_str         = encode_uuid(invitation.invitation_id);
    let subject        = invitation.subject_id.map(encode_uuid);
    let practitioner   = encode_uuid(invitation.practitioner_id);
    let email          = invitation.email.clone();
    let full_name      = invitation.full_name.clone();
    let first_name     = invitation.first_name.clone();
    let last_name      = invitation.last_name.clone();
    let phone          = invitation.phone.clone();
    let city           = invitation.city.clone();
    let code           = invitation.invitation_code.clone();
    let status_str     = encode_invitation_status(invitation.status);
    let invited_at_str = encode_dt(invitation.invited_at);
    let expires_str    = encode_dt(invitation.code_expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO {table} (
               invitation_id, subject_id, practitioner_id, email, full_name,
               first_name, last_name, phone, city, invitation_code,
               status, invited_at, accepted_at, code_expires_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                       ?11, ?12, NULL, ?13)"
          ),
          rusqlite::params![
            id_str,
            subject,
            practitioner,
            email,
            full_name,
            first_name,
            last_name,
            phone,
            city,
            code,
            status_str,
            invited_at_str,
            expires_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(invitation)
  }

  // ── Subject profiles ──────────────────────────────────────────────────────

  async fn get_profile(
    &self,
    kind: SubjectKind,
    subject_id: Uuid,
  ) -> Result<Option<SubjectProfile>> {
    let table  = kind.tables().profiles;
    let id_str = encode_uuid(subject_id);
    let sql = format!("SELECT {PROFILE_COLS} FROM {table} WHERE subject_id = ?1");

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], profile_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn find_profile_by_email(
    &self,
    kind: SubjectKind,
    email: &str,
  ) -> Result<Option<SubjectProfile>> {
    let table = kind.tables().profiles;
    let email = email.to_owned();
    let sql = format!(
      "SELECT {PROFILE_COLS} FROM {table}
       WHERE lower(email) = lower(?1)
       ORDER BY created_at DESC
       LIMIT 1"
    );

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![email], profile_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn insert_profile(
    &self,
    kind: SubjectKind,
    profile: SubjectProfile,
  ) -> Result<()> {
    let table            = kind.tables().profiles;
    let id_str           = encode_uuid(profile.subject_id);
    let email            = profile.email;
    let full_name        = profile.full_name;
    let first_name       = profile.first_name;
    let last_name        = profile.last_name;
    let phone            = profile.phone;
    let city             = profile.city;
    let practitioner     = profile.practitioner_id.map(encode_uuid);
    let activated        = profile.activated;
    let activated_at_str = profile.activated_at.map(encode_dt);
    let created_at_str   = encode_dt(profile.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO {table} (
               subject_id, email, full_name, first_name, last_name, phone,
               city, practitioner_id, activated, activated_at, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
          ),
          rusqlite::params![
            id_str,
            email,
            full_name,
            first_name,
            last_name,
            phone,
            city,
            practitioner,
            activated,
            activated_at_str,
            created_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn activate_profile(
    &self,
    kind: SubjectKind,
    subject_id: Uuid,
  ) -> Result<()> {
    let table   = kind.tables().profiles;
    let id_str  = encode_uuid(subject_id);
    let now_str = encode_dt(Utc::now());

    // `activated = 0` guard: the flag never reverts and the first
    // `activated_at` stamp is preserved.
    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "UPDATE {table} SET activated = 1, activated_at = ?2
             WHERE subject_id = ?1 AND activated = 0"
          ),
          rusqlite::params![id_str, now_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn set_profile_practitioner(
    &self,
    kind: SubjectKind,
    subject_id: Uuid,
    practitioner_id: Uuid,
  ) -> Result<()> {
    let table      = kind.tables().profiles;
    let id_str     = encode_uuid(subject_id);
    let practition = encode_uuid(practitioner_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "UPDATE {table} SET practitioner_id = ?2 WHERE subject_id = ?1"
          ),
          rusqlite::params![id_str, practition],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Memberships ───────────────────────────────────────────────────────────

  async fn get_membership(
    &self,
    kind: SubjectKind,
    subject_id: Uuid,
  ) -> Result<Option<Membership>> {
    let table  = kind.tables().memberships;
    let id_str = encode_uuid(subject_id);
    let sql = format!(
      "SELECT membership_id, subject_id, identity_id FROM {table}
       WHERE subject_id = ?1"
    );

    let raw: Option<RawMembership> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], membership_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMembership::into_membership).transpose()
  }

  async fn insert_membership(
    &self,
    kind: SubjectKind,
    membership: Membership,
  ) -> Result<()> {
    let table       = kind.tables().memberships;
    let id_str      = encode_uuid(membership.membership_id);
    let subject_str = encode_uuid(membership.subject_id);
    let user_str    = encode_uuid(membership.identity_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO {table} (membership_id, subject_id, identity_id)
             VALUES (?1, ?2, ?3)"
          ),
          rusqlite::params![id_str, subject_str, user_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn update_membership_identity(
    &self,
    kind: SubjectKind,
    membership_id: Uuid,
    identity_id: Uuid,
  ) -> Result<()> {
    let table    = kind.tables().memberships;
    let id_str   = encode_uuid(membership_id);
    let user_str = encode_uuid(identity_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "UPDATE {table} SET identity_id = ?2 WHERE membership_id = ?1"
          ),
          rusqlite::params![id_str, user_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Practitioners ─────────────────────────────────────────────────────────

  async fn oldest_practitioner(&self) -> Result<Option<Practitioner>> {
    let raw: Option<RawPractitioner> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT practitioner_id, full_name, created_at
               FROM practitioners
               ORDER BY created_at ASC
               LIMIT 1",
              [],
              practitioner_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPractitioner::into_practitioner).transpose()
  }

  async fn insert_practitioner(
    &self,
    input: NewPractitioner,
  ) -> Result<Practitioner> {
    let practitioner = Practitioner {
      practitioner_id: Uuid::new_v4(),
      full_name:       input.full_name,
      created_at:      Utc::now(),
    };

    let id_str    = encode_uuid(practitioner.practitioner_id);
    let full_name = practitioner.full_name.clone();
    let at_str    = encode_dt(practitioner.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO practitioners (practitioner_id, full_name, created_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, full_name, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(practitioner)
  }
}
