//! [`SqliteDirectory`] — a SQLite-backed implementation of the
//! identity-provider boundary.
//!
//! Suits single-box deployments that have no external provider. Credentials
//! are stored as argon2 PHC strings; accounts are created confirmed because
//! the one-time code already proved control of the mailbox.

use std::path::Path;

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use chrono::Utc;
use rand_core::OsRng;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use arnica_core::identity::{IdentityAccount, IdentityProvider, UserPage};

use crate::{
  Error, Result,
  encode::{RawIdentityUser, encode_dt, encode_uuid},
  schema::DIRECTORY_SCHEMA,
};

/// Directory listing page size.
const PAGE_SIZE: u32 = 50;

/// A user directory backed by a single SQLite file.
#[derive(Clone)]
pub struct SqliteDirectory {
  conn: tokio_rusqlite::Connection,
}

impl SqliteDirectory {
  /// Open (or create) a directory at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let directory = Self { conn };
    directory.init_schema().await?;
    Ok(directory)
  }

  /// Open an in-memory directory — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let directory = Self { conn };
    directory.init_schema().await?;
    Ok(directory)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(DIRECTORY_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map(|h| h.to_string())
      .map_err(|e| Error::PasswordHash(e.to_string()))
  }
}

impl IdentityProvider for SqliteDirectory {
  type Error = Error;

  async fn list_users(&self, page: u32) -> Result<UserPage> {
    let limit  = i64::from(PAGE_SIZE) + 1;
    let offset = i64::from(page) * i64::from(PAGE_SIZE);

    let mut raws: Vec<RawIdentityUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT user_id, email FROM identity_users
           ORDER BY created_at ASC
           LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit, offset], |row| {
            Ok(RawIdentityUser {
              user_id: row.get(0)?,
              email:   row.get(1)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    // We fetched one extra row to learn whether another page exists.
    let next = if raws.len() as u32 > PAGE_SIZE {
      raws.truncate(PAGE_SIZE as usize);
      Some(page + 1)
    } else {
      None
    };

    let users = raws
      .into_iter()
      .map(RawIdentityUser::into_account)
      .collect::<Result<Vec<_>>>()?;

    Ok(UserPage { users, next })
  }

  async fn create_user(
    &self,
    email: &str,
    password: &str,
  ) -> Result<IdentityAccount> {
    let account = IdentityAccount {
      user_id: Uuid::new_v4(),
      email:   email.to_owned(),
    };

    let hash       = Self::hash_password(password)?;
    let id_str     = encode_uuid(account.user_id);
    let email_owned = account.email.clone();
    let at_str     = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO identity_users
             (user_id, email, password_hash, confirmed, created_at)
           VALUES (?1, ?2, ?3, 1, ?4)",
          rusqlite::params![id_str, email_owned, hash, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(account)
  }

  async fn update_password(&self, user_id: Uuid, password: &str) -> Result<()> {
    let hash   = Self::hash_password(password)?;
    let id_str = encode_uuid(user_id);

    let affected: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE identity_users SET password_hash = ?2 WHERE user_id = ?1",
          rusqlite::params![id_str, hash],
        )?)
      })
      .await?;

    if affected == 0 {
      return Err(Error::UserNotFound(user_id));
    }
    Ok(())
  }
}

impl SqliteDirectory {
  /// Fetch an account by exact id. Used by tests and operational tooling.
  pub async fn get_user(&self, user_id: Uuid) -> Result<Option<IdentityAccount>> {
    let id_str = encode_uuid(user_id);

    let raw: Option<RawIdentityUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, email FROM identity_users WHERE user_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawIdentityUser {
                  user_id: row.get(0)?,
                  email:   row.get(1)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawIdentityUser::into_account).transpose()
  }

  /// The stored PHC string for an account. Used by tests to observe
  /// credential replacement without exposing a verify operation.
  pub async fn password_hash(&self, user_id: Uuid) -> Result<Option<String>> {
    let id_str = encode_uuid(user_id);

    let hash: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT password_hash FROM identity_users WHERE user_id = ?1",
              rusqlite::params![id_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(hash)
  }
}
