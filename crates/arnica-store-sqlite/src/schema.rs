//! SQL schema for the Arnica SQLite store.
//!
//! Consultants and patients share one shape but live in separate table
//! families; the two families are created from the same template so they
//! cannot drift.

/// DDL template for one subject-kind family. `{prefix}` is substituted with
/// `consultant` or `patient`.
const FAMILY_TEMPLATE: &str = "
CREATE TABLE IF NOT EXISTS {prefix}_profiles (
    subject_id      TEXT PRIMARY KEY,
    email           TEXT NOT NULL,
    full_name       TEXT NOT NULL,
    first_name      TEXT,
    last_name       TEXT,
    phone           TEXT,
    city            TEXT,
    practitioner_id TEXT,            -- NULL = orphaned, backfilled on activation
    activated       INTEGER NOT NULL DEFAULT 0,
    activated_at    TEXT,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS {prefix}_invitations (
    invitation_id   TEXT PRIMARY KEY,
    subject_id      TEXT,
    practitioner_id TEXT NOT NULL,
    email           TEXT NOT NULL,
    full_name       TEXT NOT NULL,
    first_name      TEXT,
    last_name       TEXT,
    phone           TEXT,
    city            TEXT,
    invitation_code TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'pending',  -- 'pending' | 'accepted'
    invited_at      TEXT NOT NULL,
    accepted_at     TEXT,
    code_expires_at TEXT NOT NULL
);

-- Exactly one membership per subject profile.
CREATE TABLE IF NOT EXISTS {prefix}_memberships (
    membership_id TEXT PRIMARY KEY,
    subject_id    TEXT NOT NULL UNIQUE,
    identity_id   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS {prefix}_profiles_email_idx
    ON {prefix}_profiles(email);
CREATE INDEX IF NOT EXISTS {prefix}_invitations_email_idx
    ON {prefix}_invitations(email, status);
";

const SHARED: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS practitioners (
    practitioner_id TEXT PRIMARY KEY,
    full_name       TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

-- One-time codes are never deleted; expired unused rows are inert.
-- `used` flips 0 -> 1 exactly once, inside the atomic claim statement.
CREATE TABLE IF NOT EXISTS one_time_codes (
    code_id         TEXT PRIMARY KEY,
    email           TEXT NOT NULL,
    code            TEXT NOT NULL,   -- the 6-digit value
    kind            TEXT NOT NULL,   -- 'activation'
    practitioner_id TEXT,            -- absent on stale rows
    subject_id      TEXT,
    created_at      TEXT NOT NULL,
    expires_at      TEXT NOT NULL,
    used            INTEGER NOT NULL DEFAULT 0,
    used_at         TEXT
);

CREATE INDEX IF NOT EXISTS one_time_codes_code_idx
    ON one_time_codes(code, used, expires_at);

PRAGMA user_version = 1;
";

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub fn schema() -> String {
  let mut ddl = String::from(SHARED);
  for prefix in ["consultant", "patient"] {
    ddl.push_str(&FAMILY_TEMPLATE.replace("{prefix}", prefix));
  }
  ddl
}

/// Schema for the local identity directory. Kept separate so the directory
/// can live in its own database file when deployed against an external
/// provider instead.
pub const DIRECTORY_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS identity_users (
    user_id       TEXT PRIMARY KEY,
    email         TEXT NOT NULL,
    password_hash TEXT NOT NULL,    -- argon2 PHC string
    confirmed     INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS identity_users_email_idx ON identity_users(email);
";
