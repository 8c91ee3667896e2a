//! The `ActivationStore` trait.
//!
//! Implemented by storage backends (e.g. `arnica-store-sqlite`). Higher
//! layers (`arnica-activation`, `arnica-api`) depend on this abstraction,
//! not on any concrete backend.
//!
//! All methods return `Send` futures so the trait can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use uuid::Uuid;

use crate::{
  code::{NewOneTimeCode, OneTimeCode},
  invitation::{Invitation, InvitationLookup, NewInvitation},
  membership::Membership,
  profile::{NewPractitioner, Practitioner, SubjectKind, SubjectProfile},
};

/// Abstraction over the relational store backing activation.
///
/// The only operation with an atomicity contract is [`claim_code`]: it must
/// read and mark a code row in one conditional step so two concurrent
/// redemptions of the same 6-digit code cannot both succeed. Everything
/// else is plain row-level read/insert/update.
///
/// [`claim_code`]: ActivationStore::claim_code
pub trait ActivationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── One-time codes ────────────────────────────────────────────────────

  /// Atomically claim the most recent unused, unexpired activation code
  /// with this 6-digit value: mark it used, stamp `used_at`, and return it.
  ///
  /// Of two concurrent claimers exactly one receives `Some`; the loser
  /// observes `None` and must treat the code as invalid.
  fn claim_code<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<Option<OneTimeCode>, Self::Error>> + Send + 'a;

  /// Read-only counterpart of [`claim_code`]: the row it would claim, with
  /// no mutation. Lets callers validate the request (e.g. the email check)
  /// before spending the code. Racing claimers are still arbitrated by
  /// [`claim_code`] alone.
  ///
  /// [`claim_code`]: ActivationStore::claim_code
  fn peek_code<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<Option<OneTimeCode>, Self::Error>> + Send + 'a;

  /// Fetch a code row by id, ignoring `used` and expiry — the resumption
  /// path for continuing a previously-claimed activation.
  fn get_code(
    &self,
    code_id: Uuid,
  ) -> impl Future<Output = Result<Option<OneTimeCode>, Self::Error>> + Send + '_;

  /// Mark a code used and stamp `used_at`. Terminal bookkeeping for the
  /// resumption path; the by-code path marks inside [`claim_code`] instead.
  ///
  /// [`claim_code`]: ActivationStore::claim_code
  fn mark_code_used(
    &self,
    code_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Persist a new unused code. Used by the invitation-send flow and by
  /// tests; `created_at` is set by the store.
  fn insert_code(
    &self,
    input: NewOneTimeCode,
  ) -> impl Future<Output = Result<OneTimeCode, Self::Error>> + Send + '_;

  // ── Invitations ───────────────────────────────────────────────────────

  /// Evaluate one rung of the invitation fallback chain: the latest
  /// `pending` invitation matching `lookup`, or `None`.
  fn find_invitation<'a>(
    &'a self,
    kind: SubjectKind,
    lookup: &'a InvitationLookup,
  ) -> impl Future<Output = Result<Option<Invitation>, Self::Error>> + Send + 'a;

  /// Transition an invitation to `accepted` and stamp `accepted_at`.
  fn mark_invitation_accepted(
    &self,
    kind: SubjectKind,
    invitation_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Persist a new pending invitation. Used by the invitation-send flow and
  /// by tests; `invited_at` is set by the store.
  fn insert_invitation(
    &self,
    kind: SubjectKind,
    input: NewInvitation,
  ) -> impl Future<Output = Result<Invitation, Self::Error>> + Send + '_;

  // ── Subject profiles ──────────────────────────────────────────────────

  fn get_profile(
    &self,
    kind: SubjectKind,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Option<SubjectProfile>, Self::Error>> + Send + '_;

  /// The most recently created profile with this email (case-insensitive).
  fn find_profile_by_email<'a>(
    &'a self,
    kind: SubjectKind,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<SubjectProfile>, Self::Error>> + Send + 'a;

  fn insert_profile(
    &self,
    kind: SubjectKind,
    profile: SubjectProfile,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Set `activated = true` and stamp `activated_at`. The flag never
  /// reverts; re-activating an activated profile is a no-op.
  fn activate_profile(
    &self,
    kind: SubjectKind,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Backfill the owning practitioner. Content fields are never touched.
  fn set_profile_practitioner(
    &self,
    kind: SubjectKind,
    subject_id: Uuid,
    practitioner_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Memberships ───────────────────────────────────────────────────────

  fn get_membership(
    &self,
    kind: SubjectKind,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Option<Membership>, Self::Error>> + Send + '_;

  fn insert_membership(
    &self,
    kind: SubjectKind,
    membership: Membership,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Point an existing membership at a different identity account (repair,
  /// never duplicate).
  fn update_membership_identity(
    &self,
    kind: SubjectKind,
    membership_id: Uuid,
    identity_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Practitioners ─────────────────────────────────────────────────────

  /// The earliest-created practitioner, if any exist at all.
  fn oldest_practitioner(
    &self,
  ) -> impl Future<Output = Result<Option<Practitioner>, Self::Error>> + Send + '_;

  /// Persist a practitioner. Used by deployment setup and by tests.
  fn insert_practitioner(
    &self,
    input: NewPractitioner,
  ) -> impl Future<Output = Result<Practitioner, Self::Error>> + Send + '_;
}
