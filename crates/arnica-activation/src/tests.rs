//! End-to-end orchestration tests against in-memory SQLite.

use std::sync::Arc;

use chrono::{Duration, Utc};
use arnica_core::{
  code::{CodeKind, NewOneTimeCode},
  identity::{IdentityAccount, IdentityProvider, UserPage, find_by_email},
  invitation::NewInvitation,
  membership::Membership,
  profile::{NewPractitioner, SubjectKind, SubjectProfile},
  store::ActivationStore,
};
use arnica_store_sqlite::{SqliteDirectory, SqliteStore};
use uuid::Uuid;

use crate::{
  Activation, ActivationError, FinalizeRequest, NoDefaultPractitioner,
  OldestPractitioner,
};

type Service =
  Activation<SqliteStore, SqliteDirectory, OldestPractitioner<SqliteStore>>;

async fn setup() -> (Arc<SqliteStore>, Arc<SqliteDirectory>, Service) {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let directory = Arc::new(SqliteDirectory::open_in_memory().await.unwrap());
  let service = Activation::new(
    store.clone(),
    directory.clone(),
    OldestPractitioner::new(store.clone()),
  );
  (store, directory, service)
}

fn new_code(
  email: &str,
  code: &str,
  practitioner_id: Option<Uuid>,
  subject_id: Option<Uuid>,
) -> NewOneTimeCode {
  NewOneTimeCode {
    email: email.into(),
    code: code.into(),
    kind: CodeKind::Activation,
    practitioner_id,
    subject_id,
    expires_at: Utc::now() + Duration::hours(1),
  }
}

fn new_invitation(email: &str, practitioner_id: Uuid) -> NewInvitation {
  NewInvitation {
    subject_id: None,
    practitioner_id,
    email: email.into(),
    full_name: "Alice Liddell".into(),
    first_name: Some("Alice".into()),
    last_name: Some("Liddell".into()),
    phone: Some("+33 6 00 00 00 00".into()),
    city: Some("Lyon".into()),
    invitation_code: "123456".into(),
    code_expires_at: Utc::now() + Duration::hours(1),
  }
}

fn request(email: Option<&str>, password: &str, code: &str) -> FinalizeRequest {
  FinalizeRequest {
    email:        email.map(str::to_string),
    new_password: password.into(),
    code_or_id:   code.into(),
  }
}

// ─── Happy path ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_activation_links_all_four_records() {
  let (store, directory, service) = setup().await;
  let practitioner_id = Uuid::new_v4();

  store
    .insert_invitation(
      SubjectKind::Consultant,
      new_invitation("alice@example.com", practitioner_id),
    )
    .await
    .unwrap();
  let code = store
    .insert_code(new_code(
      "alice@example.com",
      "111111",
      Some(practitioner_id),
      None,
    ))
    .await
    .unwrap();

  let outcome = service
    .finalize(
      SubjectKind::Consultant,
      request(Some("alice@example.com"), "s3cret", "111111"),
    )
    .await
    .unwrap();

  assert_eq!(outcome.email, "alice@example.com");
  assert_eq!(outcome.code_id, code.code_id);

  // Profile created from invitation fields, activated, owned.
  let profile = store
    .get_profile(SubjectKind::Consultant, outcome.subject_id)
    .await
    .unwrap()
    .unwrap();
  assert!(profile.activated);
  assert_eq!(profile.full_name, "Alice Liddell");
  assert_eq!(profile.practitioner_id, Some(practitioner_id));

  // Membership ties the profile to the identity account.
  let membership = store
    .get_membership(SubjectKind::Consultant, outcome.subject_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(membership.identity_id, outcome.user_id);

  // Identity account exists in the directory.
  let account = find_by_email(directory.as_ref(), "alice@example.com")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(account.user_id, outcome.user_id);

  // Code consumed, invitation accepted.
  let code_row = store.get_code(code.code_id).await.unwrap().unwrap();
  assert!(code_row.used);
  let pending = store
    .find_invitation(
      SubjectKind::Consultant,
      &arnica_core::invitation::InvitationLookup::ByEmail(
        "alice@example.com".into(),
      ),
    )
    .await
    .unwrap();
  assert!(pending.is_none(), "invitation should no longer be pending");
}

#[tokio::test]
async fn subject_kinds_do_not_leak_into_each_other() {
  let (store, _directory, service) = setup().await;
  let practitioner_id = Uuid::new_v4();
  store
    .insert_code(new_code(
      "alice@example.com",
      "111111",
      Some(practitioner_id),
      None,
    ))
    .await
    .unwrap();

  service
    .finalize(
      SubjectKind::Consultant,
      request(None, "s3cret", "111111"),
    )
    .await
    .unwrap();

  let cross = store
    .find_profile_by_email(SubjectKind::Patient, "alice@example.com")
    .await
    .unwrap();
  assert!(cross.is_none());
}

// ─── Replay & concurrency ────────────────────────────────────────────────────

#[tokio::test]
async fn second_submission_of_same_code_is_rejected() {
  let (store, _directory, service) = setup().await;
  store
    .insert_code(new_code("a@example.com", "222222", Some(Uuid::new_v4()), None))
    .await
    .unwrap();

  service
    .finalize(SubjectKind::Patient, request(None, "pw", "222222"))
    .await
    .unwrap();

  let err = service
    .finalize(SubjectKind::Patient, request(None, "pw", "222222"))
    .await
    .unwrap_err();
  assert!(matches!(err, ActivationError::CodeInvalid));
}

#[tokio::test]
async fn concurrent_finalize_has_one_winner() {
  let (store, _directory, service) = setup().await;
  store
    .insert_code(new_code("a@example.com", "333333", Some(Uuid::new_v4()), None))
    .await
    .unwrap();

  let service = Arc::new(service);
  let mut handles = Vec::new();
  for _ in 0..4 {
    let service = service.clone();
    handles.push(tokio::spawn(async move {
      service
        .finalize(SubjectKind::Patient, request(None, "pw", "333333"))
        .await
    }));
  }

  let mut winners = 0;
  for handle in handles {
    match handle.await.unwrap() {
      Ok(_) => winners += 1,
      Err(e) => assert!(matches!(e, ActivationError::CodeInvalid)),
    }
  }
  assert_eq!(winners, 1);
}

#[tokio::test]
async fn resume_by_id_converges_to_same_state() {
  let (store, directory, service) = setup().await;
  let code = store
    .insert_code(new_code("a@example.com", "444444", Some(Uuid::new_v4()), None))
    .await
    .unwrap();

  let first = service
    .finalize(SubjectKind::Consultant, request(None, "first-pw", "444444"))
    .await
    .unwrap();

  let second = service
    .finalize(
      SubjectKind::Consultant,
      request(None, "second-pw", &code.code_id.to_string()),
    )
    .await
    .unwrap();

  assert_eq!(second.user_id, first.user_id);
  assert_eq!(second.subject_id, first.subject_id);

  // One directory account, one membership, same binding.
  let page = directory.list_users(0).await.unwrap();
  assert_eq!(page.users.len(), 1);
  let membership = store
    .get_membership(SubjectKind::Consultant, first.subject_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(membership.identity_id, first.user_id);
}

// ─── Reconciliation paths ────────────────────────────────────────────────────

#[tokio::test]
async fn orphaned_membership_gets_its_profile_recreated() {
  let (store, directory, service) = setup().await;
  let subject_id = Uuid::new_v4();
  let practitioner_id = Uuid::new_v4();

  // A membership exists, its profile row does not.
  let account = directory
    .create_user("a@example.com", "original")
    .await
    .unwrap();
  let membership = Membership {
    membership_id: Uuid::new_v4(),
    subject_id,
    identity_id: account.user_id,
  };
  store
    .insert_membership(SubjectKind::Patient, membership.clone())
    .await
    .unwrap();
  store
    .insert_code(new_code(
      "a@example.com",
      "555555",
      Some(practitioner_id),
      Some(subject_id),
    ))
    .await
    .unwrap();

  let outcome = service
    .finalize(SubjectKind::Patient, request(None, "new-pw", "555555"))
    .await
    .unwrap();

  assert_eq!(outcome.subject_id, subject_id);
  let profile = store
    .get_profile(SubjectKind::Patient, subject_id)
    .await
    .unwrap()
    .unwrap();
  assert!(profile.activated);

  // The existing binding is untouched: same row, same identity id.
  let bound = store
    .get_membership(SubjectKind::Patient, subject_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(bound.membership_id, membership.membership_id);
  assert_eq!(bound.identity_id, account.user_id);
}

#[tokio::test]
async fn pending_profile_is_repaired_not_recreated() {
  let (store, _directory, service) = setup().await;
  let practitioner_id = Uuid::new_v4();

  // Pre-existing pending profile from the send flow.
  let pending = SubjectProfile {
    subject_id: Uuid::new_v4(),
    email: "a@example.com".into(),
    full_name: "Dr. Früh".into(),
    first_name: None,
    last_name: None,
    phone: None,
    city: None,
    practitioner_id: Some(practitioner_id),
    activated: false,
    activated_at: None,
    created_at: Utc::now(),
  };
  store
    .insert_profile(SubjectKind::Consultant, pending.clone())
    .await
    .unwrap();
  store
    .insert_code(new_code(
      "a@example.com",
      "666666",
      Some(practitioner_id),
      Some(pending.subject_id),
    ))
    .await
    .unwrap();

  let outcome = service
    .finalize(SubjectKind::Consultant, request(None, "pw", "666666"))
    .await
    .unwrap();

  assert_eq!(outcome.subject_id, pending.subject_id);
  let repaired = store
    .get_profile(SubjectKind::Consultant, pending.subject_id)
    .await
    .unwrap()
    .unwrap();
  assert!(repaired.activated);
  // Content fields are not overwritten during repair.
  assert_eq!(repaired.full_name, "Dr. Früh");
}

#[tokio::test]
async fn email_only_invitation_resolves_and_binds() {
  let (store, _directory, service) = setup().await;
  let practitioner_id = Uuid::new_v4();

  // No subject id anywhere; the code lost its practitioner link too.
  store
    .insert_invitation(
      SubjectKind::Consultant,
      new_invitation("a@example.com", practitioner_id),
    )
    .await
    .unwrap();
  store
    .insert_code(new_code("a@example.com", "777777", None, None))
    .await
    .unwrap();

  let outcome = service
    .finalize(SubjectKind::Consultant, request(None, "pw", "777777"))
    .await
    .unwrap();

  let profile = store
    .get_profile(SubjectKind::Consultant, outcome.subject_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(profile.practitioner_id, Some(practitioner_id));
  assert!(
    store
      .get_membership(SubjectKind::Consultant, outcome.subject_id)
      .await
      .unwrap()
      .is_some()
  );
}

#[tokio::test]
async fn missing_owner_falls_back_to_oldest_practitioner() {
  let (store, _directory, service) = setup().await;
  let oldest = store
    .insert_practitioner(NewPractitioner { full_name: "Dr. One".into() })
    .await
    .unwrap();

  // Ownerless pending profile, ownerless code, no invitation.
  let pending = SubjectProfile {
    subject_id: Uuid::new_v4(),
    email: "a@example.com".into(),
    full_name: "a".into(),
    first_name: None,
    last_name: None,
    phone: None,
    city: None,
    practitioner_id: None,
    activated: false,
    activated_at: None,
    created_at: Utc::now(),
  };
  store
    .insert_profile(SubjectKind::Patient, pending.clone())
    .await
    .unwrap();
  store
    .insert_code(new_code("a@example.com", "888888", None, Some(pending.subject_id)))
    .await
    .unwrap();

  service
    .finalize(SubjectKind::Patient, request(None, "pw", "888888"))
    .await
    .unwrap();

  let repaired = store
    .get_profile(SubjectKind::Patient, pending.subject_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(repaired.practitioner_id, Some(oldest.practitioner_id));
}

#[tokio::test]
async fn zero_practitioners_is_a_hard_error() {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let directory = Arc::new(SqliteDirectory::open_in_memory().await.unwrap());
  let service =
    Activation::new(store.clone(), directory, NoDefaultPractitioner);

  store
    .insert_code(new_code("a@example.com", "999999", None, None))
    .await
    .unwrap();

  let err = service
    .finalize(SubjectKind::Patient, request(None, "pw", "999999"))
    .await
    .unwrap_err();
  assert!(matches!(err, ActivationError::NoPractitionerAvailable));
}

// ─── Identity linking ────────────────────────────────────────────────────────

#[tokio::test]
async fn existing_account_is_reused_case_insensitively() {
  let (store, directory, service) = setup().await;
  let existing = directory
    .create_user("User@Example.com", "original")
    .await
    .unwrap();
  let hash_before = directory
    .password_hash(existing.user_id)
    .await
    .unwrap()
    .unwrap();

  store
    .insert_code(new_code(
      "user@example.com",
      "121212",
      Some(Uuid::new_v4()),
      None,
    ))
    .await
    .unwrap();

  let outcome = service
    .finalize(SubjectKind::Consultant, request(None, "replaced", "121212"))
    .await
    .unwrap();

  assert_eq!(outcome.user_id, existing.user_id);
  let page = directory.list_users(0).await.unwrap();
  assert_eq!(page.users.len(), 1, "no second account may be created");
  let hash_after = directory
    .password_hash(existing.user_id)
    .await
    .unwrap()
    .unwrap();
  assert_ne!(hash_before, hash_after, "credential must be replaced");
}

#[tokio::test]
async fn provider_failure_stops_before_membership() {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let directory = Arc::new(FailingDirectory);
  let service = Activation::new(
    store.clone(),
    directory,
    OldestPractitioner::new(store.clone()),
  );

  store
    .insert_code(new_code("a@example.com", "131313", Some(Uuid::new_v4()), None))
    .await
    .unwrap();

  let err = service
    .finalize(SubjectKind::Patient, request(None, "pw", "131313"))
    .await
    .unwrap_err();
  assert!(matches!(err, ActivationError::IdentityProvider(_)));

  // Forward-only: the profile may exist, but no membership was bound.
  let profile = store
    .find_profile_by_email(SubjectKind::Patient, "a@example.com")
    .await
    .unwrap()
    .unwrap();
  let membership = store
    .get_membership(SubjectKind::Patient, profile.subject_id)
    .await
    .unwrap();
  assert!(membership.is_none());
}

// ─── Rejections ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn email_mismatch_spends_nothing() {
  let (store, directory, service) = setup().await;
  let code = store
    .insert_code(new_code("a@example.com", "141414", Some(Uuid::new_v4()), None))
    .await
    .unwrap();

  let err = service
    .finalize(
      SubjectKind::Consultant,
      request(Some("b@example.com"), "pw", "141414"),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, ActivationError::EmailMismatch));

  // No side effects: code unspent, no profile, no identity account.
  let row = store.get_code(code.code_id).await.unwrap().unwrap();
  assert!(!row.used);
  assert!(
    store
      .find_profile_by_email(SubjectKind::Consultant, "a@example.com")
      .await
      .unwrap()
      .is_none()
  );
  assert!(
    find_by_email(directory.as_ref(), "a@example.com")
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn expired_code_rejected_by_value_but_resumable_by_id() {
  let (store, _directory, service) = setup().await;
  let mut input = new_code("a@example.com", "151515", Some(Uuid::new_v4()), None);
  input.expires_at = Utc::now() - Duration::minutes(1);
  let code = store.insert_code(input).await.unwrap();

  let err = service
    .finalize(SubjectKind::Patient, request(None, "pw", "151515"))
    .await
    .unwrap_err();
  assert!(matches!(err, ActivationError::CodeInvalid));

  // The id form is expiry-exempt.
  let outcome = service
    .finalize(
      SubjectKind::Patient,
      request(None, "pw", &code.code_id.to_string()),
    )
    .await
    .unwrap();
  assert_eq!(outcome.code_id, code.code_id);
  assert!(store.get_code(code.code_id).await.unwrap().unwrap().used);
}

#[tokio::test]
async fn empty_password_is_a_validation_error() {
  let (_store, _directory, service) = setup().await;
  let err = service
    .finalize(SubjectKind::Patient, request(None, "", "111111"))
    .await
    .unwrap_err();
  assert!(matches!(err, ActivationError::MissingField("newPassword")));
}

#[tokio::test]
async fn malformed_redemption_is_code_invalid() {
  let (_store, _directory, service) = setup().await;
  let err = service
    .finalize(SubjectKind::Patient, request(None, "pw", "abc123"))
    .await
    .unwrap_err();
  assert!(matches!(err, ActivationError::CodeInvalid));
}

// ─── Directory scanning ──────────────────────────────────────────────────────

#[tokio::test]
async fn find_by_email_walks_pages() {
  let account = IdentityAccount {
    user_id: Uuid::new_v4(),
    email:   "Deep@Example.com".into(),
  };
  let filler = |n: usize| IdentityAccount {
    user_id: Uuid::new_v4(),
    email:   format!("user{n}@example.com"),
  };
  let directory = PagedDirectory {
    pages: vec![
      vec![filler(1), filler(2)],
      vec![filler(3), account.clone()],
    ],
  };

  let found = find_by_email(&directory, "deep@example.com")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.user_id, account.user_id);

  assert!(
    find_by_email(&directory, "missing@example.com")
      .await
      .unwrap()
      .is_none()
  );
}

// ─── Test doubles ────────────────────────────────────────────────────────────

/// A provider whose every operation fails — for the fatal-error path.
struct FailingDirectory;

impl IdentityProvider for FailingDirectory {
  type Error = std::io::Error;

  async fn list_users(&self, _page: u32) -> Result<UserPage, std::io::Error> {
    Err(std::io::Error::other("directory unavailable"))
  }

  async fn create_user(
    &self,
    _email: &str,
    _password: &str,
  ) -> Result<IdentityAccount, std::io::Error> {
    Err(std::io::Error::other("directory unavailable"))
  }

  async fn update_password(
    &self,
    _user_id: Uuid,
    _password: &str,
  ) -> Result<(), std::io::Error> {
    Err(std::io::Error::other("directory unavailable"))
  }
}

/// A fixed set of directory pages — for exercising pagination.
struct PagedDirectory {
  pages: Vec<Vec<IdentityAccount>>,
}

impl IdentityProvider for PagedDirectory {
  type Error = std::convert::Infallible;

  async fn list_users(&self, page: u32) -> Result<UserPage, Self::Error> {
    let idx = page as usize;
    let users = self.pages.get(idx).cloned().unwrap_or_default();
    let next = if idx + 1 < self.pages.len() {
      Some(page + 1)
    } else {
      None
    };
    Ok(UserPage { users, next })
  }

  async fn create_user(
    &self,
    _email: &str,
    _password: &str,
  ) -> Result<IdentityAccount, Self::Error> {
    unimplemented!()
  }

  async fn update_password(
    &self,
    _user_id: Uuid,
    _password: &str,
  ) -> Result<(), Self::Error> {
    unimplemented!()
  }
}
