//! The identity-provider boundary.
//!
//! The provider owns authentication (credential storage, sessions); this
//! subsystem only needs three operations: paginated user listing, account
//! creation, and credential replacement. Lookup by email is a helper built
//! on the listing operation, matching case-insensitively.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An account in the identity provider's user directory. The credential
/// never leaves the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityAccount {
  pub user_id: Uuid,
  pub email:   String,
}

/// One page of the user directory.
#[derive(Debug, Clone)]
pub struct UserPage {
  pub users: Vec<IdentityAccount>,
  /// The next page number, or `None` when this was the last page.
  pub next:  Option<u32>,
}

/// Abstraction over the external identity provider.
///
/// Accounts created through this trait are pre-confirmed: the one-time code
/// already proved control of the mailbox, so no separate email-verification
/// step exists.
pub trait IdentityProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// List one page of the user directory, starting at page 0.
  fn list_users(
    &self,
    page: u32,
  ) -> impl Future<Output = Result<UserPage, Self::Error>> + Send + '_;

  /// Create a confirmed account with the given credential.
  fn create_user<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<IdentityAccount, Self::Error>> + Send + 'a;

  /// Replace the credential of an existing account.
  fn update_password<'a>(
    &'a self,
    user_id: Uuid,
    password: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Scan the directory for an account whose email matches `email`
/// case-insensitively.
pub async fn find_by_email<P: IdentityProvider>(
  provider: &P,
  email: &str,
) -> Result<Option<IdentityAccount>, P::Error> {
  let mut page = Some(0);
  while let Some(current) = page {
    let batch = provider.list_users(current).await?;
    if let Some(account) = batch
      .users
      .into_iter()
      .find(|u| u.email.eq_ignore_ascii_case(email))
    {
      return Ok(Some(account));
    }
    page = batch.next;
  }
  Ok(None)
}
