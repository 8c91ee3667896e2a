//! Identity linking — find-or-create the identity-provider account and set
//! its credential.
//!
//! The credential is set on every successful run, replays included; the new
//! password from the current request always wins. Any provider error is
//! fatal for the request: membership must never be bound to an identity id
//! we are not sure exists.

use arnica_core::identity::{IdentityAccount, IdentityProvider, find_by_email};

use crate::ActivationError;

pub async fn link_identity<P: IdentityProvider>(
  provider: &P,
  email: &str,
  password: &str,
) -> Result<IdentityAccount, ActivationError> {
  let existing = find_by_email(provider, email)
    .await
    .map_err(ActivationError::identity)?;

  match existing {
    Some(account) => {
      provider
        .update_password(account.user_id, password)
        .await
        .map_err(ActivationError::identity)?;
      Ok(account)
    }
    None => provider
      .create_user(email, password)
      .await
      .map_err(ActivationError::identity),
  }
}
