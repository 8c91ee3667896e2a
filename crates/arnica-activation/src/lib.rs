//! The activation orchestrator.
//!
//! Reconciles four independently-stored records — a one-time code, an
//! invitation, a subject profile, and a membership link to an identity
//! account — into one activated, authenticated account. Generic over the
//! storage backend, the identity provider, and the default-practitioner
//! capability.
//!
//! The design is forward-only: committed steps are never rolled back. The
//! atomic code claim is the single synchronization point between concurrent
//! requests; every step after it is idempotent, so a failed request can be
//! retried (or resumed by code id) and converges on the same final state.

mod binder;
mod linker;
mod reconcile;
mod resolve;

pub mod error;
pub mod owner;

pub use error::ActivationError;
pub use owner::{DefaultPractitionerResolver, NoDefaultPractitioner, OldestPractitioner};

use std::sync::Arc;

use arnica_core::{
  code::{OneTimeCode, Redemption},
  identity::IdentityProvider,
  profile::SubjectKind,
  store::ActivationStore,
};
use uuid::Uuid;

use binder::bind_membership;
use linker::link_identity;
use reconcile::ensure_profile;
use resolve::{resolve_invitation, resolve_subject_id};

// ─── Request / outcome ───────────────────────────────────────────────────────

/// One finalize attempt, as received from the API layer.
#[derive(Debug, Clone)]
pub struct FinalizeRequest {
  /// Optional; when present it must match the code's email.
  pub email:        Option<String>,
  pub new_password: String,
  /// A 6-digit code or a code row id (the resumption form).
  pub code_or_id:   String,
}

/// Terminal success of an activation run.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
  pub user_id:    Uuid,
  pub subject_id: Uuid,
  pub email:      String,
  pub code_id:    Uuid,
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// The activation service. One instance serves both subject kinds; the kind
/// is a parameter, not a code path.
pub struct Activation<S, P, D> {
  store:          Arc<S>,
  provider:       Arc<P>,
  fallback_owner: D,
}

impl<S, P, D> Activation<S, P, D>
where
  S: ActivationStore,
  P: IdentityProvider,
  D: DefaultPractitionerResolver,
{
  pub fn new(store: Arc<S>, provider: Arc<P>, fallback_owner: D) -> Self {
    Self {
      store,
      provider,
      fallback_owner,
    }
  }

  /// Run the full activation sequence for one request.
  ///
  /// claim → resolve invitation → resolve subject → reconcile profile →
  /// link identity → bind membership → bookkeeping. Failures short-circuit
  /// at the step that failed; bookkeeping failures after the membership is
  /// bound only log a warning — the account is already usable.
  pub async fn finalize(
    &self,
    kind: SubjectKind,
    request: FinalizeRequest,
  ) -> Result<FinalizeOutcome, ActivationError> {
    if request.new_password.is_empty() {
      return Err(ActivationError::MissingField("newPassword"));
    }
    let raw_code = request.code_or_id.trim();
    if raw_code.is_empty() {
      return Err(ActivationError::MissingField("otpCodeOrOtpId"));
    }

    // A string that is neither a 6-digit code nor a code id can never
    // match a row; report it the same way as an unknown code.
    let redemption =
      Redemption::parse(raw_code).map_err(|_| ActivationError::CodeInvalid)?;

    let (code, resumed) = self.redeem(&redemption, request.email.as_deref()).await?;
    let email = code.email.clone();

    let invitation =
      resolve_invitation(self.store.as_ref(), kind, &code, &email).await?;
    let subject_id = resolve_subject_id(
      self.store.as_ref(),
      kind,
      &code,
      invitation.as_ref(),
      &email,
    )
    .await?;

    let profile = ensure_profile(
      self.store.as_ref(),
      &self.fallback_owner,
      kind,
      subject_id,
      invitation.as_ref(),
      &code,
      &email,
    )
    .await?;

    let account =
      link_identity(self.provider.as_ref(), &email, &request.new_password).await?;

    bind_membership(
      self.store.as_ref(),
      kind,
      profile.subject_id,
      account.user_id,
    )
    .await
    .map_err(|e| {
      // Not rolled back; log everything needed to repair by hand.
      tracing::error!(
        code_id = %code.code_id,
        subject_id = %profile.subject_id,
        user_id = %account.user_id,
        error = %e,
        "membership binding failed"
      );
      ActivationError::persistence(e)
    })?;

    // Bookkeeping. The account is usable from here on; a failure below
    // must not fail the request.
    if let Some(inv) = &invitation {
      if let Err(e) = self
        .store
        .mark_invitation_accepted(kind, inv.invitation_id)
        .await
      {
        tracing::warn!(
          invitation_id = %inv.invitation_id,
          error = %e,
          "failed to mark invitation accepted"
        );
      }
    }
    if resumed {
      if let Err(e) = self.store.mark_code_used(code.code_id).await {
        tracing::warn!(
          code_id = %code.code_id,
          error = %e,
          "failed to mark code used"
        );
      }
    }

    tracing::info!(
      kind = kind.as_str(),
      subject_id = %profile.subject_id,
      user_id = %account.user_id,
      code_id = %code.code_id,
      "activation finalized"
    );

    Ok(FinalizeOutcome {
      user_id:    account.user_id,
      subject_id: profile.subject_id,
      email,
      code_id:    code.code_id,
    })
  }

  /// Turn a redemption into a code row.
  ///
  /// The 6-digit form validates the request against a read-only peek first,
  /// then claims atomically — a mismatched email must not spend the code.
  /// The id form resumes a previously-claimed flow: no expiry or used
  /// check, and the code is only marked used at the very end.
  async fn redeem(
    &self,
    redemption: &Redemption,
    request_email: Option<&str>,
  ) -> Result<(OneTimeCode, bool), ActivationError> {
    match redemption {
      Redemption::Code(value) => {
        let peeked = self
          .store
          .peek_code(value)
          .await
          .map_err(ActivationError::persistence)?
          .ok_or(ActivationError::CodeInvalid)?;
        check_email(request_email, &peeked.email)?;

        let claimed = self
          .store
          .claim_code(value)
          .await
          .map_err(ActivationError::persistence)?
          // A concurrent request won the race between peek and claim.
          .ok_or(ActivationError::CodeInvalid)?;
        Ok((claimed, false))
      }
      Redemption::Resume(code_id) => {
        let code = self
          .store
          .get_code(*code_id)
          .await
          .map_err(ActivationError::persistence)?
          .ok_or(ActivationError::CodeInvalid)?;
        check_email(request_email, &code.email)?;
        Ok((code, true))
      }
    }
  }
}

fn check_email(
  requested: Option<&str>,
  code_email: &str,
) -> Result<(), ActivationError> {
  match requested.map(str::trim).filter(|e| !e.is_empty()) {
    Some(email) if !email.eq_ignore_ascii_case(code_email) => {
      Err(ActivationError::EmailMismatch)
    }
    _ => Ok(()),
  }
}

#[cfg(test)]
mod tests;
