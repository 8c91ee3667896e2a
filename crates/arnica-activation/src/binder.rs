//! Membership binding — exactly one membership row per subject profile.

use arnica_core::{membership::Membership, profile::SubjectKind, store::ActivationStore};
use uuid::Uuid;

/// Insert, no-op, or repair — never duplicate.
///
/// Returns the bound membership. Errors carry the raw store error; the
/// orchestrator attaches the ids needed for manual repair before wrapping.
pub async fn bind_membership<S: ActivationStore>(
  store: &S,
  kind: SubjectKind,
  subject_id: Uuid,
  identity_id: Uuid,
) -> Result<Membership, S::Error> {
  match store.get_membership(kind, subject_id).await? {
    Some(membership) if membership.identity_id == identity_id => Ok(membership),
    Some(membership) => {
      // Re-activation under a different identity account (e.g. after
      // manual cleanup): repoint the existing row.
      store
        .update_membership_identity(kind, membership.membership_id, identity_id)
        .await?;
      Ok(Membership {
        identity_id,
        ..membership
      })
    }
    None => {
      let membership = Membership {
        membership_id: Uuid::new_v4(),
        subject_id,
        identity_id,
      };
      store.insert_membership(kind, membership.clone()).await?;
      Ok(membership)
    }
  }
}
