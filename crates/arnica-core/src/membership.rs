//! Membership — the one-to-one link between a subject profile and an
//! identity-provider account.
//!
//! Created once per subject. If a row is found pointing at a different
//! identity id than the one resolved in the current run, it is repaired in
//! place, never duplicated. The identity account is referenced by id only;
//! this subsystem never deletes identity accounts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
  pub membership_id: Uuid,
  pub subject_id:    Uuid,
  /// The identity-provider account id (weak reference).
  pub identity_id:   Uuid,
}
