//! Authorization gate for telemetry topic access.
//!
//! Rule set, evaluated in order: an account may always access its own stream;
//! any other stream requires a recorded guardianship edge from the target
//! (elder) to the caller (guardian). The currently exposed surface only
//! reaches the self rule, but the gate already answers for guardian-initiated
//! subscriptions once that endpoint exists.

use crate::error::AccessError;
use crate::store::CredentialStore;

use super::principal::Principal;

pub async fn authorize_topic_access(
    store: &dyn CredentialStore,
    caller: &Principal,
    target_account_id: &str,
) -> Result<(), AccessError> {
    if caller.account_id == target_account_id {
        return Ok(());
    }
    let linked = store
        .guardianship_exists(target_account_id, &caller.account_id)
        .await
        .map_err(|e| AccessError::Store(e.to_string()))?;
    if linked {
        Ok(())
    } else {
        Err(AccessError::NotGuardian)
    }
}
