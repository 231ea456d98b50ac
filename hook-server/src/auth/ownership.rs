//! Ownership guard for webhook data.

use tracing::debug;

use crate::store::{Store, StoreError};

/// Decide whether `caller_id` may read or change the webhook `webhook_id`.
///
/// Returns `Ok(false)` both when the webhook does not exist and when it
/// belongs to someone else; callers answer both cases the same way. The
/// check is not transactional with whatever the caller does next.
pub async fn authorize(
    store: &dyn Store,
    webhook_id: &str,
    caller_id: &str,
) -> Result<bool, StoreError> {
    let owned = store.check_ownership(webhook_id, caller_id).await?;
    if !owned {
        debug!(webhook_id = %webhook_id, caller_id = %caller_id, "ownership_denied");
    }
    Ok(owned)
}
