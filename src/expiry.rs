use std::sync::Weak;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::store::Shared;

/// Arms a one-shot timer that evicts `key` at `expires_at`, provided the entry stored under `key`
/// at that point is still the one written with `version`.
///
/// The timer holds no lock while it waits and only a weak reference to the store, so it neither
/// blocks writers nor keeps a dropped store alive. Outside of a tokio runtime no timer is armed
/// and `None` is returned; expired keys are then dropped by the read path alone.
pub(crate) fn schedule(
    store: Weak<Shared>,
    key: String,
    version: u64,
    expires_at: Instant,
) -> Option<AbortHandle> {
    let handle = Handle::try_current().ok()?;

    let task = handle.spawn(async move {
        sleep_until(expires_at).await;

        let Some(store) = store.upgrade() else {
            return;
        };

        if store.remove_version(&key, version) {
            debug!(key = %key, "Evicted expired key");
        }
    });

    Some(task.abort_handle())
}
