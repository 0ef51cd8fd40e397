//! Per-twin mutual exclusion.
//!
//! At most one run per twin id may be between fetch and confirm. A second
//! run waits for the holder, up to a timeout, and then gives up without
//! touching the store.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use herdsync_types::TwinId;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::SyncError;

type Slots = Arc<DashMap<TwinId, Arc<Mutex<()>>>>;

/// Registry of per-twin locks. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct LeaseRegistry {
    slots: Slots,
}

/// Exclusive hold on one twin. Released on drop.
#[derive(Debug)]
pub struct TwinLease {
    twin_id: TwinId,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Slots,
}

impl LeaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout` for exclusive access to `twin_id`.
    pub async fn acquire(&self, twin_id: &TwinId, timeout: Duration) -> Result<TwinLease, SyncError> {
        let slot = self.slots.entry(twin_id.clone()).or_default().clone();

        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => {
                debug!(twin_id = %twin_id, "lease acquired");
                Ok(TwinLease {
                    twin_id: twin_id.clone(),
                    guard: Some(guard),
                    slots: self.slots.clone(),
                })
            }
            Err(_) => {
                release_slot(&self.slots, twin_id);
                Err(SyncError::LeaseTimeout {
                    twin_id: twin_id.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Whether some run currently holds `twin_id`.
    pub fn is_held(&self, twin_id: &TwinId) -> bool {
        self.slots
            .get(twin_id)
            .map(|slot| slot.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of twins with a holder or waiter.
    pub fn active(&self) -> usize {
        self.slots.len()
    }
}

/// Drop the slot once nobody holds or waits on it.
fn release_slot(slots: &Slots, twin_id: &TwinId) {
    slots.remove_if(twin_id, |_, slot| Arc::strong_count(slot) == 1);
}

impl TwinLease {
    pub fn twin_id(&self) -> &TwinId {
        &self.twin_id
    }
}

impl Drop for TwinLease {
    fn drop(&mut self) {
        self.guard.take();
        release_slot(&self.slots, &self.twin_id);
        debug!(twin_id = %self.twin_id, "lease released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let registry = LeaseRegistry::new();
        let id = TwinId::new("co-01");

        let lease = registry.acquire(&id, Duration::from_secs(1)).await.unwrap();
        assert_eq!(lease.twin_id(), &id);
        assert!(registry.is_held(&id));

        drop(lease);
        assert!(!registry.is_held(&id));
        assert_eq!(registry.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_holder_times_out() {
        let registry = LeaseRegistry::new();
        let id = TwinId::new("co-03");
        let _held = registry.acquire(&id, Duration::from_secs(1)).await.unwrap();

        let err = registry
            .acquire(&id, Duration::from_millis(250))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::LeaseTimeout {
                twin_id: id.clone(),
                timeout_ms: 250
            }
        );
        // the holder's slot survives the waiter giving up
        assert!(registry.is_held(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_gets_lease_after_release() {
        let registry = LeaseRegistry::new();
        let id = TwinId::new("co-03");
        let held = registry.acquire(&id, Duration::from_secs(1)).await.unwrap();

        let waiter = {
            let registry = registry.clone();
            let id = id.clone();
            tokio::spawn(async move { registry.acquire(&id, Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(held);

        let lease = waiter.await.unwrap().unwrap();
        assert!(registry.is_held(lease.twin_id()));
    }

    #[tokio::test]
    async fn test_distinct_twins_are_independent() {
        let registry = LeaseRegistry::new();
        let _a = registry
            .acquire(&TwinId::new("co-01"), Duration::from_millis(10))
            .await
            .unwrap();
        let _b = registry
            .acquire(&TwinId::new("co-02"), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(registry.active(), 2);
    }
}
