//! Twin store contract.

use async_trait::async_trait;
use herdsync_types::{PatchDocument, TwinId, TwinSnapshot};

use crate::error::StoreResult;

/// Remote twin store.
#[async_trait]
pub trait TwinStore: Send + Sync {
    /// Read the current state of a twin.
    async fn get(&self, id: &TwinId) -> StoreResult<TwinSnapshot>;

    /// Apply a patch document atomically.
    ///
    /// With `if_match`, the store refuses the patch with
    /// [`StoreError::Conflict`](crate::StoreError::Conflict) when the twin's
    /// etag no longer matches.
    async fn patch(
        &self,
        id: &TwinId,
        document: &PatchDocument,
        if_match: Option<&str>,
    ) -> StoreResult<()>;

    /// Check that the configured credentials are accepted.
    async fn verify_access(&self) -> StoreResult<()> {
        Ok(())
    }
}
