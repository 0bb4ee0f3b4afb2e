//! Ownership ledger queries.
//!
//! Grants are written exclusively by the reconciler's success transaction;
//! this module only reads. There is no revocation path.

use crate::environment::ShopEnvironment;
use crate::error::Result;
use crate::providers::{CatalogProvider, Notifier, PaymentProcessor, TaskQueue};
use crate::store::ShopStore;
use crate::types::{OwnedVolume, UserId, VolumeId};

impl<S, C, P, N, Q> ShopEnvironment<S, C, P, N, Q>
where
    S: ShopStore,
    C: CatalogProvider,
    P: PaymentProcessor,
    N: Notifier,
    Q: TaskQueue,
{
    /// Every volume the user owns.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn collection(&self, user_id: UserId) -> Result<Vec<OwnedVolume>> {
        self.store.owned_volumes(user_id).await
    }

    /// Whether the user owns a specific volume.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn has_access(&self, user_id: UserId, volume_id: VolumeId) -> Result<bool> {
        self.store.has_access(user_id, volume_id).await
    }
}
