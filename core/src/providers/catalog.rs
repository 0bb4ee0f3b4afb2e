//! Catalog collaborator trait.

use super::{VolumePricing, VolumeReconciliation};
use crate::error::Result;
use crate::types::{SeriesId, VolumeId};

/// Read access to the product catalog, plus the explicit volume-count
/// reconciliation hook.
///
/// Pricing is always read live: cart totals follow catalog edits until the
/// instant an order is committed, at which point prices are snapshotted
/// into order lines.
pub trait CatalogProvider: Send + Sync {
    /// Look up live pricing for one volume.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the volume does not exist, or a
    /// database error if the lookup fails.
    fn volume_pricing(
        &self,
        volume_id: VolumeId,
    ) -> impl std::future::Future<Output = Result<VolumePricing>> + Send;

    /// Reconcile a series' volume rows against its declared volume count.
    ///
    /// Invoked explicitly by the catalog collaborator after an edit, never
    /// as a hidden persistence hook: creates missing volumes up to
    /// `declared_count` and prunes surplus volumes above it.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the series does not exist, or a
    /// database error if the reconciliation fails.
    fn reconcile_volume_count(
        &self,
        series_id: SeriesId,
        declared_count: u32,
    ) -> impl std::future::Future<Output = Result<VolumeReconciliation>> + Send;
}
