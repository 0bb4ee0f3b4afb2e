//! Order operations: commit, history, detail.
//!
//! Committing turns the mutable cart into an immutable order snapshot. The
//! heavy lifting (locking, snapshotting, line creation) happens inside the
//! store so the whole protocol shares one transaction; this module owns the
//! surrounding policy and telemetry.

use crate::environment::ShopEnvironment;
use crate::error::Result;
use crate::providers::{CatalogProvider, Notifier, PaymentProcessor, TaskQueue};
use crate::store::ShopStore;
use crate::types::{OrderDetail, OrderReference, UserId};

impl<S, C, P, N, Q> ShopEnvironment<S, C, P, N, Q>
where
    S: ShopStore,
    C: CatalogProvider,
    P: PaymentProcessor,
    N: Notifier,
    Q: TaskQueue,
{
    /// Commit the user's cart into a new PENDING order.
    ///
    /// Totals and per-line unit prices are frozen as of the commit instant;
    /// later catalog price changes never touch the order. The cart is left
    /// intact until payment succeeds, so a failed payment needs no cart
    /// reconstruction, the user simply commits again.
    ///
    /// # Errors
    ///
    /// Returns [`ShopError::EmptyCart`](crate::error::ShopError) when the
    /// cart has no lines at commit time.
    pub async fn commit_order(&self, user_id: UserId) -> Result<OrderDetail> {
        let detail = self.store.commit_order(user_id).await?;
        tracing::info!(
            %user_id,
            reference = %detail.order.reference,
            total = %detail.order.total_price,
            lines = detail.lines.len(),
            "order committed"
        );
        metrics::counter!("tomeshop_orders_committed_total").increment(1);
        Ok(detail)
    }

    /// The user's orders, newest first, each with its line snapshots.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn order_history(&self, user_id: UserId) -> Result<Vec<OrderDetail>> {
        self.store.orders_for_user(user_id).await
    }

    /// One order by its opaque reference, scoped to the user.
    ///
    /// # Errors
    ///
    /// Returns [`ShopError::NotFound`](crate::error::ShopError) for an
    /// unknown reference or one belonging to another user; callers cannot
    /// distinguish the two.
    pub async fn order_detail(
        &self,
        user_id: UserId,
        reference: OrderReference,
    ) -> Result<OrderDetail> {
        self.store.order_by_reference(user_id, reference).await
    }
}
