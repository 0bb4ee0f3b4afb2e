//! Cart operations: view, add, set quantity, remove, clear.
//!
//! The cart is the only mutable pre-order state. Every mutation returns the
//! full re-priced view so clients never render from stale line data. Pricing
//! is always live: the cart has no memory of what a volume cost when it was
//! added, only orders freeze prices.

use crate::environment::ShopEnvironment;
use crate::error::{Result, ShopError};
use crate::providers::{CatalogProvider, Notifier, PaymentProcessor, TaskQueue};
use crate::store::ShopStore;
use crate::types::{CartLine, CartView, PricedCartLine, UserId, VolumeId};

impl<S, C, P, N, Q> ShopEnvironment<S, C, P, N, Q>
where
    S: ShopStore,
    C: CatalogProvider,
    P: PaymentProcessor,
    N: Notifier,
    Q: TaskQueue,
{
    /// The user's cart with live catalog pricing.
    ///
    /// # Errors
    ///
    /// Returns [`ShopError::NotFound`] if a carted volume has vanished from
    /// the catalog, and store/catalog errors otherwise.
    pub async fn cart(&self, user_id: UserId) -> Result<CartView> {
        let lines = self.store.cart_lines(user_id).await?;
        self.price_lines(lines).await
    }

    /// Add `quantity` units of a volume to the cart.
    ///
    /// Adding a volume already in the cart increases its line quantity with
    /// no upper clamp; the cart policy maximum binds only
    /// [`set_cart_quantity`](Self::set_cart_quantity). The request carries
    /// no idempotency key, so a retried add adds again.
    ///
    /// # Errors
    ///
    /// Returns [`ShopError::Validation`] for a zero quantity and
    /// [`ShopError::NotFound`] for a volume the catalog does not know.
    pub async fn add_to_cart(
        &self,
        user_id: UserId,
        volume_id: VolumeId,
        quantity: u32,
    ) -> Result<CartView> {
        if quantity == 0 {
            return Err(ShopError::validation("quantity must be at least 1"));
        }
        // Reject unknown volumes before touching the cart.
        self.catalog.volume_pricing(volume_id).await?;

        let line = self.store.cart_add(user_id, volume_id, quantity).await?;
        tracing::debug!(%user_id, %volume_id, quantity = line.quantity, "cart line added");
        metrics::counter!("tomeshop_cart_mutations_total", "op" => "add").increment(1);
        self.cart(user_id).await
    }

    /// Set the quantity of a line already in the cart.
    ///
    /// A quantity of zero or less removes the line, mirroring what clients
    /// send when a stepper control reaches the bottom.
    ///
    /// # Errors
    ///
    /// Returns [`ShopError::NotFound`] if the volume is not in the cart and
    /// [`ShopError::Validation`] above the cart policy maximum.
    pub async fn set_cart_quantity(
        &self,
        user_id: UserId,
        volume_id: VolumeId,
        quantity: i64,
    ) -> Result<CartView> {
        if quantity <= 0 {
            return self.remove_from_cart(user_id, volume_id).await;
        }
        let quantity = u32::try_from(quantity)
            .map_err(|_| ShopError::validation("quantity out of range"))?;
        self.cart_policy.check_quantity(quantity)?;

        self.store
            .cart_set_quantity(user_id, volume_id, quantity)
            .await?;
        metrics::counter!("tomeshop_cart_mutations_total", "op" => "set_quantity").increment(1);
        self.cart(user_id).await
    }

    /// Remove a volume from the cart.
    ///
    /// # Errors
    ///
    /// Returns [`ShopError::NotFound`] if the volume is not in the cart.
    pub async fn remove_from_cart(
        &self,
        user_id: UserId,
        volume_id: VolumeId,
    ) -> Result<CartView> {
        let removed = self.store.cart_remove(user_id, volume_id).await?;
        if !removed {
            return Err(ShopError::NotFound {
                resource: "cart line",
            });
        }
        metrics::counter!("tomeshop_cart_mutations_total", "op" => "remove").increment(1);
        self.cart(user_id).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        self.store.cart_clear(user_id).await?;
        metrics::counter!("tomeshop_cart_mutations_total", "op" => "clear").increment(1);
        Ok(())
    }

    async fn price_lines(&self, lines: Vec<CartLine>) -> Result<CartView> {
        let mut priced = Vec::with_capacity(lines.len());
        for line in lines {
            let pricing = self.catalog.volume_pricing(line.volume_id).await?;
            priced.push(PricedCartLine {
                volume_id: line.volume_id,
                series_id: pricing.series_id,
                number: pricing.number,
                quantity: line.quantity,
                unit_price: pricing.unit_price,
                line_total: pricing.unit_price.times(line.quantity),
            });
        }
        Ok(CartView::from_lines(priced))
    }
}
