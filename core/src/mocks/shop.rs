//! In-memory store and catalog, for tests.

use crate::error::{Result, ShopError};
use crate::providers::{CatalogProvider, VolumePricing, VolumeReconciliation};
use crate::store::{EventDisposition, NewPayment, SettlementOutcome, ShopStore};
use crate::types::{
    CartLine, Money, Order, OrderDetail, OrderId, OrderLine, OrderReceipt, OrderReference,
    OrderStatus, OwnedVolume, Payment, PaymentId, PaymentStatus, SeriesId, UserId, VolumeId,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct EventRecord {
    event_type: String,
    payload: serde_json::Value,
    processed: bool,
}

#[derive(Copy, Clone, Debug, Default)]
struct CartVersion {
    version: u64,
    committed: Option<u64>,
}

#[derive(Debug, Default)]
struct Inner {
    catalog: HashMap<VolumeId, VolumePricing>,
    carts: HashMap<UserId, Vec<CartLine>>,
    cart_versions: HashMap<UserId, CartVersion>,
    orders: Vec<OrderDetail>,
    payments: Vec<Payment>,
    events: HashMap<String, EventRecord>,
    grants: HashMap<UserId, Vec<OwnedVolume>>,
}

impl Inner {
    fn bump_cart(&mut self, user_id: UserId) {
        self.cart_versions.entry(user_id).or_default().version += 1;
    }
}

/// In-memory [`ShopStore`] and [`CatalogProvider`] over a single mutex.
///
/// Clones share state, so an environment and a test can hold the same shop.
#[derive(Clone, Debug)]
pub struct InMemoryShop {
    inner: Arc<Mutex<Inner>>,
    default_price: Money,
}

impl Default for InMemoryShop {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryShop {
    /// Create an empty shop. Volumes created by reconciliation are priced
    /// at 9.99 until a test overrides them.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            default_price: Money::from_cents(999),
        }
    }

    /// Seed one purchasable volume and return its id.
    pub fn seed_volume(&self, series_id: SeriesId, number: u32, unit_price: Money) -> VolumeId {
        let volume_id = VolumeId::new();
        super::lock(&self.inner).catalog.insert(
            volume_id,
            VolumePricing {
                volume_id,
                series_id,
                number,
                unit_price,
            },
        );
        volume_id
    }

    /// Change a seeded volume's catalog price.
    pub fn set_price(&self, volume_id: VolumeId, unit_price: Money) {
        if let Some(pricing) = super::lock(&self.inner).catalog.get_mut(&volume_id) {
            pricing.unit_price = unit_price;
        }
    }

    /// Current status of an order, by reference.
    #[must_use]
    pub fn order_status(&self, reference: OrderReference) -> Option<OrderStatus> {
        super::lock(&self.inner)
            .orders
            .iter()
            .find(|d| d.order.reference == reference)
            .map(|d| d.order.status)
    }

    /// Number of rows in the webhook ledger.
    #[must_use]
    pub fn ledger_len(&self) -> usize {
        super::lock(&self.inner).events.len()
    }

    /// Ledger row for an event id: `(event_type, payload, processed)`.
    #[must_use]
    pub fn ledger_event(&self, event_id: &str) -> Option<(String, serde_json::Value, bool)> {
        super::lock(&self.inner)
            .events
            .get(event_id)
            .map(|r| (r.event_type.clone(), r.payload.clone(), r.processed))
    }

    /// Number of orders ever committed.
    #[must_use]
    pub fn order_count(&self) -> usize {
        super::lock(&self.inner).orders.len()
    }
}

impl ShopStore for InMemoryShop {
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        Ok(super::lock(&self.inner)
            .carts
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn cart_add(
        &self,
        user_id: UserId,
        volume_id: VolumeId,
        quantity: u32,
    ) -> Result<CartLine> {
        let mut inner = super::lock(&self.inner);
        inner.bump_cart(user_id);
        let lines = inner.carts.entry(user_id).or_default();
        if let Some(line) = lines.iter_mut().find(|l| l.volume_id == volume_id) {
            line.quantity += quantity;
            return Ok(line.clone());
        }
        let line = CartLine {
            volume_id,
            quantity,
            added_at: Utc::now(),
        };
        lines.push(line.clone());
        Ok(line)
    }

    async fn cart_set_quantity(
        &self,
        user_id: UserId,
        volume_id: VolumeId,
        quantity: u32,
    ) -> Result<CartLine> {
        let mut inner = super::lock(&self.inner);
        inner.bump_cart(user_id);
        let line = inner
            .carts
            .get_mut(&user_id)
            .and_then(|lines| lines.iter_mut().find(|l| l.volume_id == volume_id))
            .ok_or(ShopError::NotFound {
                resource: "cart line",
            })?;
        line.quantity = quantity;
        Ok(line.clone())
    }

    async fn cart_remove(&self, user_id: UserId, volume_id: VolumeId) -> Result<bool> {
        let mut inner = super::lock(&self.inner);
        let Some(lines) = inner.carts.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = lines.len();
        lines.retain(|l| l.volume_id != volume_id);
        let removed = lines.len() < before;
        if removed {
            inner.bump_cart(user_id);
        }
        Ok(removed)
    }

    async fn cart_clear(&self, user_id: UserId) -> Result<()> {
        let mut inner = super::lock(&self.inner);
        inner.carts.remove(&user_id);
        inner.cart_versions.remove(&user_id);
        Ok(())
    }

    async fn commit_order(&self, user_id: UserId) -> Result<OrderDetail> {
        let mut inner = super::lock(&self.inner);
        let cart = inner.carts.get(&user_id).cloned().unwrap_or_default();
        if cart.is_empty() {
            return Err(ShopError::EmptyCart);
        }
        let versions = inner.cart_versions.entry(user_id).or_default();
        if versions.committed == Some(versions.version) {
            return Err(ShopError::Conflict {
                message: "cart already committed; modify it before committing again".to_string(),
            });
        }
        versions.committed = Some(versions.version);

        let mut lines = Vec::with_capacity(cart.len());
        for cart_line in &cart {
            let pricing =
                inner
                    .catalog
                    .get(&cart_line.volume_id)
                    .ok_or(ShopError::NotFound {
                        resource: "volume",
                    })?;
            lines.push(OrderLine {
                volume_id: cart_line.volume_id,
                series_id: pricing.series_id,
                number: pricing.number,
                quantity: cart_line.quantity,
                unit_price: pricing.unit_price,
            });
        }

        let now = Utc::now();
        let order = Order {
            id: OrderId::new(),
            reference: OrderReference::new(),
            user_id,
            status: OrderStatus::Pending,
            total_quantity: lines.iter().map(|l| l.quantity).sum(),
            total_price: lines.iter().map(OrderLine::line_total).sum(),
            created_at: now,
            modified_at: now,
        };
        let detail = OrderDetail { order, lines };
        inner.orders.push(detail.clone());
        Ok(detail)
    }

    async fn order_by_reference(
        &self,
        user_id: UserId,
        reference: OrderReference,
    ) -> Result<OrderDetail> {
        super::lock(&self.inner)
            .orders
            .iter()
            .find(|d| d.order.reference == reference && d.order.user_id == user_id)
            .cloned()
            .ok_or(ShopError::NotFound { resource: "order" })
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderDetail>> {
        let mut orders: Vec<OrderDetail> = super::lock(&self.inner)
            .orders
            .iter()
            .filter(|d| d.order.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.order.created_at.cmp(&a.order.created_at));
        Ok(orders)
    }

    async fn payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        Ok(super::lock(&self.inner)
            .payments
            .iter()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment> {
        let mut inner = super::lock(&self.inner);
        if let Some(existing) = inner.payments.iter().find(|p| p.order_id == payment.order_id) {
            if !matches!(
                existing.status,
                PaymentStatus::Failed | PaymentStatus::Cancelled
            ) {
                return Err(ShopError::DuplicatePayment);
            }
            // Superseding a dead intent: the order keeps exactly one row.
            inner.payments.retain(|p| p.order_id != payment.order_id);
        }
        let now = Utc::now();
        let row = Payment {
            id: PaymentId::new(),
            order_id: payment.order_id,
            transaction_id: payment.transaction_id,
            client_secret: payment.client_secret,
            status: payment.status,
            amount: payment.amount,
            currency: payment.currency,
            metadata: payment.metadata,
            created_at: now,
            modified_at: now,
        };
        inner.payments.push(row.clone());
        Ok(row)
    }

    async fn payment_by_lookup(&self, user_id: UserId, lookup: &str) -> Result<Payment> {
        let inner = super::lock(&self.inner);
        let local_id: Option<PaymentId> = lookup.parse().ok();
        inner
            .payments
            .iter()
            .find(|p| local_id == Some(p.id) || p.transaction_id == lookup)
            .filter(|p| {
                inner
                    .orders
                    .iter()
                    .any(|d| d.order.id == p.order_id && d.order.user_id == user_id)
            })
            .cloned()
            .ok_or(ShopError::NotFound {
                resource: "payment",
            })
    }

    async fn record_webhook_event(
        &self,
        event_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<EventDisposition> {
        let mut inner = super::lock(&self.inner);
        if let Some(record) = inner.events.get(event_id) {
            return Ok(if record.processed {
                EventDisposition::AlreadyProcessed
            } else {
                EventDisposition::Reapply
            });
        }
        inner.events.insert(
            event_id.to_string(),
            EventRecord {
                event_type: event_type.to_string(),
                payload,
                processed: false,
            },
        );
        Ok(EventDisposition::Fresh)
    }

    async fn mark_event_processed(&self, event_id: &str) -> Result<()> {
        if let Some(record) = super::lock(&self.inner).events.get_mut(event_id) {
            record.processed = true;
        }
        Ok(())
    }

    async fn apply_payment_success(
        &self,
        transaction_id: &str,
    ) -> Result<Option<SettlementOutcome>> {
        let mut inner = super::lock(&self.inner);
        let Some(payment) = inner
            .payments
            .iter_mut()
            .find(|p| p.transaction_id == transaction_id)
        else {
            return Ok(None);
        };
        payment.status = PaymentStatus::Succeeded;
        payment.modified_at = Utc::now();
        let order_id = payment.order_id;

        let Some(detail) = inner.orders.iter_mut().find(|d| d.order.id == order_id) else {
            return Ok(None);
        };
        let order_transitioned = detail.order.status == OrderStatus::Pending;
        if order_transitioned {
            detail.order.status = OrderStatus::Paid;
            detail.order.modified_at = Utc::now();
        }
        let receipt = OrderReceipt {
            reference: detail.order.reference,
            user_id: detail.order.user_id,
            total_quantity: detail.order.total_quantity,
            total_price: detail.order.total_price,
            lines: detail.lines.clone(),
        };
        let user_id = detail.order.user_id;
        let owned: Vec<OwnedVolume> = detail
            .lines
            .iter()
            .map(|l| OwnedVolume {
                volume_id: l.volume_id,
                series_id: l.series_id,
                number: l.number,
            })
            .collect();

        let grants = inner.grants.entry(user_id).or_default();
        for volume in owned {
            if !grants.iter().any(|g| g.volume_id == volume.volume_id) {
                grants.push(volume);
            }
        }
        inner.carts.remove(&user_id);
        inner.cart_versions.remove(&user_id);

        Ok(Some(SettlementOutcome {
            receipt,
            order_transitioned,
        }))
    }

    async fn apply_payment_failure(&self, transaction_id: &str) -> Result<bool> {
        let mut inner = super::lock(&self.inner);
        let Some(payment) = inner
            .payments
            .iter_mut()
            .find(|p| p.transaction_id == transaction_id)
        else {
            return Ok(false);
        };
        // An out-of-order failure after success must not regress the mirror.
        if payment.status != PaymentStatus::Succeeded {
            payment.status = PaymentStatus::Failed;
            payment.modified_at = Utc::now();
        }
        Ok(true)
    }

    async fn mirror_payment_status(
        &self,
        transaction_id: &str,
        status: PaymentStatus,
    ) -> Result<bool> {
        let mut inner = super::lock(&self.inner);
        let Some(payment) = inner
            .payments
            .iter_mut()
            .find(|p| p.transaction_id == transaction_id)
        else {
            return Ok(false);
        };
        if !payment.status.is_terminal() {
            payment.status = status;
            payment.modified_at = Utc::now();
        }
        Ok(true)
    }

    async fn has_access(&self, user_id: UserId, volume_id: VolumeId) -> Result<bool> {
        Ok(super::lock(&self.inner)
            .grants
            .get(&user_id)
            .is_some_and(|g| g.iter().any(|o| o.volume_id == volume_id)))
    }

    async fn owned_volumes(&self, user_id: UserId) -> Result<Vec<OwnedVolume>> {
        Ok(super::lock(&self.inner)
            .grants
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

impl CatalogProvider for InMemoryShop {
    async fn volume_pricing(&self, volume_id: VolumeId) -> Result<VolumePricing> {
        super::lock(&self.inner)
            .catalog
            .get(&volume_id)
            .cloned()
            .ok_or(ShopError::NotFound {
                resource: "volume",
            })
    }

    async fn reconcile_volume_count(
        &self,
        series_id: SeriesId,
        declared_count: u32,
    ) -> Result<VolumeReconciliation> {
        let mut inner = super::lock(&self.inner);
        let mut existing: Vec<VolumePricing> = inner
            .catalog
            .values()
            .filter(|p| p.series_id == series_id)
            .cloned()
            .collect();
        existing.sort_by_key(|p| p.number);

        let mut report = VolumeReconciliation::default();
        let current = u32::try_from(existing.len()).unwrap_or(u32::MAX);
        if current < declared_count {
            let next = existing.last().map_or(1, |p| p.number + 1);
            for number in next..next + (declared_count - current) {
                let volume_id = VolumeId::new();
                inner.catalog.insert(
                    volume_id,
                    VolumePricing {
                        volume_id,
                        series_id,
                        number,
                        unit_price: self.default_price,
                    },
                );
                report.created += 1;
            }
        } else {
            for pricing in existing.iter().skip(declared_count as usize) {
                inner.catalog.remove(&pricing.volume_id);
                report.pruned += 1;
            }
        }
        Ok(report)
    }
}
