//! Persistence seam for carts, orders, payments, the webhook ledger and
//! the ownership ledger.
//!
//! Every method on [`ShopStore`] is one logical operation and one atomic
//! unit: implementations must guarantee that partial writes are never
//! observable to other readers. The compound operations (`commit_order`,
//! `apply_payment_success`) exist precisely because their steps must share
//! a transaction; splitting them across calls would reintroduce the races
//! this core is built to rule out.

use crate::error::Result;
use crate::types::{
    CartLine, OrderDetail, OrderId, OrderReceipt, OrderReference, OwnedVolume, Payment,
    PaymentStatus, UserId, VolumeId,
};

/// Disposition of an inbound webhook event after the ledger write.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventDisposition {
    /// First sighting; apply side effects.
    Fresh,
    /// Seen before but a prior application attempt never completed;
    /// apply side effects again (they are idempotent).
    Reapply,
    /// Fully processed earlier; acknowledge without reapplying.
    AlreadyProcessed,
}

/// Fields for a new local payment mirror row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPayment {
    /// Order this payment settles.
    pub order_id: OrderId,
    /// Processor-assigned transaction id.
    pub transaction_id: String,
    /// Opaque client secret from the processor.
    pub client_secret: String,
    /// Initial mirrored status.
    pub status: PaymentStatus,
    /// Amount in minor units.
    pub amount: crate::types::Money,
    /// ISO currency code.
    pub currency: String,
    /// Processor metadata blob.
    pub metadata: serde_json::Value,
}

/// Outcome of applying a `payment_succeeded` event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementOutcome {
    /// Receipt for the paid order, for the notification collaborator.
    pub receipt: OrderReceipt,
    /// Whether this application transitioned the order PENDING → PAID.
    /// False on an idempotent re-application against an already-paid order.
    pub order_transitioned: bool,
}

/// Storage operations for the consistency core.
///
/// Serialization requirements:
/// - `commit_order` must serialize per user (two concurrent commits from
///   the same user must not both succeed against the same cart state);
/// - `apply_payment_success` / `apply_payment_failure` must serialize per
///   payment, keyed by processor transaction id.
pub trait ShopStore: Send + Sync {
    // ───────────────────────────── Cart ─────────────────────────────

    /// All lines of the user's cart. The cart itself is created lazily.
    fn cart_lines(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<CartLine>>> + Send;

    /// Upsert a cart line: insert with `quantity`, or add `quantity` to an
    /// existing line. Returns the resulting line.
    fn cart_add(
        &self,
        user_id: UserId,
        volume_id: VolumeId,
        quantity: u32,
    ) -> impl std::future::Future<Output = Result<CartLine>> + Send;

    /// Overwrite the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// `ShopError::NotFound` if the volume is not in the cart.
    fn cart_set_quantity(
        &self,
        user_id: UserId,
        volume_id: VolumeId,
        quantity: u32,
    ) -> impl std::future::Future<Output = Result<CartLine>> + Send;

    /// Delete a line. Returns `false` if the volume was not in the cart.
    fn cart_remove(
        &self,
        user_id: UserId,
        volume_id: VolumeId,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Delete all lines of the user's cart.
    fn cart_clear(&self, user_id: UserId) -> impl std::future::Future<Output = Result<()>> + Send;

    // ──────────────────────────── Orders ────────────────────────────

    /// Run the commit protocol: lock the user's cart, snapshot totals and
    /// per-line catalog prices, create the order and its write-once lines,
    /// all in one transaction. The cart is left intact.
    ///
    /// Each cart state commits at most once: the cart carries a mutation
    /// version, and the transaction records the version it committed.
    /// Locking alone would only serialize a double-commit race; the version
    /// check is what makes the loser fail instead of minting a second order.
    ///
    /// # Errors
    ///
    /// - `ShopError::EmptyCart` if the cart has no lines at lock time;
    /// - `ShopError::Conflict` if the cart is unchanged since its last
    ///   commit.
    fn commit_order(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<OrderDetail>> + Send;

    /// Resolve an order by its opaque reference, scoped to the user.
    ///
    /// # Errors
    ///
    /// `ShopError::NotFound` if the reference does not exist *or* belongs
    /// to another user; the two cases are indistinguishable to the caller.
    fn order_by_reference(
        &self,
        user_id: UserId,
        reference: OrderReference,
    ) -> impl std::future::Future<Output = Result<OrderDetail>> + Send;

    /// All orders of the user, newest first, with line snapshots.
    fn orders_for_user(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<OrderDetail>>> + Send;

    // ─────────────────────────── Payments ───────────────────────────

    /// The payment for an order, if one exists.
    fn payment_for_order(
        &self,
        order_id: OrderId,
    ) -> impl std::future::Future<Output = Result<Option<Payment>>> + Send;

    /// Insert the local payment mirror row, superseding (replacing the row
    /// of) a FAILED or CANCELLED predecessor. The order keeps at most one
    /// payment row at all times.
    ///
    /// # Errors
    ///
    /// `ShopError::DuplicatePayment` if a PENDING or SUCCEEDED payment
    /// already exists for the order (unique constraint backstop behind the
    /// caller's pre-check).
    fn insert_payment(
        &self,
        payment: NewPayment,
    ) -> impl std::future::Future<Output = Result<Payment>> + Send;

    /// Look up a payment by local id or processor transaction id, scoped
    /// to the user owning its order.
    ///
    /// # Errors
    ///
    /// `ShopError::NotFound` if nothing matches for this user.
    fn payment_by_lookup(
        &self,
        user_id: UserId,
        lookup: &str,
    ) -> impl std::future::Future<Output = Result<Payment>> + Send;

    // ─────────────────────── Webhook ledger ─────────────────────────

    /// Record an inbound event in the dedup ledger (`processed = false`)
    /// and report its disposition. The processor event id is globally
    /// unique; recording the same id twice must not create a second row.
    fn record_webhook_event(
        &self,
        event_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> impl std::future::Future<Output = Result<EventDisposition>> + Send;

    /// Flip `processed = true`. Called only after event application has
    /// durably committed; a crash before this leaves the event eligible
    /// for re-application on redelivery.
    fn mark_event_processed(
        &self,
        event_id: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Apply a successful payment in one atomic transaction: payment →
    /// SUCCEEDED, order PENDING → PAID (never regressing a later state),
    /// one ownership grant per distinct volume in the order, cart cleared.
    ///
    /// Returns `None` when no local payment matches the transaction id;
    /// the caller acknowledges anyway.
    fn apply_payment_success(
        &self,
        transaction_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<SettlementOutcome>>> + Send;

    /// Mark the payment FAILED. The order stays PENDING; cart and
    /// ownership are untouched. Returns `false` when no payment matches.
    fn apply_payment_failure(
        &self,
        transaction_id: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Mirror a pass-through processor status (REQUIRES_ACTION, CANCELLED)
    /// onto the payment without further side effects. Returns `false` when
    /// no payment matches.
    fn mirror_payment_status(
        &self,
        transaction_id: &str,
        status: PaymentStatus,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    // ─────────────────────── Ownership ledger ───────────────────────

    /// Whether the user owns the volume.
    fn has_access(
        &self,
        user_id: UserId,
        volume_id: VolumeId,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// All volumes the user owns.
    fn owned_volumes(
        &self,
        user_id: UserId,
    ) -> impl std::future::Future<Output = Result<Vec<OwnedVolume>>> + Send;
}
