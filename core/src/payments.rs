//! Payment intent bridge: local orders to the external processor.
//!
//! The bridge enforces the 1:1 order/intent invariant on the local side and
//! leans on the processor's idempotency key on the remote side. Ordering
//! matters: the external call happens first and the local mirror row is
//! persisted only once the processor has answered, so a crash in between
//! leaves no local row claiming an intent that may not exist. The reverse
//! gap (remote intent, no local row) is resolved by the idempotency key on
//! the user's retry.

use crate::environment::ShopEnvironment;
use crate::error::{Result, ShopError};
use crate::providers::{
    CatalogProvider, CreateIntentRequest, Notifier, PaymentProcessor, TaskQueue,
};
use crate::store::{NewPayment, ShopStore};
use crate::types::{OrderReference, Payment, PaymentStatus, UserId};

impl<S, C, P, N, Q> ShopEnvironment<S, C, P, N, Q>
where
    S: ShopStore,
    C: CatalogProvider,
    P: PaymentProcessor,
    N: Notifier,
    Q: TaskQueue,
{
    /// Create the payment intent for a PENDING order.
    ///
    /// A FAILED or CANCELLED predecessor intent is superseded: its row is
    /// replaced and the processor is asked for a fresh transaction. A
    /// PENDING or SUCCEEDED predecessor blocks creation.
    ///
    /// The returned [`Payment`] carries the client secret the payer's
    /// client-side SDK needs to complete the charge.
    ///
    /// # Errors
    ///
    /// - [`ShopError::NotFound`] for an unknown or cross-user reference;
    /// - [`ShopError::OrderNotPayable`] unless the order is PENDING;
    /// - [`ShopError::DuplicatePayment`] if a live intent already exists;
    /// - [`ShopError::ExternalService`] when the processor call fails or
    ///   times out.
    pub async fn create_payment_intent(
        &self,
        user_id: UserId,
        reference: OrderReference,
    ) -> Result<Payment> {
        let detail = self.store.order_by_reference(user_id, reference).await?;
        let order = &detail.order;

        if !order.status.is_payable() {
            return Err(ShopError::OrderNotPayable {
                status: order.status,
            });
        }
        // Deterministic per attempt: the first intent keys on the order
        // alone; a supersede keys on the dead transaction it replaces. A
        // retried call therefore resolves to the same remote intent, while
        // each new attempt reaches the processor as a new transaction.
        let idempotency_key = match self.store.payment_for_order(order.id).await? {
            None => format!("order-{reference}"),
            Some(previous)
                if matches!(
                    previous.status,
                    PaymentStatus::Failed | PaymentStatus::Cancelled
                ) =>
            {
                format!("order-{reference}-after-{}", previous.transaction_id)
            }
            Some(_) => return Err(ShopError::DuplicatePayment),
        };

        let metadata = serde_json::json!({
            "order_reference": order.reference.to_string(),
            "user_id": order.user_id.to_string(),
        });
        let request = CreateIntentRequest {
            amount: order.total_price,
            currency: self.payment.currency.clone(),
            metadata,
            idempotency_key,
        };

        let intent = self.processor.create_intent(&request).await?;
        tracing::info!(
            %reference,
            transaction_id = %intent.transaction_id,
            amount = %order.total_price,
            "payment intent created"
        );
        metrics::counter!("tomeshop_payment_intents_total").increment(1);

        // The unique constraint on order_id backstops the pre-check above
        // against a concurrent creation racing the processor call.
        self.store
            .insert_payment(NewPayment {
                order_id: order.id,
                transaction_id: intent.transaction_id,
                client_secret: intent.client_secret,
                status: PaymentStatus::from_processor(&intent.status),
                amount: order.total_price,
                currency: self.payment.currency.clone(),
                metadata: intent.metadata,
            })
            .await
    }

    /// Look up a payment by local id or processor transaction id, scoped to
    /// the user owning its order.
    ///
    /// # Errors
    ///
    /// Returns [`ShopError::NotFound`] when nothing matches for this user.
    pub async fn payment_status(&self, user_id: UserId, lookup: &str) -> Result<Payment> {
        self.store.payment_by_lookup(user_id, lookup).await
    }
}
