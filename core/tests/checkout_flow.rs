//! End-to-end checkout flows over the in-memory collaborators: cart
//! mutations, commit, intent creation, and webhook settlement.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;
use tomeshop_core::mocks::{
    InMemoryShop, MockNotifier, MockPaymentProcessor, MockTaskQueue,
};
use tomeshop_core::providers::{CatalogProvider, TaskQueueNotifier};
use tomeshop_core::store::ShopStore;
use tomeshop_core::types::Payment;
use tomeshop_core::{
    Money, OrderStatus, PaymentStatus, SeriesId, ShopEnvironment, ShopError, UserId, VolumeId,
    WebhookOutcome,
};

type TestEnv =
    ShopEnvironment<InMemoryShop, InMemoryShop, MockPaymentProcessor, MockNotifier, MockTaskQueue>;

fn shop_env() -> (TestEnv, InMemoryShop) {
    let shop = InMemoryShop::new();
    let env = ShopEnvironment::new(
        shop.clone(),
        shop.clone(),
        MockPaymentProcessor::default(),
        MockNotifier::new(),
        MockTaskQueue::new(),
    );
    (env, shop)
}

fn signed_event(event_type: &str, event_id: &str, transaction_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": event_id,
        "type": event_type,
        "data": { "object": { "id": transaction_id, "status": "whatever" } }
    }))
    .unwrap()
}

/// Drive one user from an empty cart to a created payment intent.
async fn checkout(env: &TestEnv, shop: &InMemoryShop, user: UserId) -> (VolumeId, Payment) {
    let series = SeriesId::new();
    let volume = shop.seed_volume(series, 1, Money::from_cents(1000));
    env.add_to_cart(user, volume, 2).await.unwrap();
    let order = env.commit_order(user).await.unwrap();
    let payment = env
        .create_payment_intent(user, order.order.reference)
        .await
        .unwrap();
    (volume, payment)
}

#[tokio::test]
async fn cart_totals_follow_mutation_sequence() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let series = SeriesId::new();
    let a = shop.seed_volume(series, 1, Money::from_cents(1000));
    let b = shop.seed_volume(series, 2, Money::from_cents(500));

    let view = env.add_to_cart(user, a, 2).await.unwrap();
    assert_eq!(view.total_quantity, 2);
    assert_eq!(view.total_price, Money::from_cents(2000));

    // Repeat add is additive.
    let view = env.add_to_cart(user, a, 1).await.unwrap();
    assert_eq!(view.total_quantity, 3);

    let view = env.add_to_cart(user, b, 1).await.unwrap();
    assert_eq!(view.total_quantity, 4);
    assert_eq!(view.total_price, Money::from_cents(3500));

    let view = env.set_cart_quantity(user, a, 1).await.unwrap();
    assert_eq!(view.total_quantity, 2);
    assert_eq!(view.total_price, Money::from_cents(1500));

    let view = env.remove_from_cart(user, b).await.unwrap();
    assert_eq!(view.lines.len(), 1);
    assert_eq!(view.total_price, Money::from_cents(1000));

    env.clear_cart(user).await.unwrap();
    let view = env.cart(user).await.unwrap();
    assert!(view.lines.is_empty());
    assert_eq!(view.total_quantity, 0);
    assert_eq!(view.total_price, Money::ZERO);
}

#[tokio::test]
async fn quantity_policy_binds_set_quantity_but_not_add() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let volume = shop.seed_volume(SeriesId::new(), 1, Money::from_cents(1000));

    // Repeated adds accumulate past the default maximum of 10.
    env.add_to_cart(user, volume, 9).await.unwrap();
    let view = env.add_to_cart(user, volume, 2).await.unwrap();
    assert_eq!(view.total_quantity, 11);

    let err = env.set_cart_quantity(user, volume, 11).await.unwrap_err();
    assert!(matches!(err, ShopError::Validation { .. }));

    // The rejected set left the line untouched.
    let view = env.cart(user).await.unwrap();
    assert_eq!(view.total_quantity, 11);
}

#[tokio::test]
async fn set_quantity_zero_removes_the_line() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let volume = shop.seed_volume(SeriesId::new(), 1, Money::from_cents(1000));

    env.add_to_cart(user, volume, 3).await.unwrap();
    let view = env.set_cart_quantity(user, volume, 0).await.unwrap();
    assert!(view.lines.is_empty());
}

#[tokio::test]
async fn unknown_volume_and_absent_line_are_not_found() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let volume = shop.seed_volume(SeriesId::new(), 1, Money::from_cents(1000));

    let err = env.add_to_cart(user, VolumeId::new(), 1).await.unwrap_err();
    assert!(matches!(err, ShopError::NotFound { .. }));

    let err = env.remove_from_cart(user, volume).await.unwrap_err();
    assert!(matches!(err, ShopError::NotFound { .. }));
}

#[tokio::test]
async fn committing_an_empty_cart_fails() {
    let (env, shop) = shop_env();
    let user = UserId::new();

    let err = env.commit_order(user).await.unwrap_err();
    assert!(matches!(err, ShopError::EmptyCart));
    assert_eq!(shop.order_count(), 0);
}

#[tokio::test]
async fn commit_snapshots_prices_against_later_catalog_changes() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let series = SeriesId::new();
    let a = shop.seed_volume(series, 1, Money::from_cents(1000));
    let b = shop.seed_volume(series, 2, Money::from_cents(500));

    env.add_to_cart(user, a, 2).await.unwrap();
    env.add_to_cart(user, b, 1).await.unwrap();
    let detail = env.commit_order(user).await.unwrap();

    assert_eq!(detail.order.status, OrderStatus::Pending);
    assert_eq!(detail.order.total_quantity, 3);
    assert_eq!(detail.order.total_price, Money::from_cents(2500));
    assert_eq!(detail.lines.len(), 2);

    // The cart survives the commit untouched.
    let view = env.cart(user).await.unwrap();
    assert_eq!(view.total_quantity, 3);

    // A price change after commit moves the cart, never the order.
    shop.set_price(a, Money::from_cents(9900));
    let view = env.cart(user).await.unwrap();
    assert_eq!(view.total_price, Money::from_cents(20300));

    let frozen = env
        .order_detail(user, detail.order.reference)
        .await
        .unwrap();
    assert_eq!(frozen.order.total_price, Money::from_cents(2500));
    let line_a = frozen.lines.iter().find(|l| l.volume_id == a).unwrap();
    assert_eq!(line_a.unit_price, Money::from_cents(1000));
}

#[tokio::test]
async fn unchanged_cart_commits_only_once() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let volume = shop.seed_volume(SeriesId::new(), 1, Money::from_cents(1000));

    env.add_to_cart(user, volume, 1).await.unwrap();
    env.commit_order(user).await.unwrap();

    let err = env.commit_order(user).await.unwrap_err();
    assert!(matches!(err, ShopError::Conflict { .. }));
    assert_eq!(shop.order_count(), 1);

    // Any mutation re-arms the cart for another commit.
    env.add_to_cart(user, volume, 1).await.unwrap();
    env.commit_order(user).await.unwrap();
    assert_eq!(shop.order_count(), 2);
}

#[tokio::test]
async fn concurrent_commits_yield_exactly_one_order() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let volume = shop.seed_volume(SeriesId::new(), 1, Money::from_cents(1000));
    env.add_to_cart(user, volume, 1).await.unwrap();

    let left = tokio::spawn({
        let env = env.clone();
        async move { env.commit_order(user).await }
    });
    let right = tokio::spawn({
        let env = env.clone();
        async move { env.commit_order(user).await }
    });
    let (left, right) = (left.await.unwrap(), right.await.unwrap());

    assert_eq!(
        usize::from(left.is_ok()) + usize::from(right.is_ok()),
        1,
        "exactly one commit must win"
    );
    assert_eq!(shop.order_count(), 1);
}

#[tokio::test]
async fn second_intent_for_a_live_payment_is_rejected() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let (_, payment) = checkout(&env, &shop, user).await;
    assert_eq!(payment.status, PaymentStatus::Pending);

    let order = &env.order_history(user).await.unwrap()[0].order;
    let err = env
        .create_payment_intent(user, order.reference)
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::DuplicatePayment));

    // Exactly one row exists.
    let row = env.store.payment_for_order(order.id).await.unwrap().unwrap();
    assert_eq!(row.transaction_id, payment.transaction_id);
}

#[tokio::test]
async fn intent_carries_frozen_amount_and_idempotency_key() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let (_, _) = checkout(&env, &shop, user).await;

    let order = &env.order_history(user).await.unwrap()[0].order;
    let requests = env.processor.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount, Money::from_cents(2000));
    assert_eq!(
        requests[0].idempotency_key,
        format!("order-{}", order.reference)
    );
    assert_eq!(
        requests[0].metadata["order_reference"],
        order.reference.to_string()
    );
}

#[tokio::test]
async fn processor_failure_commits_no_local_state() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let volume = shop.seed_volume(SeriesId::new(), 1, Money::from_cents(1000));
    env.add_to_cart(user, volume, 1).await.unwrap();
    let detail = env.commit_order(user).await.unwrap();

    env.processor.fail_next_create();
    let err = env
        .create_payment_intent(user, detail.order.reference)
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::ExternalService { .. }));
    assert!(env
        .store
        .payment_for_order(detail.order.id)
        .await
        .unwrap()
        .is_none());

    // The retry goes through cleanly.
    env.create_payment_intent(user, detail.order.reference)
        .await
        .unwrap();
}

#[tokio::test]
async fn orders_are_scoped_to_their_owner() {
    let (env, shop) = shop_env();
    let owner = UserId::new();
    let stranger = UserId::new();
    let (_, payment) = checkout(&env, &shop, owner).await;
    let order = &env.order_history(owner).await.unwrap()[0].order;

    let err = env.order_detail(stranger, order.reference).await.unwrap_err();
    assert!(matches!(err, ShopError::NotFound { .. }));

    let err = env
        .payment_status(stranger, &payment.transaction_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::NotFound { .. }));
}

#[tokio::test]
async fn payment_status_resolves_local_and_processor_ids() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let (_, payment) = checkout(&env, &shop, user).await;

    let by_local = env
        .payment_status(user, &payment.id.to_string())
        .await
        .unwrap();
    let by_txn = env
        .payment_status(user, &payment.transaction_id)
        .await
        .unwrap();
    assert_eq!(by_local.id, payment.id);
    assert_eq!(by_txn.id, payment.id);
}

#[tokio::test]
async fn webhook_success_settles_the_order() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let (volume, payment) = checkout(&env, &shop, user).await;
    let reference = env.order_history(user).await.unwrap()[0].order.reference;

    let payload = signed_event("payment_intent.succeeded", "evt_1", &payment.transaction_id);
    let signature = env.processor.valid_signature().to_string();
    let outcome = env.handle_webhook(&payload, &signature).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Applied);

    assert_eq!(shop.order_status(reference), Some(OrderStatus::Paid));
    assert!(env.has_access(user, volume).await.unwrap());
    assert!(env.cart(user).await.unwrap().lines.is_empty());

    let settled = env
        .payment_status(user, &payment.transaction_id)
        .await
        .unwrap();
    assert_eq!(settled.status, PaymentStatus::Succeeded);

    let sent = env.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].reference, reference);
}

#[tokio::test]
async fn replayed_webhook_event_is_a_noop() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let (volume, payment) = checkout(&env, &shop, user).await;

    let payload = signed_event("payment_intent.succeeded", "evt_1", &payment.transaction_id);
    let signature = env.processor.valid_signature().to_string();
    let first = env.handle_webhook(&payload, &signature).await.unwrap();
    assert_eq!(first, WebhookOutcome::Applied);
    let second = env.handle_webhook(&payload, &signature).await.unwrap();
    assert_eq!(second, WebhookOutcome::Duplicate);

    // One transition, one grant set, one notification.
    assert_eq!(env.notifier.sent().len(), 1);
    let owned = env.collection(user).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].volume_id, volume);
    assert_eq!(shop.ledger_len(), 1);
}

#[tokio::test]
async fn interrupted_event_application_is_retried_on_redelivery() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let (volume, payment) = checkout(&env, &shop, user).await;
    let reference = env.order_history(user).await.unwrap()[0].order.reference;

    // A delivery that crashed after the ledger write leaves the row with
    // `processed = false`; plant that state directly.
    let payload = signed_event("payment_intent.succeeded", "evt_1", &payment.transaction_id);
    let parsed: serde_json::Value = serde_json::from_slice(&payload).unwrap();
    shop.record_webhook_event("evt_1", "payment_intent.succeeded", parsed)
        .await
        .unwrap();
    let (_, _, processed) = shop.ledger_event("evt_1").unwrap();
    assert!(!processed);
    assert_eq!(shop.order_status(reference), Some(OrderStatus::Pending));

    // Redelivery of the same event id applies the side effects in full.
    let signature = env.processor.valid_signature().to_string();
    let outcome = env.handle_webhook(&payload, &signature).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Applied);

    assert_eq!(shop.order_status(reference), Some(OrderStatus::Paid));
    assert_eq!(env.collection(user).await.unwrap().len(), 1);
    assert!(env.has_access(user, volume).await.unwrap());
    assert_eq!(env.notifier.sent().len(), 1);

    // The ledger row flipped to processed without a second row appearing,
    // so a further replay is a no-op.
    assert_eq!(shop.ledger_len(), 1);
    let (_, _, processed) = shop.ledger_event("evt_1").unwrap();
    assert!(processed);
    let outcome = env.handle_webhook(&payload, &signature).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Duplicate);
}

#[tokio::test]
async fn payment_failure_keeps_the_order_payable() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let (volume, payment) = checkout(&env, &shop, user).await;
    let reference = env.order_history(user).await.unwrap()[0].order.reference;

    let payload = signed_event(
        "payment_intent.payment_failed",
        "evt_1",
        &payment.transaction_id,
    );
    let signature = env.processor.valid_signature().to_string();
    let outcome = env.handle_webhook(&payload, &signature).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::FailureRecorded);

    // Order still PENDING, cart intact, nothing granted or notified.
    assert_eq!(shop.order_status(reference), Some(OrderStatus::Pending));
    assert!(!env.has_access(user, volume).await.unwrap());
    assert!(!env.cart(user).await.unwrap().lines.is_empty());
    assert!(env.notifier.sent().is_empty());

    // A fresh intent supersedes the failed one and can settle.
    let retry = env.create_payment_intent(user, reference).await.unwrap();
    assert_ne!(retry.transaction_id, payment.transaction_id);

    let payload = signed_event("payment_intent.succeeded", "evt_2", &retry.transaction_id);
    let outcome = env.handle_webhook(&payload, &signature).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Applied);
    assert_eq!(shop.order_status(reference), Some(OrderStatus::Paid));
}

#[tokio::test]
async fn bad_signature_leaves_no_ledger_trace() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let (_, payment) = checkout(&env, &shop, user).await;

    let payload = signed_event("payment_intent.succeeded", "evt_1", &payment.transaction_id);
    let err = env.handle_webhook(&payload, "t=0,v1=garbage").await.unwrap_err();
    assert!(matches!(err, ShopError::InvalidSignature));
    assert_eq!(shop.ledger_len(), 0);
}

#[tokio::test]
async fn unknown_transactions_and_event_types_are_acknowledged() {
    let (env, shop) = shop_env();
    let signature = env.processor.valid_signature().to_string();

    let payload = signed_event("payment_intent.succeeded", "evt_1", "pi_nobody");
    let outcome = env.handle_webhook(&payload, &signature).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Unmatched);

    let payload = signed_event("charge.refunded", "evt_2", "pi_nobody");
    let outcome = env.handle_webhook(&payload, &signature).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);

    // Both deliveries were durably recorded and marked processed.
    assert_eq!(shop.ledger_len(), 2);
    for id in ["evt_1", "evt_2"] {
        let (_, _, processed) = shop.ledger_event(id).unwrap();
        assert!(processed);
    }
}

#[tokio::test]
async fn pass_through_statuses_are_mirrored_without_side_effects() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let (volume, payment) = checkout(&env, &shop, user).await;

    let payload = signed_event(
        "payment_intent.requires_action",
        "evt_1",
        &payment.transaction_id,
    );
    let signature = env.processor.valid_signature().to_string();
    let outcome = env.handle_webhook(&payload, &signature).await.unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::StatusMirrored(PaymentStatus::RequiresAction)
    );

    let mirrored = env
        .payment_status(user, &payment.transaction_id)
        .await
        .unwrap();
    assert_eq!(mirrored.status, PaymentStatus::RequiresAction);
    assert!(!env.has_access(user, volume).await.unwrap());
    assert!(!env.cart(user).await.unwrap().lines.is_empty());
}

#[tokio::test]
async fn notification_failure_never_blocks_acknowledgment() {
    let (env, shop) = shop_env();
    let user = UserId::new();
    let (_, payment) = checkout(&env, &shop, user).await;
    let reference = env.order_history(user).await.unwrap()[0].order.reference;

    env.notifier.fail_all();
    let payload = signed_event("payment_intent.succeeded", "evt_1", &payment.transaction_id);
    let signature = env.processor.valid_signature().to_string();
    let outcome = env.handle_webhook(&payload, &signature).await.unwrap();

    assert_eq!(outcome, WebhookOutcome::Applied);
    assert_eq!(shop.order_status(reference), Some(OrderStatus::Paid));
}

#[tokio::test]
async fn settlement_queues_an_order_confirmation_task() {
    let shop = InMemoryShop::new();
    let queue = MockTaskQueue::new();
    let env = ShopEnvironment::new(
        shop.clone(),
        shop.clone(),
        MockPaymentProcessor::default(),
        TaskQueueNotifier::new(queue.clone()),
        queue.clone(),
    );
    let user = UserId::new();
    let volume = shop.seed_volume(SeriesId::new(), 1, Money::from_cents(1500));
    env.add_to_cart(user, volume, 1).await.unwrap();
    let detail = env.commit_order(user).await.unwrap();
    let payment = env
        .create_payment_intent(user, detail.order.reference)
        .await
        .unwrap();

    let payload = signed_event("payment_intent.succeeded", "evt_1", &payment.transaction_id);
    let signature = env.processor.valid_signature().to_string();
    env.handle_webhook(&payload, &signature).await.unwrap();

    let submitted = queue.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].0, "send_order_confirmation");
    assert_eq!(
        submitted[0].1["reference"],
        detail.order.reference.to_string()
    );
}

#[tokio::test]
async fn volume_reconciliation_creates_and_prunes() {
    let (env, shop) = shop_env();
    let series = SeriesId::new();
    shop.seed_volume(series, 1, Money::from_cents(1000));

    let report = env.catalog.reconcile_volume_count(series, 4).await.unwrap();
    assert_eq!(report.created, 3);
    assert_eq!(report.pruned, 0);

    let report = env.catalog.reconcile_volume_count(series, 2).await.unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.pruned, 2);

    let report = env.catalog.reconcile_volume_count(series, 2).await.unwrap();
    assert_eq!(report, Default::default());
}
