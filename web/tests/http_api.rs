//! HTTP-level tests over the full router with in-memory collaborators:
//! authentication, the checkout flow, webhook acknowledgment semantics and
//! error mapping.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::json;
use tomeshop_core::mocks::{
    InMemoryShop, MockNotifier, MockPaymentProcessor, MockTaskQueue, MockTokenVerifier,
};
use tomeshop_core::providers::TaskHandle;
use tomeshop_core::types::{CartView, OrderDetail, Payment};
use tomeshop_core::{
    Money, OrderStatus, PaymentStatus, SeriesId, ShopEnvironment, UserId, VolumeId,
};
use tomeshop_web::middleware::CORRELATION_ID_HEADER;
use tomeshop_web::{AppState, router};

struct TestApp {
    server: TestServer,
    shop: InMemoryShop,
    processor: MockPaymentProcessor,
    verifier: MockTokenVerifier,
    tasks: MockTaskQueue,
}

fn test_app() -> TestApp {
    let shop = InMemoryShop::new();
    let processor = MockPaymentProcessor::default();
    let tasks = MockTaskQueue::new();
    let verifier = MockTokenVerifier::new();
    let env = ShopEnvironment::new(
        shop.clone(),
        shop.clone(),
        processor.clone(),
        MockNotifier::new(),
        tasks.clone(),
    );
    let server = TestServer::new(router(AppState::new(env, verifier.clone()))).unwrap();
    TestApp {
        server,
        shop,
        processor,
        verifier,
        tasks,
    }
}

fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authorization"),
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

fn signed_event(event_type: &str, event_id: &str, transaction_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": event_id,
        "type": event_type,
        "data": { "object": { "id": transaction_id } }
    }))
    .unwrap()
}

impl TestApp {
    fn login(&self) -> (UserId, (HeaderName, HeaderValue)) {
        let user = UserId::new();
        let token = self.verifier.issue(user);
        (user, bearer(&token))
    }

    fn seed_volume(&self, cents: i64) -> VolumeId {
        self.shop
            .seed_volume(SeriesId::new(), 1, Money::from_cents(cents))
    }
}

#[tokio::test]
async fn health_needs_no_token() {
    let app = test_app();
    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn responses_echo_a_correlation_id() {
    let app = test_app();
    let response = app.server.get("/health").await;
    assert!(response.headers().contains_key(CORRELATION_ID_HEADER));
}

#[tokio::test]
async fn authenticated_routes_reject_missing_and_unknown_tokens() {
    let app = test_app();

    let response = app.server.get("/api/cart").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let (name, value) = bearer("tok_nobody_issued_this");
    let response = app.server.get("/api/cart").add_header(name, value).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn checkout_flow_over_http() {
    let app = test_app();
    let (_user, (name, value)) = app.login();
    let volume = app.seed_volume(1250);

    let response = app
        .server
        .post("/api/cart/items")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "volume_id": volume, "quantity": 2 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let cart: CartView = response.json();
    assert_eq!(cart.total_quantity, 2);
    assert_eq!(cart.total_price, Money::from_cents(2500));

    let response = app
        .server
        .post("/api/orders")
        .add_header(name.clone(), value.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let order: OrderDetail = response.json();
    assert_eq!(order.order.status, OrderStatus::Pending);
    assert_eq!(order.order.total_price, Money::from_cents(2500));

    let reference = order.order.reference;
    let response = app
        .server
        .post(&format!("/api/orders/{reference}/payment-intent"))
        .add_header(name.clone(), value.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let payment: Payment = response.json();
    assert_eq!(payment.amount, Money::from_cents(2500));
    assert!(!payment.client_secret.is_empty());

    // Settlement arrives over the webhook, never from the client.
    let body = signed_event("payment_intent.succeeded", "evt_1", &payment.transaction_id);
    let signature = app.processor.valid_signature().to_string();
    let response = app
        .server
        .post("/api/webhooks/payment")
        .add_header(
            HeaderName::from_static("stripe-signature"),
            HeaderValue::from_str(&signature).unwrap(),
        )
        .bytes(body.into())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<serde_json::Value>()["outcome"], "applied");

    let response = app
        .server
        .get(&format!("/api/orders/{reference}"))
        .add_header(name.clone(), value.clone())
        .await;
    let order: OrderDetail = response.json();
    assert_eq!(order.order.status, OrderStatus::Paid);

    let response = app
        .server
        .get("/api/collection")
        .add_header(name.clone(), value.clone())
        .await;
    let owned: Vec<serde_json::Value> = response.json();
    assert_eq!(owned.len(), 1);

    // The cart was consumed by settlement.
    let response = app.server.get("/api/cart").add_header(name, value).await;
    let cart: CartView = response.json();
    assert_eq!(cart.total_quantity, 0);
}

#[tokio::test]
async fn cart_validation_errors_map_to_422() {
    let app = test_app();
    let (_user, (name, value)) = app.login();
    let volume = app.seed_volume(1000);

    let response = app
        .server
        .post("/api/cart/items")
        .add_header(name, value)
        .json(&json!({ "volume_id": volume, "quantity": 0 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        response.json::<serde_json::Value>()["code"],
        "VALIDATION_ERROR"
    );
}

#[tokio::test]
async fn committing_an_empty_cart_is_a_conflict() {
    let app = test_app();
    let (_user, (name, value)) = app.login();

    let response = app.server.post("/api/orders").add_header(name, value).await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(response.json::<serde_json::Value>()["code"], "EMPTY_CART");
}

#[tokio::test]
async fn orders_are_invisible_across_users() {
    let app = test_app();
    let (_alice, (a_name, a_value)) = app.login();
    let (_mallory, (m_name, m_value)) = app.login();
    let volume = app.seed_volume(1000);

    app.server
        .post("/api/cart/items")
        .add_header(a_name.clone(), a_value.clone())
        .json(&json!({ "volume_id": volume, "quantity": 1 }))
        .await;
    let order: OrderDetail = app
        .server
        .post("/api/orders")
        .add_header(a_name, a_value)
        .await
        .json();

    let response = app
        .server
        .get(&format!("/api/orders/{}", order.order.reference))
        .add_header(m_name, m_value)
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_rejects_a_bad_signature() {
    let app = test_app();
    let body = signed_event("payment_intent.succeeded", "evt_1", "pi_unknown");

    let response = app
        .server
        .post("/api/webhooks/payment")
        .add_header(
            HeaderName::from_static("stripe-signature"),
            HeaderValue::from_static("not-the-secret"),
        )
        .bytes(body.into())
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    // A forged delivery must leave no ledger trace.
    assert_eq!(app.shop.ledger_len(), 0);

    let response = app
        .server
        .post("/api/webhooks/payment")
        .bytes(signed_event("payment_intent.succeeded", "evt_1", "x").into())
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_acknowledges_unmatched_and_ignored_events() {
    let app = test_app();
    let signature = app.processor.valid_signature().to_string();

    for (event_type, event_id, expected) in [
        ("payment_intent.succeeded", "evt_a", "unmatched"),
        ("charge.refunded", "evt_b", "ignored"),
    ] {
        let response = app
            .server
            .post("/api/webhooks/payment")
            .add_header(
                HeaderName::from_static("stripe-signature"),
                HeaderValue::from_str(&signature).unwrap(),
            )
            .bytes(signed_event(event_type, event_id, "pi_unknown").into())
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<serde_json::Value>()["outcome"], expected);
    }
}

#[tokio::test]
async fn second_intent_for_a_live_payment_is_a_conflict() {
    let app = test_app();
    let (_user, (name, value)) = app.login();
    let volume = app.seed_volume(1000);

    app.server
        .post("/api/cart/items")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "volume_id": volume, "quantity": 1 }))
        .await;
    let order: OrderDetail = app
        .server
        .post("/api/orders")
        .add_header(name.clone(), value.clone())
        .await
        .json();
    let path = format!("/api/orders/{}/payment-intent", order.order.reference);

    let first = app
        .server
        .post(&path)
        .add_header(name.clone(), value.clone())
        .await;
    assert_eq!(first.status_code(), StatusCode::CREATED);

    let second = app.server.post(&path).add_header(name, value).await;
    assert_eq!(second.status_code(), StatusCode::CONFLICT);
    assert_eq!(
        second.json::<serde_json::Value>()["code"],
        "DUPLICATE_PAYMENT"
    );
}

#[tokio::test]
async fn payment_status_is_readable_by_both_identifiers() {
    let app = test_app();
    let (_user, (name, value)) = app.login();
    let volume = app.seed_volume(1000);

    app.server
        .post("/api/cart/items")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "volume_id": volume, "quantity": 1 }))
        .await;
    let order: OrderDetail = app
        .server
        .post("/api/orders")
        .add_header(name.clone(), value.clone())
        .await
        .json();
    let payment: Payment = app
        .server
        .post(&format!(
            "/api/orders/{}/payment-intent",
            order.order.reference
        ))
        .add_header(name.clone(), value.clone())
        .await
        .json();

    for lookup in [payment.id.to_string(), payment.transaction_id.clone()] {
        let response = app
            .server
            .get(&format!("/api/payments/{lookup}/status"))
            .add_header(name.clone(), value.clone())
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let found: Payment = response.json();
        assert_eq!(found.id, payment.id);
        assert_eq!(found.status, PaymentStatus::Pending);
    }
}

#[tokio::test]
async fn task_submission_and_polling() {
    let app = test_app();
    let (_user, (name, value)) = app.login();
    let volume = app.seed_volume(1000);

    app.server
        .post("/api/cart/items")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "volume_id": volume, "quantity": 1 }))
        .await;
    let order: OrderDetail = app
        .server
        .post("/api/orders")
        .add_header(name.clone(), value.clone())
        .await
        .json();

    let response = app
        .server
        .post("/api/tasks/process-order")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "reference": order.order.reference }))
        .await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    let handle: TaskHandle = response.json();
    assert_eq!(app.tasks.submitted().len(), 1);

    let response = app
        .server
        .get(&format!("/api/tasks/{handle}"))
        .add_header(name.clone(), value.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<serde_json::Value>()["state"], "queued");

    // A foreign or unknown reference never reaches the queue.
    let response = app
        .server
        .post("/api/tasks/process-order")
        .add_header(name, value)
        .json(&json!({ "reference": tomeshop_core::OrderReference::new() }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(app.tasks.submitted().len(), 1);
}

#[tokio::test]
async fn volume_reconciliation_reports_changes() {
    let app = test_app();
    let (_user, (name, value)) = app.login();
    let series = SeriesId::new();
    app.shop.seed_volume(series, 1, Money::from_cents(500));

    let response = app
        .server
        .post(&format!("/api/catalog/series/{series}/reconcile"))
        .add_header(name, value)
        .json(&json!({ "declared_count": 3 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let report: serde_json::Value = response.json();
    assert_eq!(report["created"], 2);
    assert_eq!(report["pruned"], 0);
}
