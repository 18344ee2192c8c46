use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use charmpay::store::{MemoryOrderStore, OrderStore};
use charmpay::stripe::StripeClient;
use charmpay::{AppState, create_app};

const WEBHOOK_SECRET: &str = "whsec_test123";

fn test_app(stripe_url: &str) -> Router {
    let store: Arc<dyn OrderStore> = Arc::new(MemoryOrderStore::new());
    let stripe = StripeClient::with_base_url(
        "sk_test_x".to_string(),
        stripe_url.to_string(),
        Duration::from_secs(2),
    );
    let state = AppState::new(store, stripe, WEBHOOK_SECRET.to_string());
    create_app(state)
}

async fn post_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get_json(app: &Router, path: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn intent_mock(server: &mut mockito::Server, hits: usize) -> mockito::Mock {
    server
        .mock("POST", "/v1/payment_intents")
        .with_status(200)
        .with_body(r#"{"id": "pi_test_1", "client_secret": "pi_test_1_secret"}"#)
        .expect(hits)
        .create_async()
        .await
}

#[tokio::test]
async fn test_create_payment_intent_creates_pending_order() {
    let mut server = mockito::Server::new_async().await;
    let mock = intent_mock(&mut server, 1).await;
    let app = test_app(&server.url());

    let (status, body) = post_json(
        &app,
        "/create-payment-intent",
        json!({"amount": 1500, "currency": "usd", "customerInfo": {"email": "ada@example.com"}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["clientSecret"], "pi_test_1_secret");
    assert_eq!(body["paymentReferenceId"], "pi_test_1");
    mock.assert_async().await;

    let order_id = body["orderId"].as_str().unwrap();
    let (status, order) = get_json(&app, &format!("/api/orders/{}", order_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["amount"], 1500);
    assert_eq!(order["customerInfo"]["email"], "ada@example.com");
}

#[tokio::test]
async fn test_create_payment_intent_missing_amount() {
    let mut server = mockito::Server::new_async().await;
    let mock = intent_mock(&mut server, 0).await;
    let app = test_app(&server.url());

    let (status, body) = post_json(&app, "/create-payment-intent", json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("amount"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_create_payment_intent_below_minimum_skips_remote_call() {
    let mut server = mockito::Server::new_async().await;
    let mock = intent_mock(&mut server, 0).await;
    let app = test_app(&server.url());

    let (status, _) = post_json(&app, "/create-payment-intent", json!({"amount": 49})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gateway_failure_surfaces_remote_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/payment_intents")
        .with_status(402)
        .with_body(r#"{"error": {"message": "Your card was declined."}}"#)
        .create_async()
        .await;
    let app = test_app(&server.url());

    let (status, body) = post_json(&app, "/create-payment-intent", json!({"amount": 1500})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("Your card was declined.")
    );

    // A failed intent leaves no order behind.
    let (_, listing) = get_json(&app, "/api/orders").await;
    assert_eq!(listing["count"], 0);
}

#[tokio::test]
async fn test_save_order_requires_reference_id() {
    let app = test_app("http://127.0.0.1:1");

    let (status, body) = post_json(&app, "/save-order", json!({"status": "completed"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("paymentReferenceId")
    );
}

#[tokio::test]
async fn test_save_order_creates_order_lazily() {
    let app = test_app("http://127.0.0.1:1");

    let (status, body) = post_json(
        &app,
        "/save-order",
        json!({
            "paymentReferenceId": "pi_direct",
            "status": "completed",
            "amount": 2500,
            "shipping": {"city": "Lagos"}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, order) = get_json(&app, "/api/orders/pi_direct").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "completed");
    assert_eq!(order["shipping"]["city"], "Lagos");
    // Client-claimed completion is provisional.
    assert_eq!(order["finalized"], false);
}

#[tokio::test]
async fn test_save_order_merges_partial_updates() {
    let app = test_app("http://127.0.0.1:1");

    post_json(
        &app,
        "/save-order",
        json!({
            "paymentReferenceId": "pi_merge",
            "customerInfo": {"email": "ada@example.com", "address": {"city": "Lagos"}}
        }),
    )
    .await;
    post_json(
        &app,
        "/save-order",
        json!({
            "paymentReferenceId": "pi_merge",
            "customerInfo": {"address": {"zip": "100001"}}
        }),
    )
    .await;

    let (_, order) = get_json(&app, "/api/orders/pi_merge").await;
    // Partial payloads merge; nothing gets dropped.
    assert_eq!(order["customerInfo"]["email"], "ada@example.com");
    assert_eq!(order["customerInfo"]["address"]["city"], "Lagos");
    assert_eq!(order["customerInfo"]["address"]["zip"], "100001");

    let (_, listing) = get_json(&app, "/api/orders").await;
    assert_eq!(listing["count"], 1);
}

#[tokio::test]
async fn test_get_order_not_found() {
    let app = test_app("http://127.0.0.1:1");

    let (status, body) = get_json(&app, "/api/orders/missing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_list_orders_rejects_unknown_status() {
    let app = test_app("http://127.0.0.1:1");

    let (status, _) = get_json(&app, "/api/orders?status=refunded").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_orders_filters_by_status() {
    let app = test_app("http://127.0.0.1:1");

    for (reference, status) in [
        ("pi_1", "pending"),
        ("pi_2", "completed"),
        ("pi_3", "failed"),
        ("pi_4", "completed"),
    ] {
        post_json(
            &app,
            "/save-order",
            json!({"paymentReferenceId": reference, "status": status}),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (status, body) = get_json(&app, "/api/orders?status=completed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    // Most recently completed first.
    assert_eq!(body["orders"][0]["paymentReferenceId"], "pi_4");
    assert_eq!(body["orders"][1]["paymentReferenceId"], "pi_2");
}

#[tokio::test]
async fn test_health_reports_order_counts() {
    let app = test_app("http://127.0.0.1:1");

    post_json(
        &app,
        "/save-order",
        json!({"paymentReferenceId": "pi_1", "status": "completed"}),
    )
    .await;
    post_json(&app, "/save-order", json!({"paymentReferenceId": "pi_2"})).await;

    let (status, body) = get_json(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders"]["total"], 2);
    assert_eq!(body["orders"]["completed"], 1);
    assert_eq!(body["orders"]["pending"], 1);
}
