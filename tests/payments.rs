//! Payment intent endpoint tests.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::TestHarness;
use serde_json::json;

#[tokio::test]
async fn create_payment_returns_qr_instructions() {
    let harness = TestHarness::new();

    let (status, body) = harness
        .post(
            "/api/v1/payments",
            1,
            json!({ "amount": 50000, "idempotency_key": "topup-1" }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    let id = body["payment"]["id"].as_i64().unwrap();
    assert_eq!(body["payment"]["status"], "PENDING");
    assert_eq!(body["payment"]["reference"], format!("NAPTIEN{id}"));
    assert_eq!(body["instructions"]["type"], "bank_transfer");
    assert_eq!(body["instructions"]["transfer_content"], format!("NAPTIEN{id}"));
    assert!(
        body["instructions"]["qr_url"]
            .as_str()
            .unwrap()
            .starts_with("https://img.vietqr.io/image/MB-0123456789-compact2.png?amount=50000")
    );
}

#[tokio::test]
async fn create_sepay_payment_returns_signed_form() {
    let harness = TestHarness::new();

    let (status, body) = harness
        .post(
            "/api/v1/payments",
            1,
            json!({ "amount": 20000, "gateway": "sepay" }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    let instructions = &body["instructions"];
    assert_eq!(instructions["type"], "hosted_checkout");
    assert_eq!(instructions["fields"]["merchant_id"], "MERCHANT");
    assert_eq!(instructions["fields"]["order_amount"], "20000");
    assert_eq!(instructions["fields"]["signature"].as_str().unwrap().len(), 64);
    assert!(instructions["html"].as_str().unwrap().contains("<form"));
}

#[tokio::test]
async fn invalid_amount_is_rejected() {
    let harness = TestHarness::new();

    let (status, body) = harness
        .post("/api/v1/payments", 1, json!({ "amount": 5000 }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn reused_idempotency_key_conflicts() {
    let harness = TestHarness::new();
    let body = json!({ "amount": 50000, "idempotency_key": "same" });

    let (first, _) = harness.post("/api/v1/payments", 1, body.clone()).await;
    let (second, error) = harness.post("/api/v1/payments", 1, body).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(error["error"]["code"], "conflict");
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let harness = TestHarness::new();

    let (status, body) = harness
        .send(
            Request::builder()
                .method("GET")
                .uri("/api/v1/payments")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, _) = harness
        .send(
            Request::builder()
                .method("GET")
                .uri("/api/v1/payments")
                .header("authorization", "Bearer not-a-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn payments_are_scoped_to_their_owner() {
    let harness = TestHarness::new();
    let id = harness.create_payment(1, 50000).await;

    let (status, body) = harness.get(&format!("/api/v1/payments/{id}"), 1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], 50000);

    let (status, body) = harness.get(&format!("/api/v1/payments/{id}"), 2).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "payment_not_found");

    let (status, _) = harness
        .post(&format!("/api/v1/payments/{id}/cancel"), 2, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_then_cancel_again_is_invalid_state() {
    let harness = TestHarness::new();
    let id = harness.create_payment(1, 50000).await;

    let (status, body) = harness
        .post(&format!("/api/v1/payments/{id}/cancel"), 1, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Payment cancelled");

    let (status, body) = harness
        .post(&format!("/api/v1/payments/{id}/cancel"), 1, json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "invalid_state");
}

#[tokio::test]
async fn settled_payment_cannot_be_cancelled() {
    let harness = TestHarness::new();
    let id = harness.fund(1, 50000).await;

    let (status, _) = harness
        .post(&format!("/api/v1/payments/{id}/cancel"), 1, json!({}))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn list_payments_paginates_and_filters() {
    let harness = TestHarness::new();
    for amount in [10000, 20000, 30000] {
        harness.create_payment(1, amount).await;
    }
    harness.fund(1, 40000).await;
    harness.create_payment(2, 50000).await;

    let (status, body) = harness.get("/api/v1/payments?page=1&limit=2", 1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["amount"], 40000);

    let (_, body) = harness.get("/api/v1/payments?status=SUCCESS", 1).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["status"], "SUCCESS");
}
