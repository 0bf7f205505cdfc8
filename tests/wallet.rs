//! Wallet endpoint tests: balance, histories, estimates and deductions.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::TestHarness;
use serde_json::json;
use tokio::task::JoinSet;

#[tokio::test]
async fn balance_starts_at_zero() {
    let harness = TestHarness::new();

    let (status, body) = harness.get("/api/v1/wallet/balance", 1).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "balance": 0, "total_top_up": 0, "total_spent": 0 }));
}

#[tokio::test]
async fn top_up_then_spend_keeps_totals_consistent() {
    let harness = TestHarness::new();
    harness.fund(1, 50000).await;

    let (status, body) = harness
        .post(
            "/api/v1/wallet/deduct",
            1,
            json!({ "action": "generate-images", "image_count": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "amount_deducted": 10000, "new_balance": 40000 }));

    let (_, body) = harness.get("/api/v1/wallet/balance", 1).await;
    assert_eq!(body["balance"], 40000);
    assert_eq!(body["total_top_up"], 50000);
    assert_eq!(body["total_spent"], 10000);

    let (_, history) = harness.get("/api/v1/wallet/credit-history", 1).await;
    assert_eq!(history["total"], 1);
    assert_eq!(history["data"][0]["amount"], -10000);
    assert_eq!(history["data"][0]["action"], "generate-images");
    assert_eq!(history["data"][0]["description"], "generate-images - 2 image(s)");

    let (_, top_ups) = harness.get("/api/v1/wallet/topup-history", 1).await;
    assert_eq!(top_ups["total"], 1);
    assert_eq!(top_ups["data"][0]["amount"], 50000);
    assert_eq!(top_ups["data"][0]["status"], "SUCCESS");
}

#[tokio::test]
async fn deduction_without_wallet_is_not_found() {
    let harness = TestHarness::new();

    let (status, body) = harness
        .post("/api/v1/wallet/deduct", 1, json!({ "action": "upscale" }))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "wallet_not_found");
}

#[tokio::test]
async fn insufficient_balance_is_unprocessable() {
    let harness = TestHarness::new();
    harness.fund(1, 10000).await;

    let (status, body) = harness
        .post(
            "/api/v1/wallet/deduct",
            1,
            json!({ "action": "generate-images", "use_pro": true, "resolution": "4K" }),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "insufficient_balance");

    let (_, balance) = harness.get("/api/v1/wallet/balance", 1).await;
    assert_eq!(balance["balance"], 10000);
}

#[tokio::test]
async fn free_action_succeeds_without_wallet() {
    let harness = TestHarness::new();

    let (status, body) = harness
        .post(
            "/api/v1/wallet/deduct",
            1,
            json!({ "action": "generate-prompts" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "amount_deducted": 0, "new_balance": 0 }));
}

#[tokio::test]
async fn unknown_action_is_bad_request() {
    let harness = TestHarness::new();

    let (status, body) = harness
        .post(
            "/api/v1/wallet/estimate-cost",
            1,
            json!({ "action": "teleport" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn estimate_reports_affordability() {
    let harness = TestHarness::new();
    harness.fund(1, 20000).await;

    let (status, body) = harness
        .post(
            "/api/v1/wallet/estimate-cost",
            1,
            json!({ "action": "generate-images", "image_count": 2, "use_pro": true, "resolution": "4K" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "estimated_cost": 24000, "current_balance": 20000, "can_afford": false })
    );

    let (_, body) = harness
        .post(
            "/api/v1/wallet/estimate-cost",
            1,
            json!({ "action": "generate-video" }),
        )
        .await;
    assert_eq!(body["estimated_cost"], 8000);
    assert_eq!(body["can_afford"], true);
}

#[tokio::test]
async fn concurrent_deductions_spend_each_credit_once() {
    let harness = Arc::new(TestHarness::new());
    harness.fund(1, 20000).await;

    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let harness = harness.clone();
        tasks.spawn(async move {
            harness
                .post("/api/v1/wallet/deduct", 1, json!({ "action": "upscale" }))
                .await
                .0
        });
    }
    let statuses = tasks.join_all().await;

    let ok = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    let refused = statuses
        .iter()
        .filter(|s| **s == StatusCode::UNPROCESSABLE_ENTITY)
        .count();
    assert_eq!(ok, 4);
    assert_eq!(refused, 6);

    let (_, balance) = harness.get("/api/v1/wallet/balance", 1).await;
    assert_eq!(balance["balance"], 0);
    assert_eq!(balance["total_spent"], 20000);
}
