//! Shared test harness: the full router over an in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::Value;
use tower::ServiceExt;

use topup_ledger_server::config::{Config, PaymentConfig, SepayConfig, VietQrConfig};
use topup_ledger_server::middleware::auth::AccessTokenClaims;
use topup_ledger_server::routes::create_router;
use topup_ledger_server::state::AppState;
use topup_ledger_server::store::MemoryStore;

pub const TOKEN_SECRET: &str = "test-access-secret";
pub const PAYMENT_API_KEY: &str = "test-payment-key";

pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub router: Router,
}

pub fn test_config(payment_api_key: Option<&str>) -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        server_port: 0,
        database_max_connections: 1,
        cors_origins: "*".to_string(),
        access_token_secret: TOKEN_SECRET.to_string(),
        payment_api_key: payment_api_key.map(str::to_string),
        payment: PaymentConfig::default(),
        vietqr: VietQrConfig {
            bank_id: "MB".to_string(),
            account_no: "0123456789".to_string(),
            account_name: "TOPUP SHOP".to_string(),
            template: "compact2".to_string(),
        },
        sepay: SepayConfig {
            merchant_id: "MERCHANT".to_string(),
            secret_key: "sepay-secret".to_string(),
            ..SepayConfig::default()
        },
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(test_config(Some(PAYMENT_API_KEY)))
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let router = create_router(AppState::new(store.clone(), config));
        Self { store, router }
    }

    /// Bearer header for a freshly signed access token.
    pub fn bearer(&self, user_id: i64) -> String {
        let claims = AccessTokenClaims {
            user_id,
            device_id: None,
            role_name: Some("CLIENT".to_string()),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TOKEN_SECRET.as_bytes()),
        )
        .unwrap();
        format!("Bearer {token}")
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, user_id: i64) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("authorization", self.bearer(user_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post(&self, uri: &str, user_id: i64, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("authorization", self.bearer(user_id))
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Deliver a webhook body with the gateway's API key.
    pub async fn webhook(&self, body: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/api/v1/payments/webhook")
                .header("authorization", format!("Apikey {PAYMENT_API_KEY}"))
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Create a VietQR payment and return its id.
    pub async fn create_payment(&self, user_id: i64, amount: i64) -> i64 {
        let (status, body) = self
            .post(
                "/api/v1/payments",
                user_id,
                serde_json::json!({ "amount": amount }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["payment"]["id"].as_i64().unwrap()
    }

    /// Create a payment and settle it through a bank-feed notification.
    pub async fn fund(&self, user_id: i64, amount: i64) -> i64 {
        let id = self.create_payment(user_id, amount).await;
        let (status, _) = self
            .webhook(&bank_feed(&format!("NAPTIEN{id} chuyen tien"), amount))
            .await;
        assert_eq!(status, StatusCode::OK);
        id
    }
}

pub fn bank_feed(content: &str, amount: i64) -> String {
    serde_json::json!({
        "id": 92704,
        "gateway": "MBBank",
        "transactionDate": "2025-01-01 08:00:00",
        "accountNumber": "0123456789",
        "code": null,
        "content": content,
        "transferType": "in",
        "transferAmount": amount,
        "accumulated": 1_000_000,
        "subAccount": null,
        "referenceCode": "FT25001000001",
        "description": format!("BankAPINotify {content}")
    })
    .to_string()
}

pub fn ipn(reference: &str, order_status: &str, transaction_status: &str, amount: &str) -> String {
    serde_json::json!({
        "timestamp": 1735689600,
        "notification_type": "ORDER_PAID",
        "order": {
            "id": "e2c1",
            "order_id": reference,
            "order_status": order_status,
            "order_currency": "VND",
            "order_amount": amount,
            "order_invoice_number": reference
        },
        "transaction": {
            "id": "384c",
            "payment_method": "BANK_TRANSFER",
            "transaction_id": "68ef",
            "transaction_type": "PAYMENT",
            "transaction_date": "2025-01-01 08:00:00",
            "transaction_status": transaction_status,
            "transaction_amount": amount,
            "transaction_currency": "VND"
        },
        "customer": null
    })
    .to_string()
}
