//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

use crate::models::payment::Gateway;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `ACCESS_TOKEN_SECRET` (required): HS256 secret of the auth service's access tokens
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `PAYMENT_API_KEY` (optional): key the gateway presents on webhook calls
/// - `PAYMENT_REFERENCE_PREFIX`, `PAYMENT_MIN_AMOUNT`, `PAYMENT_MAX_AMOUNT`,
///   `PAYMENT_DEFAULT_GATEWAY`: payment intent rules
/// - `VIETQR_*`: beneficiary account shown on bank-transfer QR codes
/// - `SEPAY_*`: hosted checkout merchant settings
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    /// Comma separated list of allowed origins, `*` for any.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,

    pub access_token_secret: String,

    pub payment_api_key: Option<String>,

    /// Loaded from `PAYMENT_*` variables.
    #[serde(skip)]
    pub payment: PaymentConfig,

    /// Loaded from `VIETQR_*` variables.
    #[serde(skip)]
    pub vietqr: VietQrConfig,

    /// Loaded from `SEPAY_*` variables.
    #[serde(skip)]
    pub sepay: SepayConfig,
}

/// Rules applied when creating and reconciling payments.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Text placed before the payment id in the transfer memo, e.g. `NAPTIEN42`.
    #[serde(default = "default_reference_prefix")]
    pub reference_prefix: String,

    #[serde(default = "default_min_amount")]
    pub min_amount: i64,

    #[serde(default = "default_max_amount")]
    pub max_amount: i64,

    #[serde(default)]
    pub default_gateway: Gateway,
}

/// Beneficiary account encoded into VietQR images.
#[derive(Debug, Clone, Deserialize)]
pub struct VietQrConfig {
    /// Bank BIN or short name understood by img.vietqr.io, e.g. `MB`.
    #[serde(default)]
    pub bank_id: String,

    #[serde(default)]
    pub account_no: String,

    #[serde(default)]
    pub account_name: String,

    #[serde(default = "default_vietqr_template")]
    pub template: String,
}

/// SePay hosted checkout settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SepayConfig {
    #[serde(default)]
    pub merchant_id: String,

    #[serde(default)]
    pub secret_key: String,

    #[serde(default = "default_sepay_checkout_url")]
    pub checkout_url: String,

    #[serde(default)]
    pub success_url: String,

    #[serde(default)]
    pub error_url: String,

    #[serde(default)]
    pub cancel_url: String,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_cors_origins() -> String {
    "*".to_string()
}

fn default_reference_prefix() -> String {
    "NAPTIEN".to_string()
}

fn default_min_amount() -> i64 {
    10_000
}

fn default_max_amount() -> i64 {
    100_000_000
}

fn default_vietqr_template() -> String {
    "compact2".to_string()
}

fn default_sepay_checkout_url() -> String {
    "https://pay.sepay.vn/v1/checkout/init".to_string()
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            reference_prefix: default_reference_prefix(),
            min_amount: default_min_amount(),
            max_amount: default_max_amount(),
            default_gateway: Gateway::default(),
        }
    }
}

impl Default for VietQrConfig {
    fn default() -> Self {
        Self {
            bank_id: String::new(),
            account_no: String::new(),
            account_name: String::new(),
            template: default_vietqr_template(),
        }
    }
}

impl Default for SepayConfig {
    fn default() -> Self {
        Self {
            merchant_id: String::new(),
            secret_key: String::new(),
            checkout_url: default_sepay_checkout_url(),
            success_url: String::new(),
            error_url: String::new(),
            cancel_url: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        let mut config = envy::from_env::<Config>()?;

        // Grouped settings share a prefix: PAYMENT_MIN_AMOUNT -> payment.min_amount
        config.payment = envy::prefixed("PAYMENT_").from_env::<PaymentConfig>()?;
        config.vietqr = envy::prefixed("VIETQR_").from_env::<VietQrConfig>()?;
        config.sepay = envy::prefixed("SEPAY_").from_env::<SepayConfig>()?;

        Ok(config)
    }

    /// Parsed `CORS_ORIGINS` entries.
    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect()
    }
}
