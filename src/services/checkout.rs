//! Checkout instructions for a pending payment.
//!
//! Both flavours are built locally; creating a payment never calls out to a
//! gateway.
//!
//! - VietQR: an image URL the payer scans with a banking app
//! - SePay: a signed form that auto-submits to the hosted checkout

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::{SepayConfig, VietQrConfig};
use crate::error::AppError;
use crate::models::payment::PaymentInstructions;

type HmacSha256 = Hmac<Sha256>;

const VIETQR_IMAGE_BASE: &str = "https://img.vietqr.io/image";

/// Bank-transfer instructions with a VietQR image URL.
///
/// # Output
///
/// `https://img.vietqr.io/image/{bank}-{account}-{template}.png?amount=50000&addInfo=NAPTIEN42&accountName=...`
pub fn vietqr_instructions(
    config: &VietQrConfig,
    reference: &str,
    amount: i64,
) -> Result<PaymentInstructions, AppError> {
    let mut qr_url = url::Url::parse(&format!(
        "{}/{}-{}-{}.png",
        VIETQR_IMAGE_BASE, config.bank_id, config.account_no, config.template
    ))
    .map_err(|e| AppError::Internal(format!("invalid VietQR url: {e}")))?;

    qr_url
        .query_pairs_mut()
        .append_pair("amount", &amount.to_string())
        .append_pair("addInfo", reference)
        .append_pair("accountName", &config.account_name);

    Ok(PaymentInstructions::BankTransfer {
        qr_url: qr_url.into(),
        bank_id: config.bank_id.clone(),
        account_number: config.account_no.clone(),
        account_name: config.account_name.clone(),
        transfer_content: reference.to_string(),
        amount,
    })
}

/// Hosted-checkout form with signed fields.
///
/// The invoice number is the transfer reference, so the IPN that comes back
/// carries it in `order.order_invoice_number`.
pub fn sepay_instructions(
    config: &SepayConfig,
    reference: &str,
    amount: i64,
    description: &str,
) -> Result<PaymentInstructions, AppError> {
    if config.merchant_id.is_empty() || config.secret_key.is_empty() {
        return Err(AppError::Internal(
            "SePay merchant id or secret key is not configured".to_string(),
        ));
    }

    let mut fields = BTreeMap::from([
        ("merchant_id".to_string(), config.merchant_id.clone()),
        ("currency".to_string(), "VND".to_string()),
        ("order_invoice_number".to_string(), reference.to_string()),
        ("order_amount".to_string(), amount.to_string()),
        ("operation".to_string(), "PURCHASE".to_string()),
        ("order_description".to_string(), description.to_string()),
        ("success_url".to_string(), config.success_url.clone()),
        ("error_url".to_string(), config.error_url.clone()),
        ("cancel_url".to_string(), config.cancel_url.clone()),
    ]);

    let signature = sign_fields(&config.secret_key, &fields)?;
    fields.insert("signature".to_string(), signature);

    let html = render_auto_submit_form(&config.checkout_url, &fields);

    Ok(PaymentInstructions::HostedCheckout {
        action_url: config.checkout_url.clone(),
        fields,
        html,
    })
}

/// HMAC-SHA256 over `key=value` pairs sorted by key and joined by `&`.
///
/// Empty values are left out of the signed string. Output is lowercase hex.
pub fn sign_fields(secret: &str, fields: &BTreeMap<String, String>) -> Result<String, AppError> {
    let signed: Vec<String> = fields
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{key}={value}"))
        .collect();

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("invalid signing key: {e}")))?;
    mac.update(signed.join("&").as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn render_auto_submit_form(action_url: &str, fields: &BTreeMap<String, String>) -> String {
    let inputs: String = fields
        .iter()
        .map(|(name, value)| {
            format!(
                "    <input type=\"hidden\" name=\"{}\" value=\"{}\" />\n",
                escape_html(name),
                escape_html(value)
            )
        })
        .collect();

    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><meta charset=\"utf-8\"><title>Redirecting to payment gateway...</title></head>\n\
         <body onload=\"document.getElementById('checkout-form').submit()\">\n\
         <form id=\"checkout-form\" method=\"POST\" action=\"{}\">\n{}</form>\n\
         </body>\n\
         </html>\n",
        escape_html(action_url),
        inputs
    )
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
