//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Calls the matching service
//! 3. Returns HTTP response (JSON, status code)

pub mod health;
/// Payment intent endpoints
pub mod payments;
/// Balance, history and deduction endpoints
pub mod wallet;
/// Gateway notification endpoint
pub mod webhooks;
