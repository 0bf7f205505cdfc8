//! HTTP middleware components.
//!
//! Middleware run before route handlers and short-circuit requests that fail
//! authentication.

/// Access token and payment API key authentication
pub mod auth;
