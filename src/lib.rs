//! Top-up ledger service.
//!
//! Users buy credit by bank transfer (VietQR) or through a hosted checkout
//! (SePay). Gateway notifications are reconciled against pending payments and
//! credited to a per-user wallet, which AI actions then spend from.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod pricing;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
