//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They validate input and drive the [`LedgerStore`](crate::store::LedgerStore).

pub mod checkout;
pub mod credit_service;
pub mod payment_service;
pub mod reconciler;
