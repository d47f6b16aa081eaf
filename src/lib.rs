//! Voucher purchase orchestration for a hotspot storefront.
//!
//! A client selects a [`domain::plan::Plan`], submits a phone number, an
//! STK push is initiated against the payment gateway, and an asynchronous
//! confirmation resolves the session to a voucher code or a failure.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
