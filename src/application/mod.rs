//! Application layer orchestrating the purchase flow.
//!
//! `PurchaseOrchestrator` is the primary entry point: it owns the session
//! store, delegates initiation to the gateway port, and hands confirmation
//! resolution to the `ConfirmationWatcher`.

pub mod orchestrator;
pub mod watcher;
