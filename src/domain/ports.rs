use super::plan::{Amount, PhoneNumber};
use super::session::{PurchaseSession, SessionId, Transition};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Successful initiation of a payment prompt on the payer's device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayInitiation {
    /// Opaque identifier for the initiated prompt, quoted back by the
    /// confirmation channel.
    pub reference: String,
    pub customer_message: Option<String>,
}

/// Outbound boundary to the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Initiates exactly one payment prompt. Input violations fail with
    /// `Validation` before any network call; upstream rejections map to
    /// `Gateway`, network failures to `Transport`. Never retries.
    async fn initiate(
        &self,
        phone_number: &PhoneNumber,
        amount: Amount,
        account_reference: &str,
    ) -> Result<GatewayInitiation>;
}

/// Holds in-flight purchase sessions and serializes their transitions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: PurchaseSession) -> Result<()>;

    async fn get(&self, id: SessionId) -> Result<Option<PurchaseSession>>;

    /// Applies one transition atomically under the store's write lock and
    /// returns the resulting snapshot. This is the "claim the terminal
    /// transition" point: a racing confirmation, timeout, or cancel is
    /// serialized here and the loser sees `InvalidState`.
    async fn apply(&self, id: SessionId, transition: Transition) -> Result<PurchaseSession>;

    /// Records the gateway reference so the confirmation channel can find
    /// the session it belongs to.
    async fn index_reference(&self, reference: &str, id: SessionId) -> Result<()>;

    async fn find_by_reference(&self, reference: &str) -> Result<Option<SessionId>>;

    /// Discards a session and any reference index entries pointing at it.
    /// Idempotent: removing an unknown session is not an error.
    async fn remove(&self, id: SessionId) -> Result<()>;

    /// Watch channel publishing a snapshot after every applied transition.
    async fn subscribe(&self, id: SessionId) -> Result<watch::Receiver<PurchaseSession>>;
}

pub type PaymentGatewayArc = Arc<dyn PaymentGateway>;
pub type SessionStoreArc = Arc<dyn SessionStore>;
