use crate::application::watcher::ConfirmationWatcher;
use crate::config::GatewayConfig;
use crate::domain::plan::{Amount, PhoneNumber, Plan};
use crate::domain::ports::{PaymentGatewayArc, SessionStoreArc};
use crate::domain::session::{
    ConfirmationOutcome, PurchaseSession, SessionId, SessionState, Transition,
};
use crate::error::{PurchaseError, Result};
use crate::infrastructure::in_memory::InMemorySessionStore;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument};

/// The caller's view of one purchase attempt: its id plus a watch channel
/// that receives a session snapshot after every transition.
pub struct SessionHandle {
    pub id: SessionId,
    pub updates: watch::Receiver<PurchaseSession>,
}

impl SessionHandle {
    pub fn snapshot(&self) -> PurchaseSession {
        self.updates.borrow().clone()
    }

    /// Awaits the session's terminal state without polling. Returns the
    /// last observed snapshot if the orchestrator goes away first.
    pub async fn wait_terminal(&mut self) -> PurchaseSession {
        loop {
            if self.updates.borrow().is_terminal() {
                return self.updates.borrow().clone();
            }
            if self.updates.changed().await.is_err() {
                return self.updates.borrow().clone();
            }
        }
    }
}

/// The main entry point for the voucher purchase flow.
///
/// Owns the authoritative state of every in-flight [`PurchaseSession`] and
/// enforces valid transitions. Sessions are independent; the only state
/// shared across them lives in the gateway client's token cache.
pub struct PurchaseOrchestrator {
    config: GatewayConfig,
    gateway: PaymentGatewayArc,
    sessions: SessionStoreArc,
    watcher: ConfirmationWatcher,
}

impl PurchaseOrchestrator {
    pub fn new(config: GatewayConfig, gateway: PaymentGatewayArc) -> Self {
        let sessions: SessionStoreArc = Arc::new(InMemorySessionStore::new());
        Self::with_store(config, gateway, sessions)
    }

    pub fn with_store(
        config: GatewayConfig,
        gateway: PaymentGatewayArc,
        sessions: SessionStoreArc,
    ) -> Self {
        let watcher = ConfirmationWatcher::new(sessions.clone(), config.confirmation_timeout);
        Self {
            config,
            gateway,
            sessions,
            watcher,
        }
    }

    /// Opens a purchase session for `plan` in `AwaitingInput`.
    ///
    /// Re-validates the gateway configuration first so a session is never
    /// offered when the flow cannot complete; fails with `Configuration`
    /// before any network activity.
    pub async fn start(&self, plan: Plan) -> Result<SessionHandle> {
        self.config.validate()?;

        let session = PurchaseSession::new(plan);
        let id = session.id();
        self.sessions.insert(session).await?;
        self.sessions.apply(id, Transition::SelectPlan).await?;

        info!(session = %id, "purchase session opened");
        let updates = self.sessions.subscribe(id).await?;
        Ok(SessionHandle { id, updates })
    }

    /// Validates the payer's number and drives the session through
    /// `Initiating` into `AwaitingConfirmation`.
    ///
    /// A malformed number fails with `Validation` and leaves the session in
    /// `AwaitingInput`; calling on a session past `AwaitingInput` fails with
    /// `InvalidState`. A gateway rejection fails the session and propagates
    /// the gateway's error to the caller.
    #[instrument(skip(self, raw_phone_number))]
    pub async fn submit_phone_number(
        &self,
        id: SessionId,
        raw_phone_number: &str,
    ) -> Result<PurchaseSession> {
        let Some(current) = self.sessions.get(id).await? else {
            return Err(PurchaseError::InvalidState(format!("unknown session {id}")));
        };
        // Misuse of the session ordering surfaces as InvalidState even when
        // the input is also malformed; input validation applies only to
        // sessions actually awaiting it
        if current.state() != SessionState::AwaitingInput {
            return Err(PurchaseError::InvalidState(format!(
                "cannot submit phone number in state {:?} (session {id})",
                current.state()
            )));
        }
        // Fail fast on bad input, before any transition or side effect
        let phone_number = PhoneNumber::new(raw_phone_number)?;
        let amount = Amount::new(current.plan().price_minor_units)?;

        self.sessions
            .apply(id, Transition::BeginInitiation(phone_number.clone()))
            .await?;

        let initiation = match self
            .gateway
            .initiate(&phone_number, amount, &self.config.account_reference)
            .await
        {
            Ok(initiation) => initiation,
            Err(gateway_error) => {
                self.sessions
                    .apply(id, Transition::Fail(gateway_error.to_string()))
                    .await?;
                self.watcher.schedule_discard(id);
                return Err(gateway_error);
            }
        };

        self.sessions
            .index_reference(&initiation.reference, id)
            .await?;
        let session = self
            .sessions
            .apply(id, Transition::CompleteInitiation(initiation.reference))
            .await?;
        self.watcher.arm_timeout(id);

        info!(session = %id, "payment prompt sent, awaiting confirmation");
        Ok(session)
    }

    /// Cancels a purchase. Permitted while awaiting input or confirmation;
    /// idempotent on sessions that already reached a terminal state. If a
    /// cancel races a confirmation, whichever transition reaches the store
    /// first wins and the other is discarded.
    pub async fn cancel(&self, id: SessionId) -> Result<PurchaseSession> {
        let session = self.sessions.apply(id, Transition::Cancel).await?;
        self.watcher.schedule_discard(id);
        Ok(session)
    }

    /// Inbound confirmation channel, delegated to the watcher.
    pub async fn report_confirmation(
        &self,
        gateway_reference: &str,
        outcome: ConfirmationOutcome,
    ) -> Result<()> {
        self.watcher
            .report_confirmation(gateway_reference, outcome)
            .await
    }

    pub async fn session(&self, id: SessionId) -> Result<Option<PurchaseSession>> {
        self.sessions.get(id).await
    }
}
