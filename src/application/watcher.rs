use crate::domain::ports::SessionStoreArc;
use crate::domain::session::{
    ConfirmationOutcome, REASON_TIMEOUT, SessionId, Transition,
};
use crate::error::{PurchaseError, Result};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

const VOUCHER_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const VOUCHER_SUFFIX_LEN: usize = 8;

/// How long a terminal session stays readable before it is discarded,
/// together with its gateway-reference index entry.
pub const TERMINAL_RETENTION: Duration = Duration::from_secs(300);

fn discard_after_retention(sessions: SessionStoreArc, id: SessionId) {
    tokio::spawn(async move {
        tokio::time::sleep(TERMINAL_RETENTION).await;
        match sessions.remove(id).await {
            Ok(()) => debug!(session = %id, "terminal session discarded"),
            Err(e) => warn!(session = %id, error = %e, "session discard failed"),
        }
    });
}

/// Resolves "did the payment succeed" for sessions awaiting confirmation.
///
/// Callback-driven: the gateway's inbound notification lands in
/// [`ConfirmationWatcher::report_confirmation`], and a timeout task armed on
/// entry into `AwaitingConfirmation` fails the session if nothing arrives in
/// time. Both race through the session store's atomic transition, so exactly
/// one terminal transition is ever applied; the loser is logged and dropped.
pub struct ConfirmationWatcher {
    sessions: SessionStoreArc,
    timeout: Duration,
}

impl ConfirmationWatcher {
    pub fn new(sessions: SessionStoreArc, timeout: Duration) -> Self {
        Self { sessions, timeout }
    }

    /// Starts the timeout clock for a session that just entered
    /// `AwaitingConfirmation`.
    pub fn arm_timeout(&self, id: SessionId) {
        let sessions = self.sessions.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            match sessions
                .apply(id, Transition::Fail(REASON_TIMEOUT.to_string()))
                .await
            {
                Ok(_) => {
                    warn!(session = %id, "confirmation timed out");
                    discard_after_retention(sessions.clone(), id);
                }
                // A confirmation or cancel already claimed the terminal state
                Err(PurchaseError::InvalidState(_)) => {
                    debug!(session = %id, "timeout fired after terminal transition, discarded");
                }
                Err(e) => warn!(session = %id, error = %e, "timeout transition failed"),
            }
        });
    }

    /// Schedules a terminal session for discard once the retention window
    /// elapses, keeping the store from growing for the process lifetime.
    pub fn schedule_discard(&self, id: SessionId) {
        discard_after_retention(self.sessions.clone(), id);
    }

    /// Entry point for the gateway's confirmation notification.
    ///
    /// Unknown references and confirmations arriving after a terminal
    /// transition are logged and discarded, never treated as fatal.
    pub async fn report_confirmation(
        &self,
        gateway_reference: &str,
        outcome: ConfirmationOutcome,
    ) -> Result<()> {
        let Some(id) = self.sessions.find_by_reference(gateway_reference).await? else {
            warn!(reference = gateway_reference, "confirmation for unknown reference, discarded");
            return Ok(());
        };

        let transition = match outcome {
            ConfirmationOutcome::Success => {
                let Some(session) = self.sessions.get(id).await? else {
                    warn!(session = %id, "indexed session no longer present, discarded");
                    return Ok(());
                };
                Transition::Confirm(voucher_code(&session.plan().label))
            }
            ConfirmationOutcome::Failure { reason } => Transition::Fail(reason),
        };

        match self.sessions.apply(id, transition).await {
            Ok(session) => {
                debug!(session = %id, state = ?session.state(), "confirmation applied");
                if session.is_terminal() {
                    self.schedule_discard(id);
                }
                Ok(())
            }
            Err(PurchaseError::InvalidState(_)) => {
                debug!(session = %id, "duplicate or late confirmation, discarded");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Issues a voucher code for a confirmed purchase:
/// `{PLAN_LABEL_UPPERCASE}-{RANDOM_ALPHANUMERIC(8)}`. Unique with
/// overwhelming probability, not guaranteed globally unique.
pub fn voucher_code(plan_label: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..VOUCHER_SUFFIX_LEN)
        .map(|_| VOUCHER_CHARSET[rng.gen_range(0..VOUCHER_CHARSET.len())] as char)
        .collect();
    format!("{}-{}", plan_label.to_uppercase(), suffix)
}
