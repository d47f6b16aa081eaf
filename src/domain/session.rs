use crate::domain::plan::{PhoneNumber, Plan};
use crate::error::{PurchaseError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const REASON_CANCELLED: &str = "cancelled";
pub const REASON_TIMEOUT: &str = "timeout";

/// Unique identifier for one purchase attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    AwaitingInput,
    Initiating,
    AwaitingConfirmation,
    Confirmed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

/// Outcome reported by the gateway's confirmation channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Success,
    Failure { reason: String },
}

/// A state-machine transition, applied atomically by the session store.
#[derive(Debug, Clone)]
pub enum Transition {
    SelectPlan,
    BeginInitiation(PhoneNumber),
    CompleteInitiation(String),
    Confirm(String),
    Fail(String),
    Cancel,
}

/// One attempt to buy a [`Plan`].
///
/// Fields are private; the transition methods are the only mutators, which
/// keeps the terminal invariants (voucher code iff confirmed, failure reason
/// iff failed, terminal states immutable) enforced in one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseSession {
    id: SessionId,
    plan: Plan,
    phone_number: Option<PhoneNumber>,
    state: SessionState,
    gateway_reference: Option<String>,
    voucher_code: Option<String>,
    failure_reason: Option<String>,
}

impl PurchaseSession {
    pub fn new(plan: Plan) -> Self {
        Self {
            id: SessionId::generate(),
            plan,
            phone_number: None,
            state: SessionState::Idle,
            gateway_reference: None,
            voucher_code: None,
            failure_reason: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn phone_number(&self) -> Option<&PhoneNumber> {
        self.phone_number.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn gateway_reference(&self) -> Option<&str> {
        self.gateway_reference.as_deref()
    }

    pub fn voucher_code(&self) -> Option<&str> {
        self.voucher_code.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Dispatches a transition. `Ok(true)` means the session changed,
    /// `Ok(false)` means an idempotent no-op (cancel of a terminal session).
    pub fn apply(&mut self, transition: Transition) -> Result<bool> {
        match transition {
            Transition::SelectPlan => self.select_plan().map(|()| true),
            Transition::BeginInitiation(phone) => self.begin_initiation(phone).map(|()| true),
            Transition::CompleteInitiation(reference) => {
                self.complete_initiation(reference).map(|()| true)
            }
            Transition::Confirm(voucher_code) => self.confirm(voucher_code).map(|()| true),
            Transition::Fail(reason) => self.fail(reason).map(|()| true),
            Transition::Cancel => self.cancel(),
        }
    }

    /// `Idle -> AwaitingInput`.
    pub fn select_plan(&mut self) -> Result<()> {
        self.expect_state(SessionState::Idle, "select plan")?;
        self.state = SessionState::AwaitingInput;
        Ok(())
    }

    /// `AwaitingInput -> Initiating`, recording the validated payer number.
    pub fn begin_initiation(&mut self, phone_number: PhoneNumber) -> Result<()> {
        self.expect_state(SessionState::AwaitingInput, "submit phone number")?;
        self.phone_number = Some(phone_number);
        self.state = SessionState::Initiating;
        Ok(())
    }

    /// `Initiating -> AwaitingConfirmation` once the gateway has issued a
    /// reference for the payment prompt.
    pub fn complete_initiation(&mut self, gateway_reference: String) -> Result<()> {
        self.expect_state(SessionState::Initiating, "record gateway reference")?;
        self.gateway_reference = Some(gateway_reference);
        self.state = SessionState::AwaitingConfirmation;
        Ok(())
    }

    /// `AwaitingConfirmation -> Confirmed`. First terminal transition wins;
    /// a session already terminal rejects this with `InvalidState`.
    pub fn confirm(&mut self, voucher_code: String) -> Result<()> {
        self.expect_state(SessionState::AwaitingConfirmation, "confirm payment")?;
        self.voucher_code = Some(voucher_code);
        self.state = SessionState::Confirmed;
        Ok(())
    }

    /// Transition to `Failed` from any non-terminal state past `Idle`.
    pub fn fail(&mut self, reason: String) -> Result<()> {
        match self.state {
            SessionState::AwaitingInput
            | SessionState::Initiating
            | SessionState::AwaitingConfirmation => {
                self.failure_reason = Some(reason);
                self.state = SessionState::Failed;
                Ok(())
            }
            _ => Err(self.invalid_state("fail session")),
        }
    }

    /// Cancels the purchase. Permitted while awaiting input or confirmation;
    /// a no-op on already-terminal sessions so repeated cancels are safe.
    pub fn cancel(&mut self) -> Result<bool> {
        match self.state {
            SessionState::AwaitingInput | SessionState::AwaitingConfirmation => {
                self.fail(REASON_CANCELLED.to_string())?;
                Ok(true)
            }
            SessionState::Confirmed | SessionState::Failed => Ok(false),
            _ => Err(self.invalid_state("cancel")),
        }
    }

    fn expect_state(&self, expected: SessionState, operation: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid_state(operation))
        }
    }

    fn invalid_state(&self, operation: &str) -> PurchaseError {
        PurchaseError::InvalidState(format!(
            "cannot {operation} in state {:?} (session {})",
            self.state, self.id
        ))
    }
}
