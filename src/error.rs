use thiserror::Error;

pub type Result<T> = std::result::Result<T, PurchaseError>;

/// Error taxonomy for the purchase flow.
///
/// `Validation` and `Gateway` are surfaced to the caller for user correction,
/// `Transport` with a retry affordance. `Configuration` means the purchase
/// flow should not be offered at all until the environment is fixed.
#[derive(Error, Debug)]
pub enum PurchaseError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway rejected request ({code}): {message}")]
    Gateway { code: String, message: String },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("confirmation timed out")]
    Timeout,
}

impl PurchaseError {
    /// True if the caller may retry the whole purchase with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_errors_are_retryable() {
        assert!(!PurchaseError::Validation("bad phone".into()).is_retryable());
        assert!(!PurchaseError::Configuration("missing passkey".into()).is_retryable());
        assert!(
            !PurchaseError::Gateway {
                code: "1032".into(),
                message: "Request cancelled by user".into(),
            }
            .is_retryable()
        );
        assert!(!PurchaseError::Timeout.is_retryable());
    }
}
