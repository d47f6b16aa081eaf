use crate::error::{PurchaseError, Result};
use std::env;
use std::time::Duration;

pub const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
pub const DEFAULT_SHORT_CODE: &str = "174379";
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Credentials and endpoints for the payment gateway, read from the
/// environment. All string fields are required except `base_url` and the
/// short code, which default to the Safaricom sandbox.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub passkey: String,
    pub short_code: String,
    pub callback_url: String,
    pub base_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
    pub confirmation_timeout: Duration,
}

impl GatewayConfig {
    /// Reads configuration from `MPESA_*` environment variables.
    ///
    /// Fails with `Configuration` if any required variable is missing or
    /// empty, before any network activity.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            consumer_key: env::var("MPESA_CONSUMER_KEY").unwrap_or_default(),
            consumer_secret: env::var("MPESA_CONSUMER_SECRET").unwrap_or_default(),
            passkey: env::var("MPESA_PASSKEY").unwrap_or_default(),
            short_code: env::var("MPESA_SHORT_CODE")
                .unwrap_or_else(|_| DEFAULT_SHORT_CODE.to_string()),
            callback_url: env::var("MPESA_CALLBACK_URL").unwrap_or_default(),
            base_url: env::var("MPESA_BASE_URL").unwrap_or_else(|_| SANDBOX_BASE_URL.to_string()),
            account_reference: "WiFiPanel".to_string(),
            transaction_desc: "Voucher Purchase".to_string(),
            confirmation_timeout: env::var("MPESA_CONFIRMATION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CONFIRMATION_TIMEOUT),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that every required field is present. Called again by
    /// `PurchaseOrchestrator::start` so a session is never opened against
    /// an unusable gateway.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("consumer key", &self.consumer_key),
            ("consumer secret", &self.consumer_secret),
            ("passkey", &self.passkey),
            ("short code", &self.short_code),
            ("callback URL", &self.callback_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(PurchaseError::Configuration(format!("missing {name}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> GatewayConfig {
        GatewayConfig {
            consumer_key: "key".into(),
            consumer_secret: "secret".into(),
            passkey: "passkey".into(),
            short_code: DEFAULT_SHORT_CODE.into(),
            callback_url: "https://example.com/api/callback".into(),
            base_url: SANDBOX_BASE_URL.into(),
            account_reference: "WiFiPanel".into(),
            transaction_desc: "Voucher Purchase".into(),
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(filled().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_consumer_key() {
        let mut config = filled();
        config.consumer_key = String::new();
        assert!(matches!(
            config.validate(),
            Err(PurchaseError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_blank_callback_url() {
        let mut config = filled();
        config.callback_url = "   ".into();
        assert!(matches!(
            config.validate(),
            Err(PurchaseError::Configuration(_))
        ));
    }
}
