use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wifipanel::config::GatewayConfig;
use wifipanel::domain::plan::{Amount, PhoneNumber, Plan};
use wifipanel::domain::ports::{GatewayInitiation, PaymentGateway};
use wifipanel::error::{PurchaseError, Result};

type Responder = Box<dyn Fn() -> Result<GatewayInitiation> + Send + Sync>;

/// Scriptable gateway double that records how often it was called.
pub struct MockGateway {
    calls: AtomicUsize,
    responder: Responder,
}

impl MockGateway {
    pub fn succeeding(reference: &str) -> Arc<Self> {
        let reference = reference.to_string();
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            responder: Box::new(move || {
                Ok(GatewayInitiation {
                    reference: reference.clone(),
                    customer_message: Some("Success. Request accepted".to_string()),
                })
            }),
        })
    }

    pub fn rejecting(code: &str, message: &str) -> Arc<Self> {
        let code = code.to_string();
        let message = message.to_string();
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            responder: Box::new(move || {
                Err(PurchaseError::Gateway {
                    code: code.clone(),
                    message: message.clone(),
                })
            }),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initiate(
        &self,
        _phone_number: &PhoneNumber,
        _amount: Amount,
        _account_reference: &str,
    ) -> Result<GatewayInitiation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)()
    }
}

pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        consumer_key: "key".into(),
        consumer_secret: "secret".into(),
        passkey: "passkey".into(),
        short_code: "174379".into(),
        callback_url: "https://example.com/api/callback".into(),
        base_url: "https://sandbox.invalid".into(),
        account_reference: "WiFiPanel".into(),
        transaction_desc: "Voucher Purchase".into(),
        confirmation_timeout: Duration::from_secs(120),
    }
}

pub fn day_plan() -> Plan {
    Plan::new("1 Day", 7000, 24).unwrap()
}
