use crate::config::GatewayConfig;
use crate::domain::plan::{Amount, PhoneNumber};
use crate::domain::ports::{GatewayInitiation, PaymentGateway};
use crate::error::{PurchaseError, Result};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const AUTH_PATH: &str = "/oauth/v1/generate?grant_type=client_credentials";
const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";
const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
// Refresh slightly before the stated expiry so an in-flight call never
// carries a token that lapses mid-request.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    // Daraja returns this as a string, e.g. "3599"
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct StkPushResponse {
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    response_code: String,
    #[serde(rename = "ResponseDescription")]
    response_description: String,
    #[serde(rename = "CustomerMessage")]
    customer_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

/// Client for the Safaricom Daraja STK push API.
///
/// Owns the process-wide access-token cache: the token is acquired lazily on
/// first use, reused for its validity window, refreshed under a mutex so
/// concurrent callers share one refresh, and invalidated on a 401 response.
pub struct DarajaGateway {
    config: GatewayConfig,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl DarajaGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    /// Returns a valid access token, performing the client-credentials
    /// exchange if the cache is empty or expired. Holding the mutex across
    /// the exchange means at most one refresh is in flight; waiters reuse
    /// its result.
    async fn access_token(&self) -> Result<String> {
        let mut cache = self.token.lock().await;
        if let Some(cached) = cache.as_ref()
            && cached.is_valid()
        {
            return Ok(cached.token.clone());
        }

        debug!("refreshing gateway access token");
        let url = format!("{}{}", self.config.base_url, AUTH_PATH);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(upstream_error(status, &body, "credential exchange failed"));
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            PurchaseError::Gateway {
                code: "malformed-response".to_string(),
                message: format!("token endpoint returned unparseable body: {e}"),
            }
        })?;
        let ttl = token
            .expires_in
            .parse::<u64>()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3600));
        *cache = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        Ok(token.access_token)
    }

    async fn invalidate_token(&self) {
        self.token.lock().await.take();
    }
}

#[async_trait]
impl PaymentGateway for DarajaGateway {
    async fn initiate(
        &self,
        phone_number: &PhoneNumber,
        amount: Amount,
        account_reference: &str,
    ) -> Result<GatewayInitiation> {
        let access_token = self.access_token().await?;

        let timestamp = Utc::now();
        let (password, timestamp) = derive_password(
            &self.config.short_code,
            &self.config.passkey,
            timestamp,
        );

        let payload = json!({
            "BusinessShortCode": self.config.short_code,
            "Password": password,
            "Timestamp": timestamp,
            "TransactionType": TRANSACTION_TYPE,
            "Amount": amount.whole_units(),
            "PartyA": phone_number.as_str(),
            "PartyB": self.config.short_code,
            "PhoneNumber": phone_number.as_str(),
            "CallBackURL": self.config.callback_url,
            "AccountReference": account_reference,
            "TransactionDesc": self.config.transaction_desc,
        });

        let url = format!("{}{}", self.config.base_url, STK_PUSH_PATH);
        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            // Token rejected upstream; drop it so the next attempt
            // re-authenticates. No automatic retry here.
            warn!("gateway returned 401, invalidating cached token");
            self.invalidate_token().await;
            return Err(upstream_error(status, &body, "authentication rejected"));
        }
        if !status.is_success() {
            return Err(upstream_error(status, &body, "initiation rejected"));
        }

        let parsed: StkPushResponse =
            serde_json::from_str(&body).map_err(|e| PurchaseError::Gateway {
                code: "malformed-response".to_string(),
                message: format!("initiation returned unparseable body: {e}"),
            })?;
        if parsed.response_code != "0" {
            return Err(PurchaseError::Gateway {
                code: parsed.response_code,
                message: parsed.response_description,
            });
        }

        debug!(reference = %parsed.checkout_request_id, "payment prompt initiated");
        Ok(GatewayInitiation {
            reference: parsed.checkout_request_id,
            customer_message: parsed.customer_message,
        })
    }
}

/// Derives the gateway's challenge password for one request: the base64 of
/// short code, passkey, and a `YYYYmmddHHMMSS` UTC timestamp. Pure function
/// of its inputs; returns the password with the timestamp it was keyed to.
pub fn derive_password(
    short_code: &str,
    passkey: &str,
    at: DateTime<Utc>,
) -> (String, String) {
    let timestamp = at.format("%Y%m%d%H%M%S").to_string();
    let password = BASE64.encode(format!("{short_code}{passkey}{timestamp}"));
    (password, timestamp)
}

fn upstream_error(status: reqwest::StatusCode, body: &str, fallback: &str) -> PurchaseError {
    let parsed: Option<ErrorResponse> = serde_json::from_str(body).ok();
    match parsed {
        Some(ErrorResponse {
            error_code,
            error_message,
        }) if error_code.is_some() || error_message.is_some() => PurchaseError::Gateway {
            code: error_code.unwrap_or_else(|| status.as_u16().to_string()),
            message: error_message.unwrap_or_else(|| fallback.to_string()),
        },
        _ => PurchaseError::Gateway {
            code: status.as_u16().to_string(),
            message: format!("{fallback}: {}", status),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_derive_password_is_deterministic() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 9).unwrap();
        let (password, timestamp) = derive_password("174379", "secretpasskey", at);
        assert_eq!(timestamp, "20240305143009");
        assert_eq!(
            password,
            BASE64.encode("174379secretpasskey20240305143009")
        );

        // Same inputs, same output
        let again = derive_password("174379", "secretpasskey", at);
        assert_eq!(again, (password, timestamp));
    }

    #[test]
    fn test_derive_password_varies_with_time() {
        let first = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 9).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 10).unwrap();
        let (p1, _) = derive_password("174379", "passkey", first);
        let (p2, _) = derive_password("174379", "passkey", second);
        assert_ne!(p1, p2);
    }

    #[test]
    fn test_cached_token_expiry() {
        let valid = CachedToken {
            token: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(60),
        };
        assert!(valid.is_valid());

        let expired = CachedToken {
            token: "t".into(),
            expires_at: Instant::now() - Duration::from_secs(1),
        };
        assert!(!expired.is_valid());
    }

    #[test]
    fn test_upstream_error_prefers_body_fields() {
        let body = r#"{"requestId":"1","errorCode":"500.001.1001","errorMessage":"Invalid PhoneNumber"}"#;
        let err = upstream_error(reqwest::StatusCode::BAD_REQUEST, body, "initiation rejected");
        match err {
            PurchaseError::Gateway { code, message } => {
                assert_eq!(code, "500.001.1001");
                assert_eq!(message, "Invalid PhoneNumber");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_upstream_error_falls_back_to_status() {
        let err = upstream_error(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            "not json",
            "initiation rejected",
        );
        match err {
            PurchaseError::Gateway { code, .. } => assert_eq!(code, "503"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
