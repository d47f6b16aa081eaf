use crate::error::PurchaseError;
use serde::{Deserialize, Serialize};

/// A purchasable hotspot offering. Defined by configuration, never persisted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Plan {
    pub label: String,
    /// Price in the currency's smallest unit (cents).
    pub price_minor_units: u64,
    pub duration_hours: u32,
}

impl Plan {
    pub fn new(
        label: impl Into<String>,
        price_minor_units: u64,
        duration_hours: u32,
    ) -> Result<Self, PurchaseError> {
        if price_minor_units == 0 {
            return Err(PurchaseError::Validation(
                "plan price must be positive".to_string(),
            ));
        }
        Ok(Self {
            label: label.into(),
            price_minor_units,
            duration_hours,
        })
    }
}

/// A positive amount in minor currency units.
///
/// Ensures that payment amounts are always positive before they reach the
/// gateway client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(u64);

impl Amount {
    pub fn new(minor_units: u64) -> Result<Self, PurchaseError> {
        if minor_units > 0 {
            Ok(Self(minor_units))
        } else {
            Err(PurchaseError::Validation(
                "amount must be positive".to_string(),
            ))
        }
    }

    pub fn minor_units(&self) -> u64 {
        self.0
    }

    /// Whole currency units, rounded up. The gateway bills in whole
    /// shillings while plans are priced in cents.
    pub fn whole_units(&self) -> u64 {
        self.0.div_ceil(100)
    }
}

impl TryFrom<u64> for Amount {
    type Error = PurchaseError;

    fn try_from(minor_units: u64) -> Result<Self, Self::Error> {
        Self::new(minor_units)
    }
}

/// A payer's phone number in international format: digits only, prefixed
/// with a country code (no leading zero, no `+`), e.g. `254712345678`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn new(raw: &str) -> Result<Self, PurchaseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PurchaseError::Validation(format!(
                "phone number must contain only digits, got {raw:?}"
            )));
        }
        if !(10..=15).contains(&trimmed.len()) {
            return Err(PurchaseError::Validation(format!(
                "phone number must be 10 to 15 digits, got {} digits",
                trimmed.len()
            )));
        }
        if trimmed.starts_with('0') {
            return Err(PurchaseError::Validation(
                "phone number must start with a country code, not 0".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PurchaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
