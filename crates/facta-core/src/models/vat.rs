//! VAT rate used to derive missing amounts.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::invoice::rules::amounts::normalize_amount;

/// A strictly positive VAT rate expressed as a fraction (0.21 for 21%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct VatRate(Decimal);

impl VatRate {
    /// Spanish general rate, 21%.
    pub const GENERAL: VatRate = VatRate(Decimal::from_parts(21, 0, 0, false, 2));

    /// Create a rate from a fraction, rejecting zero and negatives.
    pub fn new(rate: Decimal) -> Result<Self, ConfigError> {
        if rate <= Decimal::ZERO {
            return Err(ConfigError::InvalidVatRate(rate.to_string()));
        }
        Ok(Self(rate))
    }

    /// Create a rate from a whole percentage (21 -> 0.21).
    pub fn from_percent(percent: u32) -> Result<Self, ConfigError> {
        Self::new(Decimal::new(percent as i64, 2))
    }

    /// Get the rate as a decimal multiplier (e.g., 0.21 for 21%).
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// `1 + rate`, the gross multiplier.
    pub fn gross_multiplier(&self) -> Decimal {
        Decimal::ONE + self.0
    }
}

impl Default for VatRate {
    fn default() -> Self {
        Self::GENERAL
    }
}

impl TryFrom<Decimal> for VatRate {
    type Error = ConfigError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VatRate> for Decimal {
    fn from(rate: VatRate) -> Self {
        rate.0
    }
}

impl FromStr for VatRate {
    type Err = ConfigError;

    /// Accepts fractions (`0.21`, `0,21`) and percentages (`21%`, `21`).
    /// Values of one or more are read as percentages.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let is_percent = s.ends_with('%');
        let value =
            normalize_amount(s).map_err(|_| ConfigError::InvalidVatRate(s.to_string()))?;

        if is_percent || value >= Decimal::ONE {
            Self::new(value / Decimal::ONE_HUNDRED)
        } else {
            Self::new(value)
        }
    }
}

impl fmt::Display for VatRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", (self.0 * Decimal::ONE_HUNDRED).normalize())
    }
}
