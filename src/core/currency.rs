use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Billing currencies with their decimal precision rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Nigerian Naira (2 decimal places, kobo)
    NGN,
    /// US Dollar (2 decimal places)
    USD,
}

impl Default for Currency {
    fn default() -> Self {
        Currency::NGN
    }
}

impl Currency {
    pub fn scale(&self) -> u32 {
        match self {
            Currency::NGN | Currency::USD => 2,
        }
    }

    /// Banker's rounding to the currency scale
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp(self.scale())
    }

    /// Catalog prices must be non-negative and fit the currency scale
    pub fn validate_amount(&self, amount: Decimal) -> Result<(), String> {
        if amount.scale() > self.scale() {
            return Err(format!(
                "{} amounts must have at most {} decimal places, got {}",
                self,
                self.scale(),
                amount.scale()
            ));
        }

        if amount < Decimal::ZERO {
            return Err(format!("{} amount cannot be negative", self));
        }

        Ok(())
    }

    /// `NGN 500000.00`
    pub fn format_amount(&self, amount: Decimal) -> String {
        format!(
            "{} {:.width$}",
            self,
            self.round(amount),
            width = self.scale() as usize
        )
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::NGN => write!(f, "NGN"),
            Currency::USD => write!(f, "USD"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NGN" => Ok(Currency::NGN),
            "USD" => Ok(Currency::USD),
            _ => Err(format!("Invalid currency: {}", s)),
        }
    }
}
