use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Commission payout status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionStatus {
    Pending,
    Paid,
    Cancelled,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl TryFrom<String> for CommissionStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid commission status: {}", value)),
        }
    }
}

/// Commission row owned by the commission engine.
///
/// The billing core never computes commissions; it only removes PENDING
/// ones whose invoice was cancelled and lists them for detail views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    pub id: String,
    pub enrollment_id: String,
    pub invoice_id: Option<String>,
    pub beneficiary_id: String,
    pub amount: Decimal,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
}
