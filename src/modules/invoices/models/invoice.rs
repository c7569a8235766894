// Invoice model: one scheduled installment obligation of an enrollment.
//
// Invoices are created with their enrollment, moved to OVERDUE by the
// grace-period sweep, settled to PAID by the payment path and cancelled
// together with their enrollment.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::clock::whole_days_between;
use crate::core::{AppError, Result};

/// Invoice status lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Scheduled, not yet due or just due
    Pending,
    /// Due date passed without payment
    Overdue,
    /// Settled by the payment path
    Paid,
    /// Voided with its enrollment
    Cancelled,
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Pending
    }
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Overdue => "OVERDUE",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// PENDING and OVERDUE invoices still expect money
    pub fn is_unpaid(&self) -> bool {
        matches!(self, Self::Pending | Self::Overdue)
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for InvoiceStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "PENDING" => Ok(Self::Pending),
            "OVERDUE" => Ok(Self::Overdue),
            "PAID" => Ok(Self::Paid),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid invoice status: {}", value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub enrollment_id: String,
    /// 1-based, contiguous within the enrollment
    pub installment_number: u32,
    pub due_date: DateTime<Utc>,
    pub amount: Decimal,
    pub amount_paid: Decimal,
    pub status: InvoiceStatus,
    /// First time the invoice was seen overdue; never moved afterwards
    pub overdue_date: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Create a PENDING installment
    pub fn new(
        enrollment_id: String,
        installment_number: u32,
        due_date: DateTime<Utc>,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if installment_number < 1 {
            return Err(AppError::bad_request(
                "Installment number must start at 1",
            ));
        }

        if amount <= Decimal::ZERO {
            return Err(AppError::bad_request("Installment amount must be positive"));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            enrollment_id,
            installment_number,
            due_date,
            amount,
            amount_paid: Decimal::ZERO,
            status: InvoiceStatus::Pending,
            overdue_date: None,
            paid_at: None,
            payment_reference: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// PENDING and strictly past its due date
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.status == InvoiceStatus::Pending && self.due_date < now
    }

    /// Whole days since the due date, floored
    pub fn days_overdue(&self, now: DateTime<Utc>) -> u32 {
        whole_days_between(self.due_date, now)
    }

    /// PENDING -> OVERDUE. `overdue_date` is only stamped the first time.
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.status {
            InvoiceStatus::Pending | InvoiceStatus::Overdue => {
                self.status = InvoiceStatus::Overdue;
                self.overdue_date.get_or_insert(now);
                self.updated_at = now;
                Ok(())
            }
            _ => Err(AppError::bad_request(format!(
                "Invoice {} cannot become overdue from {}",
                self.installment_number, self.status
            ))),
        }
    }

    /// PENDING | OVERDUE -> PAID
    pub fn mark_paid(&mut self, reference: String, now: DateTime<Utc>) -> Result<()> {
        if !self.status.is_unpaid() {
            return Err(AppError::bad_request(format!(
                "Invoice {} cannot be paid from {}",
                self.installment_number, self.status
            )));
        }

        self.status = InvoiceStatus::Paid;
        self.amount_paid = self.amount;
        self.paid_at = Some(now);
        self.payment_reference = Some(reference);
        self.updated_at = now;
        Ok(())
    }
}
