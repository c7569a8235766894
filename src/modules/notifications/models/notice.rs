use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::modules::parties::models::Recipient;

/// Sent once when an installment turns OVERDUE
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueNotice {
    pub recipient: Recipient,
    pub enrollment_id: String,
    pub property_name: String,
    pub installment_number: u32,
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub days_overdue: u32,
    pub grace_period_remaining: u32,
}

/// Sent by the hourly pass for installments coming due soon
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReminderNotice {
    pub recipient: Recipient,
    pub enrollment_id: String,
    pub property_name: String,
    pub installment_number: u32,
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub days_until_due: u32,
}

/// Any notice the billing engine emits
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    Overdue(OverdueNotice),
    Reminder(ReminderNotice),
}

impl Notice {
    pub fn recipient(&self) -> &Recipient {
        match self {
            Notice::Overdue(notice) => &notice.recipient,
            Notice::Reminder(notice) => &notice.recipient,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notice::Overdue(_) => "overdue",
            Notice::Reminder(_) => "reminder",
        }
    }
}
