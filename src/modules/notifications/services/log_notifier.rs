use async_trait::async_trait;
use tracing::info;

use crate::core::{Currency, Result};
use crate::modules::notifications::models::{OverdueNotice, ReminderNotice};
use crate::modules::notifications::services::NotificationService;

/// Writes notices to the log; used when no delivery endpoint is configured
#[derive(Debug, Default)]
pub struct LogNotifier {
    currency: Currency,
}

impl LogNotifier {
    pub fn new(currency: Currency) -> Self {
        Self { currency }
    }
}

#[async_trait]
impl NotificationService for LogNotifier {
    async fn send_overdue_notice(&self, notice: &OverdueNotice) -> Result<()> {
        info!(
            recipient = notice.recipient.email.as_str(),
            enrollment_id = notice.enrollment_id.as_str(),
            installment_number = notice.installment_number,
            amount = %self.currency.format_amount(notice.amount),
            days_overdue = notice.days_overdue,
            grace_period_remaining = notice.grace_period_remaining,
            "Overdue notice"
        );
        Ok(())
    }

    async fn send_reminder_notice(&self, notice: &ReminderNotice) -> Result<()> {
        info!(
            recipient = notice.recipient.email.as_str(),
            enrollment_id = notice.enrollment_id.as_str(),
            installment_number = notice.installment_number,
            amount = %self.currency.format_amount(notice.amount),
            due_date = %notice.due_date,
            days_until_due = notice.days_until_due,
            "Payment reminder"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
