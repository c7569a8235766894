use async_trait::async_trait;

use crate::core::Result;
use crate::modules::notifications::models::{Notice, OverdueNotice, ReminderNotice};

/// Outbound notification port.
///
/// Callers treat every send as best-effort: an error is logged by the
/// dispatcher and never aborts billing work.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_overdue_notice(&self, notice: &OverdueNotice) -> Result<()>;

    async fn send_reminder_notice(&self, notice: &ReminderNotice) -> Result<()>;

    /// Channel name for logs
    fn name(&self) -> &str;

    async fn send(&self, notice: &Notice) -> Result<()> {
        match notice {
            Notice::Overdue(overdue) => self.send_overdue_notice(overdue).await,
            Notice::Reminder(reminder) => self.send_reminder_notice(reminder).await,
        }
    }
}
