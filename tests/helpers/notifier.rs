use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use estatepay::core::{AppError, Result};
use estatepay::modules::notifications::models::{Notice, OverdueNotice, ReminderNotice};
use estatepay::modules::notifications::services::NotificationService;

/// Records every notice; can be told to fail or stall
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notice>>,
    failing_emails: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send sleeps this long before recording
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Sends to this address return an error
    pub fn fail_for(&self, email: &str) {
        self.failing_emails.lock().unwrap().push(email.to_string());
    }

    pub fn sent(&self) -> Vec<Notice> {
        self.sent.lock().unwrap().clone()
    }

    pub fn overdue(&self) -> Vec<OverdueNotice> {
        self.sent()
            .into_iter()
            .filter_map(|notice| match notice {
                Notice::Overdue(notice) => Some(notice),
                Notice::Reminder(_) => None,
            })
            .collect()
    }

    pub fn reminders(&self) -> Vec<ReminderNotice> {
        self.sent()
            .into_iter()
            .filter_map(|notice| match notice {
                Notice::Reminder(notice) => Some(notice),
                Notice::Overdue(_) => None,
            })
            .collect()
    }

    async fn record(&self, notice: Notice) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let email = notice.recipient().email.clone();
        if self.failing_emails.lock().unwrap().contains(&email) {
            return Err(AppError::notification(format!("Delivery to {} refused", email)));
        }

        self.sent.lock().unwrap().push(notice);
        Ok(())
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn send_overdue_notice(&self, notice: &OverdueNotice) -> Result<()> {
        self.record(Notice::Overdue(notice.clone())).await
    }

    async fn send_reminder_notice(&self, notice: &ReminderNotice) -> Result<()> {
        self.record(Notice::Reminder(notice.clone())).await
    }

    fn name(&self) -> &str {
        "recording"
    }
}
