// Notifications module (best-effort overdue and reminder notices)

pub mod models;
pub mod services;

pub use models::{Notice, OverdueNotice, ReminderNotice};
pub use services::{LogNotifier, NoticeBatch, NotificationService, WebhookNotifier};
