pub mod dispatcher;
pub mod log_notifier;
pub mod notice_context;
pub mod notification_service;
pub mod webhook_notifier;

pub use dispatcher::{DispatchReport, NoticeBatch};
pub use log_notifier::LogNotifier;
pub use notice_context::NoticeContext;
pub use notification_service::NotificationService;
pub use webhook_notifier::WebhookNotifier;
