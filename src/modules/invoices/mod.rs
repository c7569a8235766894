// Invoices module (installment schedule, grace-period sweep, reminders, settlement)

pub mod models;
pub mod repositories;
pub mod services;

pub use models::{Invoice, InvoiceStatus};
pub use repositories::InvoiceRepository;
pub use services::{GracePeriodSweep, InvoiceScheduler, InvoiceService, ReminderPass};
