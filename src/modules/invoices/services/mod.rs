pub mod grace_period_evaluator;
pub mod grace_period_sweep;
pub mod invoice_scheduler;
pub mod invoice_service;
pub mod reminder_pass;

pub use grace_period_evaluator::{GraceEvaluation, GracePeriodEvaluator, OverdueTransition};
pub use grace_period_sweep::{GracePeriodSweep, SweepReport};
pub use invoice_scheduler::{InvoiceScheduler, DAYS_PER_CYCLE_MONTH};
pub use invoice_service::InvoiceService;
pub use reminder_pass::{ReminderPass, ReminderReport};
