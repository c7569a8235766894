use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::core::clock::whole_days_between;
use crate::core::{Clock, Result};
use crate::modules::enrollments::repositories::EnrollmentRepository;
use crate::modules::invoices::models::Invoice;
use crate::modules::invoices::repositories::InvoiceRepository;
use crate::modules::notifications::models::{Notice, ReminderNotice};
use crate::modules::notifications::services::{NoticeBatch, NoticeContext, NotificationService};
use crate::modules::parties::repositories::PartyDirectory;
use crate::modules::properties::repositories::PropertyCatalog;

/// Counts for one reminder pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReminderReport {
    pub invoices_due_soon: usize,
    pub enrollments_skipped: usize,
    pub notices_sent: usize,
    pub notices_failed: usize,
}

/// Hourly read-only pass reminding clients and agents of installments
/// coming due within the window
pub struct ReminderPass {
    enrollments: Arc<dyn EnrollmentRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    properties: Arc<dyn PropertyCatalog>,
    parties: Arc<dyn PartyDirectory>,
    notifier: Arc<dyn NotificationService>,
    clock: Arc<dyn Clock>,
    period: Duration,
    window: chrono::Duration,
    notice_timeout: Duration,
}

impl ReminderPass {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        enrollments: Arc<dyn EnrollmentRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        properties: Arc<dyn PropertyCatalog>,
        parties: Arc<dyn PartyDirectory>,
        notifier: Arc<dyn NotificationService>,
        clock: Arc<dyn Clock>,
        period: Duration,
        window: chrono::Duration,
        notice_timeout: Duration,
    ) -> Self {
        Self {
            enrollments,
            invoices,
            properties,
            parties,
            notifier,
            clock,
            period,
            window,
            notice_timeout,
        }
    }

    /// Run forever on the configured period. Spawn from main.
    pub async fn start(self: Arc<Self>) {
        info!(
            period_secs = self.period.as_secs(),
            window_days = self.window.num_days(),
            "Starting installment reminder pass"
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if let Err(e) = self.run_once(self.clock.now()).await {
                error!(error = %e, "Reminder pass failed");
            }
        }
    }

    /// Remind about PENDING invoices with `now <= due_date <= now + window`
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<ReminderReport> {
        let due_soon = self
            .invoices
            .find_pending_due_between(now, now + self.window)
            .await?;

        let mut by_enrollment: BTreeMap<String, Vec<Invoice>> = BTreeMap::new();
        for invoice in due_soon {
            by_enrollment
                .entry(invoice.enrollment_id.clone())
                .or_default()
                .push(invoice);
        }

        let mut report = ReminderReport::default();
        let mut batch = NoticeBatch::new(Arc::clone(&self.notifier), self.notice_timeout);

        for (enrollment_id, invoices) in &by_enrollment {
            let enrollment = match self.enrollments.find_by_id(enrollment_id).await {
                Ok(Some(enrollment)) if !enrollment.is_cancelled() => enrollment,
                Ok(_) => {
                    debug!(enrollment_id = %enrollment_id, "No active enrollment for due invoices");
                    report.enrollments_skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(
                        enrollment_id = %enrollment_id,
                        error = %e,
                        "Could not load enrollment for reminders"
                    );
                    report.enrollments_skipped += 1;
                    continue;
                }
            };

            let context =
                NoticeContext::load(self.properties.as_ref(), self.parties.as_ref(), &enrollment)
                    .await;

            for invoice in invoices {
                report.invoices_due_soon += 1;
                for recipient in &context.recipients {
                    batch.dispatch(Notice::Reminder(ReminderNotice {
                        recipient: recipient.clone(),
                        enrollment_id: enrollment.id.clone(),
                        property_name: context.property_name.clone(),
                        installment_number: invoice.installment_number,
                        amount: invoice.amount,
                        due_date: invoice.due_date,
                        days_until_due: whole_days_between(now, invoice.due_date),
                    }));
                }
            }
        }

        let dispatch = batch.finish().await;
        report.notices_sent = dispatch.sent;
        report.notices_failed = dispatch.failed;

        info!(
            invoices_due_soon = report.invoices_due_soon,
            enrollments_skipped = report.enrollments_skipped,
            notices_sent = report.notices_sent,
            notices_failed = report.notices_failed,
            "Reminder pass finished"
        );

        Ok(report)
    }
}
