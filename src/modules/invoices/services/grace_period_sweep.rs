use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::core::{AppError, Clock, Result};
use crate::modules::enrollments::models::EnrollmentStatus;
use crate::modules::enrollments::repositories::EnrollmentRepository;
use crate::modules::invoices::repositories::InvoiceRepository;
use crate::modules::invoices::services::grace_period_evaluator::{
    GraceEvaluation, GracePeriodEvaluator,
};
use crate::modules::notifications::models::{Notice, OverdueNotice};
use crate::modules::notifications::services::{
    DispatchReport, NoticeBatch, NoticeContext, NotificationService,
};
use crate::modules::parties::repositories::PartyDirectory;
use crate::modules::properties::repositories::PropertyCatalog;

/// Counts for one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub invoices_marked_overdue: usize,
    pub enrollments_evaluated: usize,
    pub enrollments_suspended: usize,
    pub enrollments_skipped: usize,
    pub enrollments_failed: usize,
    pub notices_sent: usize,
    pub notices_failed: usize,
}

impl SweepReport {
    fn record_notices(&mut self, dispatch: DispatchReport) {
        self.notices_sent = dispatch.sent;
        self.notices_failed = dispatch.failed;
    }
}

/// Daily pass that moves past-due installments to OVERDUE, recomputes each
/// enrollment's grace debt and suspends enrollments over the limit.
///
/// Each enrollment is applied in its own transaction; a failure is logged
/// and the pass moves on to the next enrollment.
pub struct GracePeriodSweep {
    enrollments: Arc<dyn EnrollmentRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    properties: Arc<dyn PropertyCatalog>,
    parties: Arc<dyn PartyDirectory>,
    notifier: Arc<dyn NotificationService>,
    clock: Arc<dyn Clock>,
    period: Duration,
    notice_timeout: Duration,
}

impl GracePeriodSweep {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        enrollments: Arc<dyn EnrollmentRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        properties: Arc<dyn PropertyCatalog>,
        parties: Arc<dyn PartyDirectory>,
        notifier: Arc<dyn NotificationService>,
        clock: Arc<dyn Clock>,
        period: Duration,
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
            notice_timeout,
        }
    }

    /// Run forever on the configured period. Spawn from main.
    pub async fn start(self: Arc<Self>) {
        info!(
            period_secs = self.period.as_secs(),
            channel = self.notifier.name(),
            "Starting grace-period sweep"
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if let Err(e) = self.run_once(self.clock.now()).await {
                error!(error = %e, "Grace-period sweep failed");
            }
        }
    }

    /// One pass at `now`.
    ///
    /// Only the initial lookup of past-due invoices can fail the pass;
    /// everything after it is isolated per enrollment.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let past_due = self.invoices.find_past_due_pending(now).await?;

        let mut by_enrollment: BTreeMap<String, usize> = BTreeMap::new();
        for invoice in &past_due {
            *by_enrollment.entry(invoice.enrollment_id.clone()).or_default() += 1;
        }

        debug!(
            invoices = past_due.len(),
            enrollments = by_enrollment.len(),
            "Grace-period sweep started"
        );

        let mut report = SweepReport::default();
        let mut batch = NoticeBatch::new(Arc::clone(&self.notifier), self.notice_timeout);

        for enrollment_id in by_enrollment.keys() {
            match self.process_enrollment(enrollment_id, now, &mut batch).await {
                Ok(Some(evaluation)) => {
                    report.enrollments_evaluated += 1;
                    report.invoices_marked_overdue += evaluation.transitions.len();
                    if evaluation.suspends() {
                        report.enrollments_suspended += 1;
                    }
                }
                Ok(None) => report.enrollments_skipped += 1,
                Err(e) => {
                    error!(
                        enrollment_id = %enrollment_id,
                        error = %e,
                        "Grace-period evaluation failed, skipping enrollment"
                    );
                    report.enrollments_failed += 1;
                }
            }
        }

        report.record_notices(batch.finish().await);

        info!(
            invoices_marked_overdue = report.invoices_marked_overdue,
            enrollments_evaluated = report.enrollments_evaluated,
            enrollments_suspended = report.enrollments_suspended,
            enrollments_skipped = report.enrollments_skipped,
            enrollments_failed = report.enrollments_failed,
            notices_sent = report.notices_sent,
            notices_failed = report.notices_failed,
            "Grace-period sweep finished"
        );

        Ok(report)
    }

    async fn process_enrollment(
        &self,
        enrollment_id: &str,
        now: DateTime<Utc>,
        batch: &mut NoticeBatch,
    ) -> Result<Option<GraceEvaluation>> {
        let enrollment = self
            .enrollments
            .find_by_id(enrollment_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Enrollment '{}' not found", enrollment_id))
            })?;

        if !matches!(
            enrollment.status(),
            EnrollmentStatus::Ongoing | EnrollmentStatus::Suspended
        ) {
            debug!(
                enrollment_id = %enrollment.id,
                status = %enrollment.status(),
                "Skipping enrollment outside the grace-period lifecycle"
            );
            return Ok(None);
        }

        let invoices = self.invoices.find_by_enrollment(&enrollment.id).await?;
        let evaluation = GracePeriodEvaluator::evaluate(&enrollment, &invoices, now)?;

        self.enrollments.apply_grace_evaluation(&evaluation).await?;

        if evaluation.suspends() {
            warn!(
                enrollment_id = %enrollment.id,
                grace_days = evaluation.total_grace_days,
                "Enrollment suspended for exceeding the grace period"
            );
        }

        let context =
            NoticeContext::load(self.properties.as_ref(), self.parties.as_ref(), &enrollment).await;

        for transition in &evaluation.transitions {
            for recipient in &context.recipients {
                batch.dispatch(Notice::Overdue(OverdueNotice {
                    recipient: recipient.clone(),
                    enrollment_id: enrollment.id.clone(),
                    property_name: context.property_name.clone(),
                    installment_number: transition.installment_number,
                    amount: transition.amount,
                    due_date: transition.due_date,
                    days_overdue: transition.days_overdue,
                    grace_period_remaining: evaluation.grace_period_remaining(),
                }));
            }
        }

        Ok(Some(evaluation))
    }
}
