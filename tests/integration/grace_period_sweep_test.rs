// Grace-period sweep: overdue transitions, suspension, per-enrollment
// isolation and notices

#[path = "../helpers/mod.rs"]
mod helpers;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use estatepay::core::{Actor, Result};
use estatepay::modules::enrollments::models::{Enrollment, EnrollmentState, EnrollmentStatus};
use estatepay::modules::enrollments::repositories::{
    CancellationSummary, ClientLink, EnrollmentRepository,
};
use estatepay::modules::invoices::models::{Invoice, InvoiceStatus};
use estatepay::modules::invoices::repositories::InvoiceRepository;
use estatepay::modules::invoices::services::{
    GraceEvaluation, GracePeriodEvaluator, GracePeriodSweep,
};
use helpers::*;
use rust_decimal_macros::dec;

/// Settles an invoice right before the sweep's evaluation is written
struct SettledBeforeApply {
    store: Arc<InMemoryStore>,
    invoice_id: String,
}

#[async_trait]
impl EnrollmentRepository for SettledBeforeApply {
    async fn create_with_invoices(
        &self,
        enrollment: &Enrollment,
        invoices: &[Invoice],
    ) -> Result<()> {
        self.store.create_with_invoices(enrollment, invoices).await
    }

    async fn find_by_id(&self, enrollment_id: &str) -> Result<Option<Enrollment>> {
        EnrollmentRepository::find_by_id(self.store.as_ref(), enrollment_id).await
    }

    async fn has_active_enrollment(&self, client_id: &str, property_id: &str) -> Result<bool> {
        self.store.has_active_enrollment(client_id, property_id).await
    }

    async fn cancel(&self, enrollment: &Enrollment) -> Result<CancellationSummary> {
        self.store.cancel(enrollment).await
    }

    async fn resume(&self, enrollment: &Enrollment) -> Result<()> {
        self.store.resume(enrollment).await
    }

    async fn link_client(&self, link: &ClientLink) -> Result<u64> {
        self.store.link_client(link).await
    }

    async fn apply_grace_evaluation(&self, evaluation: &GraceEvaluation) -> Result<()> {
        self.store
            .settle(&self.invoice_id, "PAY-LATE", evaluation.evaluated_at)
            .await?;
        self.store.apply_grace_evaluation(evaluation).await
    }
}

#[tokio::test]
async fn test_forty_days_overdue_suspends_then_resume_clears_debt() {
    let fx = Fixture::new();
    let (enrollment, invoices) =
        seeded_enrollment(&fx.store, start_date(), &[dec!(500000)], Some(CLIENT_ID));

    fx.clock.advance(Duration::days(40));
    let report = fx.sweep.run_once(fx.now()).await.unwrap();

    assert_eq!(report.invoices_marked_overdue, 1);
    assert_eq!(report.enrollments_evaluated, 1);
    assert_eq!(report.enrollments_suspended, 1);

    let stored = fx.store.enrollment(&enrollment.id).unwrap();
    assert_eq!(stored.state, EnrollmentState::Suspended { grace_days: 40 });
    assert_eq!(stored.suspended_at, Some(fx.now()));

    let invoice = &fx.store.invoices_of(&enrollment.id)[0];
    assert_eq!(invoice.id, invoices[0].id);
    assert_eq!(invoice.status, InvoiceStatus::Overdue);
    assert_eq!(invoice.overdue_date, Some(fx.now()));

    let resumed = fx
        .enrollments
        .resume(&enrollment.id, &Actor::admin("admin-1"))
        .await
        .unwrap();
    assert_eq!(resumed.state, EnrollmentState::Ongoing { grace_days: 0 });

    let stored = fx.store.enrollment(&enrollment.id).unwrap();
    assert_eq!(stored.status(), EnrollmentStatus::Ongoing);
    assert_eq!(stored.grace_period_days_used(), 0);
    assert_eq!(stored.resumed_at, Some(fx.now()));
    assert_eq!(
        fx.store.invoices_of(&enrollment.id)[0].status,
        InvoiceStatus::Overdue
    );
}

#[tokio::test]
async fn test_thirty_two_days_stays_ongoing() {
    let fx = Fixture::new();
    let (enrollment, _) = seeded_enrollment(&fx.store, start_date(), &[dec!(500000)], None);

    fx.clock.advance(Duration::days(32));
    let report = fx.sweep.run_once(fx.now()).await.unwrap();

    assert_eq!(report.enrollments_suspended, 0);
    let stored = fx.store.enrollment(&enrollment.id).unwrap();
    assert_eq!(stored.state, EnrollmentState::Ongoing { grace_days: 32 });
    assert_eq!(stored.suspended_at, None);
}

#[tokio::test]
async fn test_grace_debt_sums_across_invoices() {
    let fx = Fixture::new();
    // first two due on day 0 and day 30
    let (enrollment, _) = seeded_enrollment(
        &fx.store,
        start_date(),
        &[dec!(250000), dec!(250000), dec!(500000)],
        None,
    );

    fx.clock.advance(Duration::days(20));
    fx.sweep.run_once(fx.now()).await.unwrap();
    assert_eq!(
        fx.store.enrollment(&enrollment.id).unwrap().grace_period_days_used(),
        20
    );

    // 35 on the first, 5 on the second
    fx.clock.advance(Duration::days(15));
    let report = fx.sweep.run_once(fx.now()).await.unwrap();

    assert_eq!(report.invoices_marked_overdue, 1);
    let stored = fx.store.enrollment(&enrollment.id).unwrap();
    assert_eq!(stored.state, EnrollmentState::Suspended { grace_days: 40 });
}

#[tokio::test]
async fn test_second_run_changes_nothing() {
    let fx = Fixture::new();
    let (enrollment, _) =
        seeded_enrollment(&fx.store, start_date(), &[dec!(500000)], Some(CLIENT_ID));

    fx.clock.advance(Duration::days(5));
    fx.sweep.run_once(fx.now()).await.unwrap();
    let first_overdue_date = fx.store.invoices_of(&enrollment.id)[0].overdue_date;
    let notices_after_first = fx.notifier.sent().len();

    fx.clock.advance(Duration::hours(1));
    let report = fx.sweep.run_once(fx.now()).await.unwrap();

    assert_eq!(report.invoices_marked_overdue, 0);
    assert_eq!(report.enrollments_evaluated, 0);
    assert_eq!(
        fx.store.invoices_of(&enrollment.id)[0].overdue_date,
        first_overdue_date
    );
    assert_eq!(fx.notifier.sent().len(), notices_after_first);
}

#[tokio::test]
async fn test_failing_enrollment_does_not_stop_the_pass() {
    let fx = Fixture::new();
    let (broken, _) = seeded_enrollment(&fx.store, start_date(), &[dec!(500000)], None);
    let (healthy, _) = seeded_enrollment(&fx.store, start_date(), &[dec!(500000)], None);
    fx.store.fail_grace_updates_for(&broken.id);

    fx.clock.advance(Duration::days(40));
    let report = fx.sweep.run_once(fx.now()).await.unwrap();

    assert_eq!(report.enrollments_failed, 1);
    assert_eq!(report.enrollments_evaluated, 1);
    assert_eq!(report.enrollments_suspended, 1);

    assert_eq!(
        fx.store.enrollment(&healthy.id).unwrap().status(),
        EnrollmentStatus::Suspended
    );

    let untouched = fx.store.enrollment(&broken.id).unwrap();
    assert_eq!(untouched.state, EnrollmentState::Ongoing { grace_days: 0 });
    assert_eq!(
        fx.store.invoices_of(&broken.id)[0].status,
        InvoiceStatus::Pending
    );
}

#[tokio::test]
async fn test_cancelled_enrollments_are_skipped() {
    let fx = Fixture::new();
    let (enrollment, _) = seeded_enrollment(&fx.store, start_date(), &[dec!(500000)], None);
    let mut cancelled = enrollment.clone();
    cancelled.cancel("admin-1", fx.now()).unwrap();
    // invoices left PENDING on purpose
    fx.store.insert_enrollment(cancelled, Vec::new());

    fx.clock.advance(Duration::days(40));
    let report = fx.sweep.run_once(fx.now()).await.unwrap();

    assert_eq!(report.enrollments_skipped, 1);
    assert_eq!(report.enrollments_evaluated, 0);
    assert_eq!(
        fx.store.invoices_of(&enrollment.id)[0].status,
        InvoiceStatus::Pending
    );
}

#[tokio::test]
async fn test_overdue_notices_go_to_client_and_agent() {
    let fx = Fixture::new();
    let (enrollment, _) =
        seeded_enrollment(&fx.store, start_date(), &[dec!(500000)], Some(CLIENT_ID));

    fx.clock.advance(Duration::days(10));
    let report = fx.sweep.run_once(fx.now()).await.unwrap();

    assert_eq!(report.notices_sent, 2);
    let notices = fx.notifier.overdue();
    assert_eq!(notices.len(), 2);

    let mut emails: Vec<String> = notices.iter().map(|n| n.recipient.email.clone()).collect();
    emails.sort();
    assert_eq!(emails, vec!["ada@agents.test", "obi@clients.test"]);

    for notice in &notices {
        assert_eq!(notice.enrollment_id, enrollment.id);
        assert_eq!(notice.property_name, "Lekki Palms Estate");
        assert_eq!(notice.installment_number, 1);
        assert_eq!(notice.amount, dec!(500000));
        assert_eq!(notice.days_overdue, 10);
        assert_eq!(notice.grace_period_remaining, 22);
    }
}

#[tokio::test]
async fn test_enrollment_without_client_notifies_agent_only() {
    let fx = Fixture::new();
    seeded_enrollment(&fx.store, start_date(), &[dec!(500000)], None);

    fx.clock.advance(Duration::days(3));
    fx.sweep.run_once(fx.now()).await.unwrap();

    let notices = fx.notifier.overdue();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].recipient.email, "ada@agents.test");
}

#[tokio::test]
async fn test_failed_notice_does_not_undo_the_sweep() {
    let notifier = RecordingNotifier::new();
    notifier.fail_for("obi@clients.test");
    let fx = Fixture::with_notifier(notifier, StdDuration::from_secs(2));
    let (enrollment, _) =
        seeded_enrollment(&fx.store, start_date(), &[dec!(500000)], Some(CLIENT_ID));

    fx.clock.advance(Duration::days(40));
    let report = fx.sweep.run_once(fx.now()).await.unwrap();

    assert_eq!(report.notices_sent, 1);
    assert_eq!(report.notices_failed, 1);
    assert_eq!(
        fx.store.enrollment(&enrollment.id).unwrap().status(),
        EnrollmentStatus::Suspended
    );
}

#[tokio::test]
async fn test_slow_notifier_is_timed_out() {
    let fx = Fixture::with_notifier(
        RecordingNotifier::with_delay(StdDuration::from_secs(30)),
        StdDuration::from_millis(50),
    );
    let (enrollment, _) = seeded_enrollment(&fx.store, start_date(), &[dec!(500000)], None);

    fx.clock.advance(Duration::days(40));
    let report = fx.sweep.run_once(fx.now()).await.unwrap();

    assert_eq!(report.notices_sent, 0);
    assert_eq!(report.notices_failed, 1);
    assert_eq!(
        fx.store.enrollment(&enrollment.id).unwrap().status(),
        EnrollmentStatus::Suspended
    );
}

#[tokio::test]
async fn test_settlement_before_apply_leaves_enrollment_untouched() {
    let fx = Fixture::new();
    let (enrollment, invoices) =
        seeded_enrollment(&fx.store, start_date(), &[dec!(500000)], Some(CLIENT_ID));

    fx.clock.advance(Duration::days(40));
    let stored = fx.store.enrollment(&enrollment.id).unwrap();
    let current = fx.store.invoices_of(&enrollment.id);
    let evaluation = GracePeriodEvaluator::evaluate(&stored, &current, fx.now()).unwrap();
    assert!(evaluation.suspends());

    fx.invoices
        .settle_invoice(&invoices[0].id, "PAY-001")
        .await
        .unwrap();

    assert!(fx.store.apply_grace_evaluation(&evaluation).await.is_err());

    let invoice = &fx.store.invoices_of(&enrollment.id)[0];
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert_eq!(invoice.overdue_date, None);
    let stored = fx.store.enrollment(&enrollment.id).unwrap();
    assert_eq!(stored.state, EnrollmentState::Ongoing { grace_days: 0 });
    assert_eq!(stored.suspended_at, None);
}

#[tokio::test]
async fn test_sweep_losing_to_settlement_counts_as_failed() {
    let fx = Fixture::new();
    let (enrollment, invoices) =
        seeded_enrollment(&fx.store, start_date(), &[dec!(500000)], Some(CLIENT_ID));

    let sweep = GracePeriodSweep::new(
        Arc::new(SettledBeforeApply {
            store: fx.store.clone(),
            invoice_id: invoices[0].id.clone(),
        }),
        fx.store.clone(),
        fx.store.clone(),
        fx.store.clone(),
        fx.notifier.clone(),
        fx.clock.clone(),
        StdDuration::from_secs(86_400),
        StdDuration::from_secs(2),
    );

    fx.clock.advance(Duration::days(40));
    let report = sweep.run_once(fx.now()).await.unwrap();

    assert_eq!(report.enrollments_failed, 1);
    assert_eq!(report.enrollments_evaluated, 0);
    assert_eq!(report.enrollments_suspended, 0);
    assert_eq!(report.notices_sent, 0);

    let invoice = &fx.store.invoices_of(&enrollment.id)[0];
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    let stored = fx.store.enrollment(&enrollment.id).unwrap();
    assert_eq!(stored.state, EnrollmentState::Ongoing { grace_days: 0 });
    assert!(fx.notifier.sent().is_empty());
}
