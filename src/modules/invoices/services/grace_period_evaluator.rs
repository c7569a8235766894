// Pure grace-period evaluation for one enrollment.
//
// Given the enrollment and all of its invoices at `now`, decide which
// invoices become OVERDUE, what the enrollment's total grace debt is, and
// whether the enrollment must be suspended. Nothing is persisted here; the
// sweep applies the result in a per-enrollment transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::core::{AppError, Result};
use crate::modules::enrollments::models::{
    Enrollment, EnrollmentState, GraceDecision, GRACE_PERIOD_LIMIT_DAYS,
};
use crate::modules::invoices::models::{Invoice, InvoiceStatus};

/// A PENDING invoice found past its due date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueTransition {
    pub invoice_id: String,
    pub installment_number: u32,
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub days_overdue: u32,
}

/// Decision for one enrollment, to be applied atomically
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraceEvaluation {
    pub enrollment_id: String,
    pub evaluated_at: DateTime<Utc>,
    pub transitions: Vec<OverdueTransition>,
    /// Sum of whole days overdue over every OVERDUE invoice after the transitions
    pub total_grace_days: u32,
    pub decision: GraceDecision,
    pub next_state: EnrollmentState,
}

impl GraceEvaluation {
    pub fn grace_period_remaining(&self) -> u32 {
        GRACE_PERIOD_LIMIT_DAYS.saturating_sub(self.total_grace_days)
    }

    pub fn has_transitions(&self) -> bool {
        !self.transitions.is_empty()
    }

    pub fn suspends(&self) -> bool {
        self.decision == GraceDecision::Suspend
    }
}

pub struct GracePeriodEvaluator;

impl GracePeriodEvaluator {
    /// Evaluate an enrollment's grace debt at `now`.
    ///
    /// The total is recomputed from scratch on every run, so evaluating
    /// twice at the same instant yields the same result.
    pub fn evaluate(
        enrollment: &Enrollment,
        invoices: &[Invoice],
        now: DateTime<Utc>,
    ) -> Result<GraceEvaluation> {
        if let Some(foreign) = invoices
            .iter()
            .find(|invoice| invoice.enrollment_id != enrollment.id)
        {
            return Err(AppError::internal(format!(
                "Invoice {} does not belong to enrollment {}",
                foreign.id, enrollment.id
            )));
        }

        let transitions: Vec<OverdueTransition> = invoices
            .iter()
            .filter(|invoice| invoice.is_past_due(now))
            .map(|invoice| OverdueTransition {
                invoice_id: invoice.id.clone(),
                installment_number: invoice.installment_number,
                amount: invoice.amount,
                due_date: invoice.due_date,
                days_overdue: invoice.days_overdue(now),
            })
            .collect();

        let total_grace_days = invoices
            .iter()
            .filter(|invoice| invoice.status == InvoiceStatus::Overdue || invoice.is_past_due(now))
            .map(|invoice| invoice.days_overdue(now))
            .fold(0u32, u32::saturating_add);

        let (next_state, decision) = enrollment.state.with_grace_days(total_grace_days)?;

        Ok(GraceEvaluation {
            enrollment_id: enrollment.id.clone(),
            evaluated_at: now,
            transitions,
            total_grace_days,
            decision,
            next_state,
        })
    }
}
