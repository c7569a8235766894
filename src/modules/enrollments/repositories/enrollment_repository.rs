// Enrollment persistence.
//
// Every mutating call is one transaction. Status transitions are written
// as conditional updates on the expected current status, so a concurrent
// writer that got there first makes the losing call fail instead of
// silently overwriting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::debug;

use crate::core::{AppError, Result};
use crate::modules::commissions::repositories::delete_pending_for_invoices_tx;
use crate::modules::enrollments::models::{
    Enrollment, EnrollmentState, EnrollmentStatus, PaymentType,
};
use crate::modules::invoices::models::Invoice;
use crate::modules::invoices::repositories::{
    cancel_unpaid_invoices_tx, insert_invoices_tx, mark_overdue_tx,
};
use crate::modules::invoices::services::GraceEvaluation;
use crate::modules::payment_links::repositories::deactivate_for_enrollment_tx;
use crate::modules::properties::repositories::mark_unit_sold_tx;

/// What a cancellation cleaned up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CancellationSummary {
    pub cancelled_invoices: usize,
    pub deleted_commissions: u64,
}

/// Attach a client (and its derived partner) to an enrollment
#[derive(Debug, Clone)]
pub struct ClientLink {
    pub enrollment_id: String,
    pub property_id: String,
    pub client_id: String,
    pub partner_id: Option<String>,
    pub linked_at: DateTime<Utc>,
}

/// Enrollment port
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Persist a new enrollment with its invoices, marking the selected unit
    /// SOLD in the same transaction
    async fn create_with_invoices(
        &self,
        enrollment: &Enrollment,
        invoices: &[Invoice],
    ) -> Result<()>;

    async fn find_by_id(&self, enrollment_id: &str) -> Result<Option<Enrollment>>;

    /// Whether the client holds a non-cancelled enrollment for the property
    async fn has_active_enrollment(&self, client_id: &str, property_id: &str) -> Result<bool>;

    /// Persist an enrollment already moved to CANCELLED, cancelling its
    /// unpaid invoices and deleting their pending commissions
    async fn cancel(&self, enrollment: &Enrollment) -> Result<CancellationSummary>;

    /// Persist an enrollment already moved from SUSPENDED back to ONGOING
    async fn resume(&self, enrollment: &Enrollment) -> Result<()>;

    /// Attach a client and deactivate the enrollment's active payment links.
    /// Returns how many links were deactivated.
    async fn link_client(&self, link: &ClientLink) -> Result<u64>;

    /// Apply one grace-period evaluation atomically
    async fn apply_grace_evaluation(&self, evaluation: &GraceEvaluation) -> Result<()>;
}

/// MySQL-backed enrollment repository
pub struct MySqlEnrollmentRepository {
    pool: MySqlPool,
}

impl MySqlEnrollmentRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'_, MySql>> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))
    }
}

#[async_trait]
impl EnrollmentRepository for MySqlEnrollmentRepository {
    async fn create_with_invoices(
        &self,
        enrollment: &Enrollment,
        invoices: &[Invoice],
    ) -> Result<()> {
        let mut tx = self.begin().await?;

        if let Some(client_id) = enrollment.client_id.as_deref() {
            if count_active_tx(&mut tx, client_id, &enrollment.property_id, None).await? > 0 {
                return Err(AppError::bad_request(
                    "Client already has an active enrollment for this property",
                ));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO enrollments (
                id, property_id, property_unit_id, agent_id, client_id, partner_id,
                payment_type, selected_payment_plan_id, selected_unit,
                total_amount, amount_paid, status, grace_period_days_used,
                enrollment_date, cancelled_at, cancelled_by, suspended_at, resumed_at,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&enrollment.id)
        .bind(&enrollment.property_id)
        .bind(&enrollment.property_unit_id)
        .bind(&enrollment.agent_id)
        .bind(&enrollment.client_id)
        .bind(&enrollment.partner_id)
        .bind(enrollment.payment_type.as_str())
        .bind(&enrollment.selected_payment_plan_id)
        .bind(&enrollment.selected_unit)
        .bind(enrollment.total_amount)
        .bind(enrollment.amount_paid)
        .bind(enrollment.status().as_str())
        .bind(enrollment.grace_period_days_used())
        .bind(enrollment.enrollment_date)
        .bind(enrollment.cancelled_at())
        .bind(enrollment.cancelled_by())
        .bind(enrollment.suspended_at)
        .bind(enrollment.resumed_at)
        .bind(enrollment.created_at)
        .bind(enrollment.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to insert enrollment: {}", e)))?;

        if let Some(unit_id) = enrollment.property_unit_id.as_deref() {
            mark_unit_sold_tx(&mut tx, unit_id).await?;
        }

        insert_invoices_tx(&mut tx, invoices).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, enrollment_id: &str) -> Result<Option<Enrollment>> {
        let row = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            SELECT
                id, property_id, property_unit_id, agent_id, client_id, partner_id,
                payment_type, selected_payment_plan_id, selected_unit,
                total_amount, amount_paid, status, grace_period_days_used,
                enrollment_date, cancelled_at, cancelled_by, suspended_at, resumed_at,
                created_at, updated_at
            FROM enrollments
            WHERE id = ?
            "#,
        )
        .bind(enrollment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch enrollment: {}", e)))?;

        row.map(Enrollment::try_from).transpose()
    }

    async fn has_active_enrollment(&self, client_id: &str, property_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM enrollments
            WHERE client_id = ? AND property_id = ? AND status <> 'CANCELLED'
            "#,
        )
        .bind(client_id)
        .bind(property_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to check enrollments: {}", e)))?;

        Ok(count > 0)
    }

    async fn cancel(&self, enrollment: &Enrollment) -> Result<CancellationSummary> {
        let cancelled_at = enrollment
            .cancelled_at()
            .ok_or_else(|| AppError::internal("Enrollment must be cancelled before persisting"))?;

        let mut tx = self.begin().await?;

        let rows_affected = sqlx::query(
            r#"
            UPDATE enrollments
            SET status = 'CANCELLED', cancelled_at = ?, cancelled_by = ?, updated_at = ?
            WHERE id = ? AND status IN ('ONGOING', 'SUSPENDED')
            "#,
        )
        .bind(cancelled_at)
        .bind(enrollment.cancelled_by())
        .bind(enrollment.updated_at)
        .bind(&enrollment.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to cancel enrollment: {}", e)))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::bad_request("Enrollment is already cancelled"));
        }

        let invoice_ids = cancel_unpaid_invoices_tx(&mut tx, &enrollment.id, cancelled_at).await?;
        let deleted_commissions = delete_pending_for_invoices_tx(&mut tx, &invoice_ids).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(CancellationSummary {
            cancelled_invoices: invoice_ids.len(),
            deleted_commissions,
        })
    }

    async fn resume(&self, enrollment: &Enrollment) -> Result<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE enrollments
            SET status = 'ONGOING', grace_period_days_used = 0, resumed_at = ?, updated_at = ?
            WHERE id = ? AND status = 'SUSPENDED'
            "#,
        )
        .bind(enrollment.resumed_at)
        .bind(enrollment.updated_at)
        .bind(&enrollment.id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to resume enrollment: {}", e)))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::bad_request(
                "Only suspended enrollments can be resumed",
            ));
        }

        Ok(())
    }

    async fn link_client(&self, link: &ClientLink) -> Result<u64> {
        let mut tx = self.begin().await?;

        let rows_affected = sqlx::query(
            r#"
            UPDATE enrollments
            SET client_id = ?, partner_id = ?, updated_at = ?
            WHERE id = ? AND client_id IS NULL AND status <> 'CANCELLED'
            "#,
        )
        .bind(&link.client_id)
        .bind(&link.partner_id)
        .bind(link.linked_at)
        .bind(&link.enrollment_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to link client: {}", e)))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::bad_request(
                "Enrollment already has a client or is cancelled",
            ));
        }

        let others = count_active_tx(
            &mut tx,
            &link.client_id,
            &link.property_id,
            Some(&link.enrollment_id),
        )
        .await?;
        if others > 0 {
            return Err(AppError::bad_request(
                "Client already has an active enrollment for this property",
            ));
        }

        let deactivated = deactivate_for_enrollment_tx(&mut tx, &link.enrollment_id).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(deactivated)
    }

    async fn apply_grace_evaluation(&self, evaluation: &GraceEvaluation) -> Result<()> {
        let mut tx = self.begin().await?;
        let now = evaluation.evaluated_at;

        for transition in &evaluation.transitions {
            mark_overdue_tx(&mut tx, &transition.invoice_id, now).await?;
        }

        let rows_affected = if evaluation.suspends() {
            sqlx::query(
                r#"
                UPDATE enrollments
                SET status = 'SUSPENDED', grace_period_days_used = ?,
                    suspended_at = ?, updated_at = ?
                WHERE id = ? AND status = 'ONGOING'
                "#,
            )
            .bind(evaluation.total_grace_days)
            .bind(now)
            .bind(now)
            .bind(&evaluation.enrollment_id)
            .execute(&mut *tx)
            .await
        } else {
            sqlx::query(
                r#"
                UPDATE enrollments
                SET grace_period_days_used = ?, updated_at = ?
                WHERE id = ? AND status = ?
                "#,
            )
            .bind(evaluation.total_grace_days)
            .bind(now)
            .bind(&evaluation.enrollment_id)
            .bind(evaluation.next_state.status().as_str())
            .execute(&mut *tx)
            .await
        }
        .map_err(|e| AppError::Internal(format!("Failed to update grace period: {}", e)))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::internal(format!(
                "Enrollment '{}' changed status during the grace-period sweep",
                evaluation.enrollment_id
            )));
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        debug!(
            enrollment_id = %evaluation.enrollment_id,
            overdue = evaluation.transitions.len(),
            grace_days = evaluation.total_grace_days,
            suspended = evaluation.suspends(),
            "Applied grace-period evaluation"
        );

        Ok(())
    }
}

/// Non-cancelled enrollments of a client for a property, optionally
/// excluding one enrollment
async fn count_active_tx(
    tx: &mut Transaction<'_, MySql>,
    client_id: &str,
    property_id: &str,
    excluding: Option<&str>,
) -> Result<i64> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM enrollments
        WHERE client_id = ? AND property_id = ? AND status <> 'CANCELLED'
          AND (? IS NULL OR id <> ?)
        FOR UPDATE
        "#,
    )
    .bind(client_id)
    .bind(property_id)
    .bind(excluding)
    .bind(excluding)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| AppError::Internal(format!("Failed to check enrollments: {}", e)))
}

// Helper structs for database mapping

#[derive(Debug, sqlx::FromRow)]
struct EnrollmentRow {
    id: String,
    property_id: String,
    property_unit_id: Option<String>,
    agent_id: String,
    client_id: Option<String>,
    partner_id: Option<String>,
    payment_type: String,
    selected_payment_plan_id: Option<String>,
    selected_unit: String,
    total_amount: Decimal,
    amount_paid: Decimal,
    status: String,
    grace_period_days_used: u32,
    enrollment_date: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
    cancelled_by: Option<String>,
    suspended_at: Option<DateTime<Utc>>,
    resumed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EnrollmentRow> for Enrollment {
    type Error = AppError;

    fn try_from(row: EnrollmentRow) -> Result<Self> {
        let status = EnrollmentStatus::try_from(row.status)
            .map_err(|e| AppError::Internal(format!("Invalid enrollment in database: {}", e)))?;
        let payment_type = PaymentType::try_from(row.payment_type)
            .map_err(|e| AppError::Internal(format!("Invalid enrollment in database: {}", e)))?;

        let state = match status {
            EnrollmentStatus::Ongoing => EnrollmentState::Ongoing {
                grace_days: row.grace_period_days_used,
            },
            EnrollmentStatus::Suspended => EnrollmentState::Suspended {
                grace_days: row.grace_period_days_used,
            },
            EnrollmentStatus::Completed => EnrollmentState::Completed,
            EnrollmentStatus::Cancelled => EnrollmentState::Cancelled {
                at: row.cancelled_at.ok_or_else(|| {
                    AppError::internal(format!(
                        "Cancelled enrollment '{}' has no cancelled_at",
                        row.id
                    ))
                })?,
                by: row.cancelled_by.unwrap_or_default(),
            },
        };

        Ok(Enrollment {
            id: row.id,
            property_id: row.property_id,
            property_unit_id: row.property_unit_id,
            agent_id: row.agent_id,
            client_id: row.client_id,
            partner_id: row.partner_id,
            payment_type,
            selected_payment_plan_id: row.selected_payment_plan_id,
            selected_unit: row.selected_unit,
            total_amount: row.total_amount,
            amount_paid: row.amount_paid,
            state,
            enrollment_date: row.enrollment_date,
            suspended_at: row.suspended_at,
            resumed_at: row.resumed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
