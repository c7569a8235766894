use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySql, MySqlPool, Transaction};

use crate::core::{AppError, Result};
use crate::modules::payment_links::models::PaymentLink;

/// What must still hold when a link is written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkPreconditions {
    /// Client the issuer saw on the enrollment; `None` for an anonymous link
    pub client_id: Option<String>,
    /// Installment of the same enrollment that must already be PAID
    pub required_paid_installment: Option<u32>,
}

/// Payment link port
#[async_trait]
pub trait PaymentLinkRepository: Send + Sync {
    /// Persist a new link.
    ///
    /// Within the insert's transaction the enrollment must not be cancelled
    /// and must still carry `preconditions.client_id`, the target invoice
    /// must be PENDING/OVERDUE and the required installment must be PAID.
    async fn create(&self, link: &PaymentLink, preconditions: &LinkPreconditions) -> Result<()>;

    async fn find_by_token(&self, token: &str) -> Result<Option<PaymentLink>>;
}

/// MySQL-backed payment link repository
pub struct MySqlPaymentLinkRepository {
    pool: MySqlPool,
}

impl MySqlPaymentLinkRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentLinkRepository for MySqlPaymentLinkRepository {
    async fn create(&self, link: &PaymentLink, preconditions: &LinkPreconditions) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        // Enrollment row first: link-client locks it before touching links
        let enrollment: Option<(Option<String>, String)> = sqlx::query_as(
            r#"
            SELECT client_id, status
            FROM enrollments
            WHERE id = ?
            FOR UPDATE
            "#,
        )
        .bind(&link.enrollment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to lock enrollment: {}", e)))?;

        let (client_id, status) = enrollment.ok_or_else(|| {
            AppError::not_found(format!("Enrollment '{}' not found", link.enrollment_id))
        })?;

        if status == "CANCELLED" {
            return Err(AppError::bad_request(
                "Cannot generate a payment link for a cancelled enrollment",
            ));
        }

        if client_id != preconditions.client_id {
            return Err(AppError::bad_request(
                "Enrollment client changed while the link was being issued",
            ));
        }

        let target_status: Option<String> = sqlx::query_scalar(
            r#"
            SELECT status
            FROM invoices
            WHERE id = ? AND enrollment_id = ?
            FOR UPDATE
            "#,
        )
        .bind(&link.invoice_id)
        .bind(&link.enrollment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to lock invoice: {}", e)))?;

        let target_status = target_status.ok_or_else(|| {
            AppError::not_found(format!("Invoice '{}' not found", link.invoice_id))
        })?;

        if !matches!(target_status.as_str(), "PENDING" | "OVERDUE") {
            return Err(AppError::bad_request("Invoice is no longer awaiting payment"));
        }

        if let Some(installment_number) = preconditions.required_paid_installment {
            let previous_status: Option<String> = sqlx::query_scalar(
                r#"
                SELECT status
                FROM invoices
                WHERE enrollment_id = ? AND installment_number = ?
                FOR UPDATE
                "#,
            )
            .bind(&link.enrollment_id)
            .bind(installment_number)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to lock invoice: {}", e)))?;

            if previous_status.as_deref() != Some("PAID") {
                return Err(AppError::bad_request("Previous invoices must be paid first"));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO payment_links (
                id, enrollment_id, invoice_id, token, expires_at, is_active,
                first_name, last_name, created_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&link.id)
        .bind(&link.enrollment_id)
        .bind(&link.invoice_id)
        .bind(&link.token)
        .bind(link.expires_at)
        .bind(link.is_active)
        .bind(&link.first_name)
        .bind(&link.last_name)
        .bind(&link.created_by)
        .bind(link.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create payment link: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<PaymentLink>> {
        let row = sqlx::query_as::<_, PaymentLinkRow>(
            r#"
            SELECT
                id, enrollment_id, invoice_id, token, expires_at, is_active,
                first_name, last_name, created_by, created_at
            FROM payment_links
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch payment link: {}", e)))?;

        Ok(row.map(PaymentLink::from))
    }
}

/// Deactivate every active link of an enrollment inside the caller's
/// transaction. Returns the number of links switched off.
pub async fn deactivate_for_enrollment_tx(
    tx: &mut Transaction<'_, MySql>,
    enrollment_id: &str,
) -> Result<u64> {
    let deactivated = sqlx::query(
        r#"
        UPDATE payment_links
        SET is_active = FALSE
        WHERE enrollment_id = ? AND is_active = TRUE
        "#,
    )
    .bind(enrollment_id)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::Internal(format!("Failed to deactivate payment links: {}", e)))?
    .rows_affected();

    Ok(deactivated)
}

// Helper structs for database mapping

#[derive(Debug, sqlx::FromRow)]
struct PaymentLinkRow {
    id: String,
    enrollment_id: String,
    invoice_id: String,
    token: String,
    expires_at: DateTime<Utc>,
    is_active: bool,
    first_name: String,
    last_name: String,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl From<PaymentLinkRow> for PaymentLink {
    fn from(row: PaymentLinkRow) -> Self {
        PaymentLink {
            id: row.id,
            enrollment_id: row.enrollment_id,
            invoice_id: row.invoice_id,
            token: row.token,
            expires_at: row.expires_at,
            is_active: row.is_active,
            first_name: row.first_name,
            last_name: row.last_name,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}
