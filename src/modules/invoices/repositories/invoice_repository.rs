// Invoice persistence.
//
// Reads go through the `InvoiceRepository` port. Writes that must share a
// transaction with enrollment changes (creation, cancellation, the
// grace-period sweep) are exposed as `*_tx` helpers taking the caller's
// transaction, mirroring how the enrollment repository composes them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{MySql, MySqlPool, Transaction};

use crate::core::{AppError, Result};
use crate::modules::invoices::models::{Invoice, InvoiceStatus};

/// Invoice port
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn find_by_id(&self, invoice_id: &str) -> Result<Option<Invoice>>;

    /// All invoices of an enrollment ordered by installment number
    async fn find_by_enrollment(&self, enrollment_id: &str) -> Result<Vec<Invoice>>;

    /// PENDING invoices whose due date is strictly before `now`
    async fn find_past_due_pending(&self, now: DateTime<Utc>) -> Result<Vec<Invoice>>;

    /// PENDING invoices due within `[from, until]`
    async fn find_pending_due_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Invoice>>;

    /// Settle an invoice as PAID and credit its enrollment.
    ///
    /// Only a PENDING or OVERDUE invoice can be settled; the check and the
    /// write happen in one transaction.
    async fn settle(
        &self,
        invoice_id: &str,
        payment_reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Invoice>;
}

/// MySQL-backed invoice repository
pub struct MySqlInvoiceRepository {
    pool: MySqlPool,
}

impl MySqlInvoiceRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvoiceRepository for MySqlInvoiceRepository {
    async fn find_by_id(&self, invoice_id: &str) -> Result<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT
                id, enrollment_id, installment_number, due_date, amount, amount_paid,
                status, overdue_date, paid_at, payment_reference, created_at, updated_at
            FROM invoices
            WHERE id = ?
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch invoice: {}", e)))?;

        row.map(Invoice::try_from).transpose()
    }

    async fn find_by_enrollment(&self, enrollment_id: &str) -> Result<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT
                id, enrollment_id, installment_number, due_date, amount, amount_paid,
                status, overdue_date, paid_at, payment_reference, created_at, updated_at
            FROM invoices
            WHERE enrollment_id = ?
            ORDER BY installment_number ASC
            "#,
        )
        .bind(enrollment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch invoices: {}", e)))?;

        rows.into_iter().map(Invoice::try_from).collect()
    }

    async fn find_past_due_pending(&self, now: DateTime<Utc>) -> Result<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT
                id, enrollment_id, installment_number, due_date, amount, amount_paid,
                status, overdue_date, paid_at, payment_reference, created_at, updated_at
            FROM invoices
            WHERE status = 'PENDING' AND due_date < ?
            ORDER BY enrollment_id, installment_number
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch past-due invoices: {}", e)))?;

        rows.into_iter().map(Invoice::try_from).collect()
    }

    async fn find_pending_due_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT
                id, enrollment_id, installment_number, due_date, amount, amount_paid,
                status, overdue_date, paid_at, payment_reference, created_at, updated_at
            FROM invoices
            WHERE status = 'PENDING' AND due_date >= ? AND due_date <= ?
            ORDER BY due_date, enrollment_id
            "#,
        )
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch upcoming invoices: {}", e)))?;

        rows.into_iter().map(Invoice::try_from).collect()
    }

    async fn settle(
        &self,
        invoice_id: &str,
        payment_reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Invoice> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT
                id, enrollment_id, installment_number, due_date, amount, amount_paid,
                status, overdue_date, paid_at, payment_reference, created_at, updated_at
            FROM invoices
            WHERE id = ?
            FOR UPDATE
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to lock invoice: {}", e)))?;

        let mut invoice = row
            .map(Invoice::try_from)
            .transpose()?
            .ok_or_else(|| AppError::not_found(format!("Invoice '{}' not found", invoice_id)))?;

        invoice.mark_paid(payment_reference.to_string(), now)?;

        let rows_affected = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'PAID', amount_paid = ?, paid_at = ?, payment_reference = ?, updated_at = ?
            WHERE id = ? AND status IN ('PENDING', 'OVERDUE')
            "#,
        )
        .bind(invoice.amount_paid)
        .bind(invoice.paid_at)
        .bind(&invoice.payment_reference)
        .bind(now)
        .bind(&invoice.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to settle invoice: {}", e)))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::bad_request(format!(
                "Invoice '{}' is no longer payable",
                invoice_id
            )));
        }

        sqlx::query(
            r#"
            UPDATE enrollments
            SET amount_paid = amount_paid + ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(invoice.amount)
        .bind(now)
        .bind(&invoice.enrollment_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to credit enrollment: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to commit transaction: {}", e)))?;

        Ok(invoice)
    }
}

/// Insert a freshly scheduled batch of invoices
pub async fn insert_invoices_tx(
    tx: &mut Transaction<'_, MySql>,
    invoices: &[Invoice],
) -> Result<()> {
    for invoice in invoices {
        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, enrollment_id, installment_number, due_date, amount, amount_paid,
                status, overdue_date, paid_at, payment_reference, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.enrollment_id)
        .bind(invoice.installment_number)
        .bind(invoice.due_date)
        .bind(invoice.amount)
        .bind(invoice.amount_paid)
        .bind(invoice.status.as_str())
        .bind(invoice.overdue_date)
        .bind(invoice.paid_at)
        .bind(&invoice.payment_reference)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to insert invoice: {}", e)))?;
    }

    Ok(())
}

/// Cancel every PENDING/OVERDUE invoice of an enrollment.
///
/// Returns the ids that were cancelled so dependent commissions can be
/// cleaned up in the same transaction.
pub async fn cancel_unpaid_invoices_tx(
    tx: &mut Transaction<'_, MySql>,
    enrollment_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT id
        FROM invoices
        WHERE enrollment_id = ? AND status IN ('PENDING', 'OVERDUE')
        FOR UPDATE
        "#,
    )
    .bind(enrollment_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| AppError::Internal(format!("Failed to select unpaid invoices: {}", e)))?;

    if ids.is_empty() {
        return Ok(ids);
    }

    sqlx::query(
        r#"
        UPDATE invoices
        SET status = 'CANCELLED', updated_at = ?
        WHERE enrollment_id = ? AND status IN ('PENDING', 'OVERDUE')
        "#,
    )
    .bind(now)
    .bind(enrollment_id)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::Internal(format!("Failed to cancel invoices: {}", e)))?;

    Ok(ids)
}

/// PENDING -> OVERDUE for one invoice, keeping an existing overdue date.
///
/// Fails if the invoice left PENDING since it was read (e.g. settled
/// concurrently), which rolls back the enclosing enrollment update.
pub async fn mark_overdue_tx(
    tx: &mut Transaction<'_, MySql>,
    invoice_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE invoices
        SET status = 'OVERDUE', overdue_date = COALESCE(overdue_date, ?), updated_at = ?
        WHERE id = ? AND status = 'PENDING'
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(invoice_id)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::Internal(format!("Failed to mark invoice overdue: {}", e)))?
    .rows_affected();

    if rows_affected == 0 {
        return Err(AppError::internal(format!(
            "Invoice '{}' changed status during the grace-period sweep",
            invoice_id
        )));
    }

    Ok(())
}

// Helper structs for database mapping

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: String,
    enrollment_id: String,
    installment_number: u32,
    due_date: DateTime<Utc>,
    amount: Decimal,
    amount_paid: Decimal,
    status: String,
    overdue_date: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = AppError;

    fn try_from(row: InvoiceRow) -> Result<Self> {
        let status = InvoiceStatus::try_from(row.status)
            .map_err(|e| AppError::Internal(format!("Invalid invoice in database: {}", e)))?;

        Ok(Invoice {
            id: row.id,
            enrollment_id: row.enrollment_id,
            installment_number: row.installment_number,
            due_date: row.due_date,
            amount: row.amount,
            amount_paid: row.amount_paid,
            status,
            overdue_date: row.overdue_date,
            paid_at: row.paid_at,
            payment_reference: row.payment_reference,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
