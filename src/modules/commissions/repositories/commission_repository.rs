use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{MySql, MySqlPool, QueryBuilder, Transaction};

use crate::core::{AppError, Result};
use crate::modules::commissions::models::{Commission, CommissionStatus};

/// Read port over the commission engine's records
#[async_trait]
pub trait CommissionRepository: Send + Sync {
    async fn find_by_enrollment(&self, enrollment_id: &str) -> Result<Vec<Commission>>;
}

/// MySQL-backed commission reads
pub struct MySqlCommissionRepository {
    pool: MySqlPool,
}

impl MySqlCommissionRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommissionRepository for MySqlCommissionRepository {
    async fn find_by_enrollment(&self, enrollment_id: &str) -> Result<Vec<Commission>> {
        let rows = sqlx::query_as::<_, CommissionRow>(
            r#"
            SELECT id, enrollment_id, invoice_id, beneficiary_id, amount, status, created_at
            FROM commissions
            WHERE enrollment_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(enrollment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch commissions: {}", e)))?;

        rows.into_iter().map(Commission::try_from).collect()
    }
}

/// Delete PENDING commissions tied to the given invoices, inside the
/// cancellation transaction. Paid commissions are left untouched.
///
/// Returns the number of rows deleted.
pub async fn delete_pending_for_invoices_tx(
    tx: &mut Transaction<'_, MySql>,
    invoice_ids: &[String],
) -> Result<u64> {
    if invoice_ids.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<MySql>::new(
        "DELETE FROM commissions WHERE status = 'PENDING' AND invoice_id IN (",
    );
    let mut separated = builder.separated(", ");
    for id in invoice_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let deleted = builder
        .build()
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to delete pending commissions: {}", e)))?
        .rows_affected();

    Ok(deleted)
}

// Helper structs for database mapping

#[derive(Debug, sqlx::FromRow)]
struct CommissionRow {
    id: String,
    enrollment_id: String,
    invoice_id: Option<String>,
    beneficiary_id: String,
    amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<CommissionRow> for Commission {
    type Error = AppError;

    fn try_from(row: CommissionRow) -> Result<Self> {
        let status = CommissionStatus::try_from(row.status)
            .map_err(|e| AppError::Internal(format!("Invalid commission in database: {}", e)))?;

        Ok(Commission {
            id: row.id,
            enrollment_id: row.enrollment_id,
            invoice_id: row.invoice_id,
            beneficiary_id: row.beneficiary_id,
            amount: row.amount,
            status,
            created_at: row.created_at,
        })
    }
}
