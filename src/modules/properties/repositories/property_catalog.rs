// Read access to the property catalog plus the unit-inventory write that
// enrollment creation performs inside its own transaction.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{MySql, MySqlPool, Transaction};

use crate::core::{AppError, Result};
use crate::modules::properties::models::{
    PaymentPlan, Property, PropertyStatus, PropertyUnit, SalesDiscount, UnitPricing, UnitStatus,
};

/// Property catalog port
#[async_trait]
pub trait PropertyCatalog: Send + Sync {
    /// Load a property with its pricing table and payment plans
    async fn find_property(&self, property_id: &str) -> Result<Option<Property>>;

    /// Load a unit, scoped to its property
    async fn find_unit(&self, property_id: &str, unit_id: &str) -> Result<Option<PropertyUnit>>;
}

/// MySQL-backed property catalog
pub struct MySqlPropertyCatalog {
    pool: MySqlPool,
}

impl MySqlPropertyCatalog {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PropertyCatalog for MySqlPropertyCatalog {
    async fn find_property(&self, property_id: &str) -> Result<Option<Property>> {
        let row = sqlx::query_as::<_, PropertyRow>(
            r#"
            SELECT
                id, name, status, payment_cycle_months,
                sales_discount_percentage, sales_discount_active
            FROM properties
            WHERE id = ?
            "#,
        )
        .bind(property_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch property: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let pricing_rows = sqlx::query_as::<_, UnitPricingRow>(
            r#"
            SELECT unit_label, regular_price, prelaunch_price
            FROM property_unit_prices
            WHERE property_id = ?
            ORDER BY unit_label
            "#,
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch unit pricing: {}", e)))?;

        let plan_rows = sqlx::query_as::<_, PaymentPlanRow>(
            r#"
            SELECT id, duration_months, interest_rate
            FROM property_payment_plans
            WHERE property_id = ?
            ORDER BY duration_months
            "#,
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch payment plans: {}", e)))?;

        Ok(Some(row.into_property(pricing_rows, plan_rows)?))
    }

    async fn find_unit(&self, property_id: &str, unit_id: &str) -> Result<Option<PropertyUnit>> {
        let row = sqlx::query_as::<_, PropertyUnitRow>(
            r#"
            SELECT id, property_id, label, unit_type, status
            FROM property_units
            WHERE id = ? AND property_id = ?
            "#,
        )
        .bind(unit_id)
        .bind(property_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch property unit: {}", e)))?;

        row.map(PropertyUnit::try_from).transpose()
    }
}

/// Mark a unit SOLD within an enrollment-creation transaction.
///
/// Only an AVAILABLE unit is claimed; a unit sold by a concurrent
/// enrollment fails the whole transaction.
pub async fn mark_unit_sold_tx(tx: &mut Transaction<'_, MySql>, unit_id: &str) -> Result<()> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE property_units
        SET status = 'SOLD', updated_at = NOW()
        WHERE id = ? AND status = 'AVAILABLE'
        "#,
    )
    .bind(unit_id)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::Internal(format!("Failed to mark unit sold: {}", e)))?
    .rows_affected();

    if rows_affected == 0 {
        return Err(AppError::bad_request(format!(
            "Unit '{}' is no longer available",
            unit_id
        )));
    }

    Ok(())
}

// Helper structs for database mapping

#[derive(Debug, sqlx::FromRow)]
struct PropertyRow {
    id: String,
    name: String,
    status: String,
    payment_cycle_months: u32,
    sales_discount_percentage: Option<Decimal>,
    sales_discount_active: bool,
}

impl PropertyRow {
    fn into_property(
        self,
        pricing_rows: Vec<UnitPricingRow>,
        plan_rows: Vec<PaymentPlanRow>,
    ) -> Result<Property> {
        let status = PropertyStatus::try_from(self.status)
            .map_err(|e| AppError::Internal(format!("Invalid property in database: {}", e)))?;

        let sales_discount = self.sales_discount_percentage.map(|percentage| SalesDiscount {
            percentage,
            is_active: self.sales_discount_active,
        });

        Ok(Property {
            id: self.id,
            name: self.name,
            status,
            payment_cycle_months: self.payment_cycle_months,
            unit_pricing: pricing_rows
                .into_iter()
                .map(|row| UnitPricing {
                    unit_label: row.unit_label,
                    regular_price: row.regular_price,
                    prelaunch_price: row.prelaunch_price,
                })
                .collect(),
            payment_plans: plan_rows
                .into_iter()
                .map(|row| PaymentPlan {
                    id: row.id,
                    duration_months: row.duration_months,
                    interest_rate: row.interest_rate,
                })
                .collect(),
            sales_discount,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UnitPricingRow {
    unit_label: String,
    regular_price: Decimal,
    prelaunch_price: Option<Decimal>,
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentPlanRow {
    id: String,
    duration_months: u32,
    interest_rate: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct PropertyUnitRow {
    id: String,
    property_id: String,
    label: String,
    unit_type: String,
    status: String,
}

impl TryFrom<PropertyUnitRow> for PropertyUnit {
    type Error = AppError;

    fn try_from(row: PropertyUnitRow) -> Result<Self> {
        let status = UnitStatus::try_from(row.status)
            .map_err(|e| AppError::Internal(format!("Invalid unit in database: {}", e)))?;

        Ok(PropertyUnit {
            id: row.id,
            property_id: row.property_id,
            label: row.label,
            unit_type: row.unit_type,
            status,
        })
    }
}
