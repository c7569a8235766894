use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::core::{AppError, Currency, Result};
use crate::modules::invoices::models::Invoice;

/// Length of one payment-cycle month when spacing due dates
pub const DAYS_PER_CYCLE_MONTH: i64 = 30;

/// Expands a contract total into dated installment invoices
pub struct InvoiceScheduler {
    currency: Currency,
}

impl InvoiceScheduler {
    pub fn new(currency: Currency) -> Self {
        Self { currency }
    }

    /// Build `count` PENDING invoices for an enrollment.
    ///
    /// Installment `i` (0-based) is due `i * payment_cycle_months * 30` days
    /// after the enrollment date. Amounts are an even split rounded to the
    /// currency scale; the final installment absorbs the remainder so the
    /// invoices always sum to `total_amount`.
    pub fn schedule(
        &self,
        enrollment_id: &str,
        total_amount: Decimal,
        count: u32,
        enrollment_date: DateTime<Utc>,
        payment_cycle_months: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invoice>> {
        if payment_cycle_months == 0 {
            return Err(AppError::bad_request(
                "Payment cycle must be at least one month",
            ));
        }

        let amounts = self.split_evenly(total_amount, count)?;
        let cycle = Duration::days(i64::from(payment_cycle_months) * DAYS_PER_CYCLE_MONTH);

        let invoices = amounts
            .into_iter()
            .enumerate()
            .map(|(i, amount)| {
                let due_date = enrollment_date + cycle * i as i32;
                Invoice::new(enrollment_id.to_string(), i as u32 + 1, due_date, amount, now)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            enrollment_id = enrollment_id,
            installments = invoices.len(),
            total_amount = %total_amount,
            "Scheduled installment invoices"
        );

        Ok(invoices)
    }

    /// Equal amounts with the last one absorbing the rounding difference
    pub fn split_evenly(&self, total: Decimal, count: u32) -> Result<Vec<Decimal>> {
        if count == 0 {
            return Err(AppError::bad_request("Installment count cannot be zero"));
        }

        let total = self.currency.round(total);
        let base_amount = self.currency.round(total / Decimal::from(count));
        let mut amounts = Vec::with_capacity(count as usize);
        let mut distributed = Decimal::ZERO;

        for i in 0..count {
            let amount = if i == count - 1 {
                total - distributed
            } else {
                base_amount
            };

            if amount <= Decimal::ZERO {
                return Err(AppError::bad_request(
                    "Calculated installment amount must be positive",
                ));
            }

            amounts.push(amount);
            distributed += amount;
        }

        Ok(amounts)
    }
}
