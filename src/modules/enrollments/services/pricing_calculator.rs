use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::core::{AppError, Currency, Result};
use crate::modules::enrollments::models::PaymentType;
use crate::modules::properties::models::Property;

/// Largest number of payments an outright purchase may be split into
pub const MAX_OUTRIGHT_INSTALLMENTS: u32 = 3;

/// Pricing inputs taken from an enrollment request
#[derive(Debug, Clone)]
pub struct PricingRequest {
    pub payment_type: PaymentType,
    pub selected_unit: String,
    pub selected_payment_plan_id: Option<String>,
    pub outright_installments: Option<u32>,
}

/// Priced contract
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingQuote {
    pub base_price: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub number_of_installments: u32,
}

/// Derives contract total and installment count from property pricing
pub struct PricingCalculator {
    currency: Currency,
}

impl PricingCalculator {
    pub fn new(currency: Currency) -> Self {
        Self { currency }
    }

    pub fn calculate(&self, property: &Property, request: &PricingRequest) -> Result<PricingQuote> {
        let pricing = property
            .find_unit_pricing(&request.selected_unit)
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Unit pricing '{}' not found for property '{}'",
                    request.selected_unit, property.id
                ))
            })?;

        let list_price = if property.is_prelaunch() {
            pricing.prelaunch_price.unwrap_or(pricing.regular_price)
        } else {
            pricing.regular_price
        };
        self.currency
            .validate_amount(list_price)
            .map_err(AppError::BadRequest)?;

        let discount_amount = property
            .active_discount_percentage()
            .map(|percentage| self.currency.round(list_price * percentage / Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO);
        let base_price = list_price - discount_amount;

        let (total_amount, number_of_installments) = match request.payment_type {
            PaymentType::Installment => self.price_installment(property, request, base_price)?,
            PaymentType::Outright => self.price_outright(request, base_price)?,
        };

        debug!(
            property_id = property.id.as_str(),
            unit = request.selected_unit.as_str(),
            base_price = %base_price,
            total_amount = %total_amount,
            installments = number_of_installments,
            "Priced enrollment"
        );

        Ok(PricingQuote {
            base_price,
            discount_amount,
            total_amount,
            number_of_installments,
        })
    }

    fn price_installment(
        &self,
        property: &Property,
        request: &PricingRequest,
        base_price: Decimal,
    ) -> Result<(Decimal, u32)> {
        let plan_id = request.selected_payment_plan_id.as_deref().ok_or_else(|| {
            AppError::bad_request("A payment plan is required for installment payments")
        })?;

        let plan = property.find_payment_plan(plan_id).ok_or_else(|| {
            AppError::bad_request(format!(
                "Payment plan '{}' is not offered for property '{}'",
                plan_id, property.id
            ))
        })?;

        let cycle = property.payment_cycle_months;
        if cycle == 0 || plan.duration_months == 0 || plan.duration_months % cycle != 0 {
            return Err(AppError::bad_request(format!(
                "Plan duration of {} months is not a whole number of {}-month payment cycles",
                plan.duration_months, cycle
            )));
        }

        let installments = plan.duration_months / cycle;
        let multiplier = Decimal::ONE + plan.interest_rate / Decimal::ONE_HUNDRED;
        let total_amount = self.currency.round(base_price * multiplier);

        Ok((total_amount, installments))
    }

    fn price_outright(
        &self,
        request: &PricingRequest,
        base_price: Decimal,
    ) -> Result<(Decimal, u32)> {
        let installments = request.outright_installments.unwrap_or(1);
        if installments == 0 || installments > MAX_OUTRIGHT_INSTALLMENTS {
            return Err(AppError::bad_request(format!(
                "Outright payments can be split into 1 to {} installments, got {}",
                MAX_OUTRIGHT_INSTALLMENTS, installments
            )));
        }

        Ok((self.currency.round(base_price), installments))
    }
}
