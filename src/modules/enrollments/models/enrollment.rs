// An enrollment is a client's contract to buy a property unit under a
// chosen payment arrangement. Lifecycle rules live in `EnrollmentState`;
// this type carries the contract terms and audit stamps around it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enrollment_state::{EnrollmentState, EnrollmentStatus};
use crate::core::{Actor, ActorRole, Result};

/// How the contract is paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    /// Payment plan with interest
    Installment,
    /// Interest-free, split into at most 3 payments
    Outright,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installment => "INSTALLMENT",
            Self::Outright => "OUTRIGHT",
        }
    }
}

impl TryFrom<String> for PaymentType {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "INSTALLMENT" => Ok(Self::Installment),
            "OUTRIGHT" => Ok(Self::Outright),
            _ => Err(format!("Invalid payment type: {}", value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: String,
    pub property_id: String,
    pub property_unit_id: Option<String>,
    pub agent_id: String,
    pub client_id: Option<String>,
    /// Derived from the client's referrer, never user supplied
    pub partner_id: Option<String>,
    pub payment_type: PaymentType,
    pub selected_payment_plan_id: Option<String>,
    pub selected_unit: String,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub state: EnrollmentState,
    pub enrollment_date: DateTime<Utc>,
    pub suspended_at: Option<DateTime<Utc>>,
    pub resumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contract terms needed to open an enrollment
#[derive(Debug, Clone)]
pub struct EnrollmentTerms {
    pub property_id: String,
    pub property_unit_id: Option<String>,
    pub agent_id: String,
    pub client_id: Option<String>,
    pub partner_id: Option<String>,
    pub payment_type: PaymentType,
    pub selected_payment_plan_id: Option<String>,
    pub selected_unit: String,
    pub total_amount: Decimal,
    pub enrollment_date: DateTime<Utc>,
}

impl Enrollment {
    /// Open a new ONGOING enrollment
    pub fn open(terms: EnrollmentTerms, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            property_id: terms.property_id,
            property_unit_id: terms.property_unit_id,
            agent_id: terms.agent_id,
            client_id: terms.client_id,
            partner_id: terms.partner_id,
            payment_type: terms.payment_type,
            selected_payment_plan_id: terms.selected_payment_plan_id,
            selected_unit: terms.selected_unit,
            total_amount: terms.total_amount,
            amount_paid: Decimal::ZERO,
            state: EnrollmentState::new(),
            enrollment_date: terms.enrollment_date,
            suspended_at: None,
            resumed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> EnrollmentStatus {
        self.state.status()
    }

    pub fn grace_period_days_used(&self) -> u32 {
        self.state.grace_days()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status() == EnrollmentStatus::Cancelled
    }

    pub fn outstanding_amount(&self) -> Decimal {
        (self.total_amount - self.amount_paid).max(Decimal::ZERO)
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            EnrollmentState::Cancelled { at, .. } => Some(*at),
            _ => None,
        }
    }

    pub fn cancelled_by(&self) -> Option<&str> {
        match &self.state {
            EnrollmentState::Cancelled { by, .. } => Some(by.as_str()),
            _ => None,
        }
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.state = self.state.resume()?;
        self.resumed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, actor_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.state = self.state.cancel(now, actor_id)?;
        self.updated_at = now;
        Ok(())
    }

    /// Whether the actor may read this enrollment's details
    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        match actor.role {
            ActorRole::Admin => true,
            ActorRole::Agent => self.agent_id == actor.id,
            ActorRole::Client => self.client_id.as_deref() == Some(actor.id.as_str()),
        }
    }
}
