// Property catalog snapshot as seen by the billing engine.
//
// Properties are owned by the catalog service; this core only reads
// pricing, payment plans and the payment cycle, and flips a unit to SOLD
// when an enrollment claims it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sales status of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyStatus {
    /// Selling at prelaunch prices
    PreLaunch,
    Available,
    SoldOut,
    Archived,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreLaunch => "PRE_LAUNCH",
            Self::Available => "AVAILABLE",
            Self::SoldOut => "SOLD_OUT",
            Self::Archived => "ARCHIVED",
        }
    }
}

impl std::fmt::Display for PropertyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for PropertyStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "PRE_LAUNCH" => Ok(Self::PreLaunch),
            "AVAILABLE" => Ok(Self::Available),
            "SOLD_OUT" => Ok(Self::SoldOut),
            "ARCHIVED" => Ok(Self::Archived),
            _ => Err(format!("Invalid property status: {}", value)),
        }
    }
}

/// Price of one unit size (e.g. "500sqm")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPricing {
    pub unit_label: String,
    pub regular_price: Decimal,
    /// Falls back to the regular price when the catalog has none
    pub prelaunch_price: Option<Decimal>,
}

impl UnitPricing {
    pub fn new(unit_label: impl Into<String>, regular_price: Decimal) -> Self {
        Self {
            unit_label: unit_label.into(),
            regular_price,
            prelaunch_price: None,
        }
    }

    pub fn with_prelaunch_price(mut self, price: Decimal) -> Self {
        self.prelaunch_price = Some(price);
        self
    }
}

/// Installment offering attached to a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPlan {
    pub id: String,
    pub duration_months: u32,
    /// Percentage, e.g. 10 for 10%
    pub interest_rate: Decimal,
}

/// Sales discount configured on the property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesDiscount {
    /// Percentage, e.g. 10 for 10%
    pub percentage: Decimal,
    pub is_active: bool,
}

/// Read-only property snapshot used for pricing and scheduling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub name: String,
    pub status: PropertyStatus,
    pub payment_cycle_months: u32,
    pub unit_pricing: Vec<UnitPricing>,
    pub payment_plans: Vec<PaymentPlan>,
    pub sales_discount: Option<SalesDiscount>,
}

impl Property {
    /// Archived and sold-out properties take no new enrollments
    pub fn accepts_enrollments(&self) -> bool {
        !matches!(
            self.status,
            PropertyStatus::Archived | PropertyStatus::SoldOut
        )
    }

    pub fn is_prelaunch(&self) -> bool {
        self.status == PropertyStatus::PreLaunch
    }

    pub fn find_unit_pricing(&self, unit_label: &str) -> Option<&UnitPricing> {
        self.unit_pricing
            .iter()
            .find(|pricing| pricing.unit_label == unit_label)
    }

    pub fn find_payment_plan(&self, plan_id: &str) -> Option<&PaymentPlan> {
        self.payment_plans.iter().find(|plan| plan.id == plan_id)
    }

    /// Discount percentage if a sales discount is currently running
    pub fn active_discount_percentage(&self) -> Option<Decimal> {
        self.sales_discount
            .as_ref()
            .filter(|discount| discount.is_active && discount.percentage > Decimal::ZERO)
            .map(|discount| discount.percentage)
    }
}

/// Inventory status of a single plot/unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Available,
    Reserved,
    Sold,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Reserved => "RESERVED",
            Self::Sold => "SOLD",
        }
    }
}

impl TryFrom<String> for UnitStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "AVAILABLE" => Ok(Self::Available),
            "RESERVED" => Ok(Self::Reserved),
            "SOLD" => Ok(Self::Sold),
            _ => Err(format!("Invalid unit status: {}", value)),
        }
    }
}

/// A concrete unit in a property's inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyUnit {
    pub id: String,
    pub property_id: String,
    pub label: String,
    /// Pricing label this unit is sold under, e.g. "500sqm"
    pub unit_type: String,
    pub status: UnitStatus,
}
