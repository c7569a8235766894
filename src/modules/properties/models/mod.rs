mod property;

pub use property::{
    PaymentPlan, Property, PropertyStatus, PropertyUnit, SalesDiscount, UnitPricing, UnitStatus,
};
