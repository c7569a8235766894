// Properties module (read-only catalog port)

pub mod models;
pub mod repositories;

pub use models::{PaymentPlan, Property, PropertyStatus, PropertyUnit, UnitPricing, UnitStatus};
pub use repositories::PropertyCatalog;
