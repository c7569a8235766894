pub mod property_catalog;

pub use property_catalog::{mark_unit_sold_tx, MySqlPropertyCatalog, PropertyCatalog};
