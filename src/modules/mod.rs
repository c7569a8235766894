pub mod commissions;
pub mod enrollments;
pub mod health;
pub mod invoices;
pub mod notifications;
pub mod parties;
pub mod payment_links;
pub mod properties;
