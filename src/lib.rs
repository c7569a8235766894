//! Estate enrollment billing engine
//!
//! Installment pricing and scheduling, the enrollment lifecycle, the
//! recurring grace-period sweep and sequential payment links.

pub mod config;
pub mod core;
pub mod modules;

// Re-export commonly used types
pub use modules::enrollments;
pub use modules::invoices;
pub use modules::payment_links;
