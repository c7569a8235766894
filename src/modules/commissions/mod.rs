// Commissions module (external engine; delete-on-cancel and read only)

pub mod models;
pub mod repositories;

pub use models::{Commission, CommissionStatus};
pub use repositories::CommissionRepository;
