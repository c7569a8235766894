pub mod commission_repository;

pub use commission_repository::{
    delete_pending_for_invoices_tx, CommissionRepository, MySqlCommissionRepository,
};
