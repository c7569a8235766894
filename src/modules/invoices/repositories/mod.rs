pub mod invoice_repository;

pub use invoice_repository::{
    cancel_unpaid_invoices_tx, insert_invoices_tx, mark_overdue_tx, InvoiceRepository,
    MySqlInvoiceRepository,
};
