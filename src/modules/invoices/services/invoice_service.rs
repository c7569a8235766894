use std::sync::Arc;

use tracing::info;

use crate::core::{AppError, Clock, Result};
use crate::modules::invoices::models::Invoice;
use crate::modules::invoices::repositories::InvoiceRepository;

/// Entry point for the external settlement path
pub struct InvoiceService {
    invoices: Arc<dyn InvoiceRepository>,
    clock: Arc<dyn Clock>,
}

impl InvoiceService {
    pub fn new(invoices: Arc<dyn InvoiceRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { invoices, clock }
    }

    /// Mark a PENDING or OVERDUE invoice PAID and credit its enrollment.
    ///
    /// Loses cleanly against a concurrent settlement or cancellation: the
    /// write is conditional on the invoice still being unpaid.
    pub async fn settle_invoice(
        &self,
        invoice_id: &str,
        payment_reference: &str,
    ) -> Result<Invoice> {
        let payment_reference = payment_reference.trim();
        if payment_reference.is_empty() {
            return Err(AppError::bad_request("Payment reference is required"));
        }

        let invoice = self
            .invoices
            .settle(invoice_id, payment_reference, self.clock.now())
            .await?;

        info!(
            invoice_id = %invoice.id,
            enrollment_id = %invoice.enrollment_id,
            installment = invoice.installment_number,
            amount = %invoice.amount,
            payment_reference = payment_reference,
            "Invoice settled"
        );

        Ok(invoice)
    }
}
