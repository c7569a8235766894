use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use crate::core::{Actor, AppError, Clock, Result};
use crate::modules::enrollments::repositories::EnrollmentRepository;
use crate::modules::invoices::models::{Invoice, InvoiceStatus};
use crate::modules::invoices::repositories::InvoiceRepository;
use crate::modules::parties::repositories::PartyDirectory;
use crate::modules::payment_links::models::{
    GeneratePaymentLinkRequest, PaymentLink, PaymentLinkResponse,
};
use crate::modules::payment_links::repositories::{LinkPreconditions, PaymentLinkRepository};

/// Issuance settings from configuration
#[derive(Debug, Clone)]
pub struct PaymentLinkSettings {
    pub ttl: Duration,
    pub base_url: String,
}

impl PaymentLinkSettings {
    pub fn payment_url(&self, token: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), token)
    }
}

/// A usable link together with the invoice it settles
#[derive(Debug, Clone)]
pub struct ResolvedPaymentLink {
    pub link: PaymentLink,
    pub invoice: Invoice,
}

/// Issues sequential, expiring payment links and resolves them by token
pub struct PaymentLinkIssuer {
    enrollments: Arc<dyn EnrollmentRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    parties: Arc<dyn PartyDirectory>,
    links: Arc<dyn PaymentLinkRepository>,
    clock: Arc<dyn Clock>,
    settings: PaymentLinkSettings,
}

impl PaymentLinkIssuer {
    pub fn new(
        enrollments: Arc<dyn EnrollmentRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        parties: Arc<dyn PartyDirectory>,
        links: Arc<dyn PaymentLinkRepository>,
        clock: Arc<dyn Clock>,
        settings: PaymentLinkSettings,
    ) -> Self {
        Self {
            enrollments,
            invoices,
            parties,
            links,
            clock,
            settings,
        }
    }

    /// Issue a link for the requested invoice, or the earliest unpaid one.
    ///
    /// Installments must be settled in order: a link for installment `n > 1`
    /// requires installment `n - 1` to be PAID.
    pub async fn issue(
        &self,
        request: GeneratePaymentLinkRequest,
        actor: &Actor,
    ) -> Result<PaymentLinkResponse> {
        let enrollment = self
            .enrollments
            .find_by_id(&request.enrollment_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Enrollment '{}' not found", request.enrollment_id))
            })?;

        if enrollment.is_cancelled() {
            return Err(AppError::bad_request(
                "Cannot generate a payment link for a cancelled enrollment",
            ));
        }

        let invoices = self.invoices.find_by_enrollment(&enrollment.id).await?;
        let target = select_target_invoice(&invoices, request.invoice_id.as_deref())?;

        let required_paid_installment = if target.installment_number > 1 {
            let previous_number = target.installment_number - 1;
            let previous_paid = invoices.iter().any(|invoice| {
                invoice.installment_number == previous_number
                    && invoice.status == InvoiceStatus::Paid
            });
            if !previous_paid {
                return Err(AppError::bad_request("Previous invoices must be paid first"));
            }
            Some(previous_number)
        } else {
            None
        };

        let (first_name, last_name) = match enrollment.client_id.as_deref() {
            Some(client_id) => {
                let client = self.parties.find_client(client_id).await?.ok_or_else(|| {
                    AppError::not_found(format!("Client '{}' not found", client_id))
                })?;
                (
                    non_blank(request.first_name).unwrap_or(client.first_name),
                    non_blank(request.last_name).unwrap_or(client.last_name),
                )
            }
            None => match (non_blank(request.first_name), non_blank(request.last_name)) {
                (Some(first), Some(last)) => (first, last),
                _ => {
                    return Err(AppError::bad_request(
                        "First and last name are required when no client is linked",
                    ))
                }
            },
        };

        let now = self.clock.now();
        let link = PaymentLink::issue(
            enrollment.id.clone(),
            target.id.clone(),
            first_name,
            last_name,
            actor.id.clone(),
            self.settings.ttl,
            now,
        );

        let preconditions = LinkPreconditions {
            client_id: enrollment.client_id.clone(),
            required_paid_installment,
        };
        self.links.create(&link, &preconditions).await?;

        info!(
            enrollment_id = %link.enrollment_id,
            invoice_id = %link.invoice_id,
            installment = target.installment_number,
            created_by = %link.created_by,
            expires_at = %link.expires_at,
            "Payment link issued"
        );

        Ok(PaymentLinkResponse {
            payment_url: self.settings.payment_url(&link.token),
            token: link.token,
            expires_at: link.expires_at,
            enrollment_id: link.enrollment_id,
            invoice_id: link.invoice_id,
        })
    }

    /// Look up a link by token; only active, unexpired links for an unpaid
    /// invoice resolve
    pub async fn resolve(&self, token: &str) -> Result<ResolvedPaymentLink> {
        let link = self
            .links
            .find_by_token(token)
            .await?
            .ok_or_else(|| AppError::not_found("Payment link not found"))?;

        if !link.is_usable(self.clock.now()) {
            if !link.is_active {
                return Err(AppError::bad_request("Payment link is no longer active"));
            }
            warn!(enrollment_id = %link.enrollment_id, "Expired payment link used");
            return Err(AppError::bad_request("Payment link has expired"));
        }

        let invoice = self
            .invoices
            .find_by_id(&link.invoice_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Invoice '{}' not found", link.invoice_id))
            })?;

        if !invoice.status.is_unpaid() {
            return Err(AppError::bad_request("Invoice is no longer awaiting payment"));
        }

        Ok(ResolvedPaymentLink { link, invoice })
    }
}

fn select_target_invoice<'a>(
    invoices: &'a [Invoice],
    invoice_id: Option<&str>,
) -> Result<&'a Invoice> {
    match invoice_id {
        Some(invoice_id) => {
            let invoice = invoices
                .iter()
                .find(|invoice| invoice.id == invoice_id)
                .ok_or_else(|| {
                    AppError::not_found(format!(
                        "Invoice '{}' not found for enrollment",
                        invoice_id
                    ))
                })?;

            if !invoice.status.is_unpaid() {
                return Err(AppError::bad_request(format!(
                    "Invoice #{} is {} and cannot be paid",
                    invoice.installment_number, invoice.status
                )));
            }

            Ok(invoice)
        }
        None => invoices
            .iter()
            .filter(|invoice| invoice.status.is_unpaid())
            .min_by_key(|invoice| invoice.installment_number)
            .ok_or_else(|| AppError::bad_request("Enrollment has no unpaid invoice")),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
