use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::{Actor, AppError, Clock, Result};
use crate::modules::commissions::models::Commission;
use crate::modules::commissions::repositories::CommissionRepository;
use crate::modules::enrollments::models::{Enrollment, EnrollmentTerms, PaymentType};
use crate::modules::enrollments::repositories::{
    CancellationSummary, ClientLink, EnrollmentRepository,
};
use crate::modules::enrollments::services::pricing_calculator::{
    PricingCalculator, PricingQuote, PricingRequest,
};
use crate::modules::invoices::models::Invoice;
use crate::modules::invoices::repositories::InvoiceRepository;
use crate::modules::invoices::services::InvoiceScheduler;
use crate::modules::parties::models::Client;
use crate::modules::parties::repositories::{derive_partner_attribution, PartyDirectory};
use crate::modules::properties::models::UnitStatus;
use crate::modules::properties::repositories::PropertyCatalog;

/// Request to open an enrollment
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEnrollmentRequest {
    pub property_id: String,
    pub property_unit_id: Option<String>,
    pub agent_id: String,
    pub client_id: Option<String>,
    pub payment_type: PaymentType,
    pub selected_unit: String,
    pub selected_payment_plan_id: Option<String>,
    pub outright_installments: Option<u32>,
    /// Defaults to the time of creation
    pub enrollment_date: Option<DateTime<Utc>>,
}

/// A newly persisted enrollment with its schedule
#[derive(Debug, Clone, Serialize)]
pub struct CreatedEnrollment {
    pub enrollment: Enrollment,
    pub invoices: Vec<Invoice>,
    pub quote: PricingQuote,
}

/// Enrollment with everything needed to display it
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentDetail {
    pub enrollment: Enrollment,
    pub invoices: Vec<Invoice>,
    pub commissions: Vec<Commission>,
    pub outstanding_amount: Decimal,
}

/// Result of attaching a client to an enrollment
#[derive(Debug, Clone, Serialize)]
pub struct LinkedClient {
    pub enrollment: Enrollment,
    pub deactivated_links: u64,
}

/// Enrollment lifecycle operations
pub struct EnrollmentService {
    properties: Arc<dyn PropertyCatalog>,
    parties: Arc<dyn PartyDirectory>,
    enrollments: Arc<dyn EnrollmentRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    commissions: Arc<dyn CommissionRepository>,
    clock: Arc<dyn Clock>,
    pricing: PricingCalculator,
    scheduler: InvoiceScheduler,
}

impl EnrollmentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        properties: Arc<dyn PropertyCatalog>,
        parties: Arc<dyn PartyDirectory>,
        enrollments: Arc<dyn EnrollmentRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        commissions: Arc<dyn CommissionRepository>,
        clock: Arc<dyn Clock>,
        pricing: PricingCalculator,
        scheduler: InvoiceScheduler,
    ) -> Self {
        Self {
            properties,
            parties,
            enrollments,
            invoices,
            commissions,
            clock,
            pricing,
            scheduler,
        }
    }

    /// Price, schedule and persist a new enrollment.
    ///
    /// All validation happens before the single write transaction.
    pub async fn create(&self, request: CreateEnrollmentRequest) -> Result<CreatedEnrollment> {
        let property = self
            .properties
            .find_property(&request.property_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Property '{}' not found", request.property_id))
            })?;

        if !property.accepts_enrollments() {
            return Err(AppError::bad_request(format!(
                "Property is {} and not accepting enrollments",
                property.status
            )));
        }

        let agent = self
            .parties
            .find_agent(&request.agent_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Agent '{}' not found", request.agent_id)))?;

        if !agent.can_onboard_clients {
            return Err(AppError::forbidden(format!(
                "Agent '{}' is not allowed to onboard clients",
                agent.id
            )));
        }

        let partner_id = match request.client_id.as_deref() {
            Some(client_id) => {
                let client = self.eligible_client(client_id, &property.id).await?;
                derive_partner_attribution(self.parties.as_ref(), &client).await?
            }
            None => None,
        };

        if let Some(unit_id) = request.property_unit_id.as_deref() {
            let unit = self
                .properties
                .find_unit(&property.id, unit_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Unit '{}' not found", unit_id)))?;

            if unit.status != UnitStatus::Available {
                return Err(AppError::bad_request(format!(
                    "Unit '{}' is {} and cannot be sold",
                    unit.label,
                    unit.status.as_str()
                )));
            }

            if unit.unit_type != request.selected_unit {
                return Err(AppError::bad_request(format!(
                    "Unit '{}' is sold as {}, not {}",
                    unit.label, unit.unit_type, request.selected_unit
                )));
            }
        }

        let quote = self.pricing.calculate(
            &property,
            &PricingRequest {
                payment_type: request.payment_type,
                selected_unit: request.selected_unit.clone(),
                selected_payment_plan_id: request.selected_payment_plan_id.clone(),
                outright_installments: request.outright_installments,
            },
        )?;

        let now = self.clock.now();
        let enrollment = Enrollment::open(
            EnrollmentTerms {
                property_id: property.id.clone(),
                property_unit_id: request.property_unit_id,
                agent_id: agent.id,
                client_id: request.client_id,
                partner_id,
                payment_type: request.payment_type,
                selected_payment_plan_id: request.selected_payment_plan_id,
                selected_unit: request.selected_unit,
                total_amount: quote.total_amount,
                enrollment_date: request.enrollment_date.unwrap_or(now),
            },
            now,
        );

        let invoices = self.scheduler.schedule(
            &enrollment.id,
            quote.total_amount,
            quote.number_of_installments,
            enrollment.enrollment_date,
            property.payment_cycle_months,
            now,
        )?;

        self.enrollments
            .create_with_invoices(&enrollment, &invoices)
            .await?;

        info!(
            enrollment_id = %enrollment.id,
            property_id = %enrollment.property_id,
            agent_id = %enrollment.agent_id,
            payment_type = enrollment.payment_type.as_str(),
            total_amount = %enrollment.total_amount,
            installments = invoices.len(),
            "Enrollment created"
        );

        Ok(CreatedEnrollment {
            enrollment,
            invoices,
            quote,
        })
    }

    /// Enrollment detail, visible to admins, the owning agent and the client
    pub async fn get_detail(&self, enrollment_id: &str, actor: &Actor) -> Result<EnrollmentDetail> {
        let enrollment = self.find(enrollment_id).await?;

        if !enrollment.is_visible_to(actor) {
            return Err(AppError::forbidden(
                "You do not have access to this enrollment",
            ));
        }

        let invoices = self.invoices.find_by_enrollment(&enrollment.id).await?;
        let commissions = self.commissions.find_by_enrollment(&enrollment.id).await?;

        Ok(EnrollmentDetail {
            outstanding_amount: enrollment.outstanding_amount(),
            enrollment,
            invoices,
            commissions,
        })
    }

    /// Cancel an enrollment, its unpaid invoices and their pending commissions
    pub async fn cancel(&self, enrollment_id: &str, actor: &Actor) -> Result<CancellationSummary> {
        let mut enrollment = self.find(enrollment_id).await?;
        enrollment.cancel(&actor.id, self.clock.now())?;

        let summary = self.enrollments.cancel(&enrollment).await?;

        info!(
            enrollment_id = %enrollment.id,
            cancelled_by = %actor.id,
            cancelled_invoices = summary.cancelled_invoices,
            deleted_commissions = summary.deleted_commissions,
            "Enrollment cancelled"
        );

        Ok(summary)
    }

    /// Resume a suspended enrollment with its grace debt cleared.
    ///
    /// OVERDUE invoices stay OVERDUE.
    pub async fn resume(&self, enrollment_id: &str, actor: &Actor) -> Result<Enrollment> {
        let mut enrollment = self.find(enrollment_id).await?;
        enrollment.resume(self.clock.now())?;

        self.enrollments.resume(&enrollment).await?;

        info!(
            enrollment_id = %enrollment.id,
            resumed_by = %actor.id,
            "Enrollment resumed"
        );

        Ok(enrollment)
    }

    /// Attach a client to an enrollment created without one.
    ///
    /// Partner attribution is re-derived from the client and every active
    /// payment link of the enrollment is deactivated.
    pub async fn link_client(&self, enrollment_id: &str, client_id: &str) -> Result<LinkedClient> {
        let mut enrollment = self.find(enrollment_id).await?;

        if enrollment.is_cancelled() {
            return Err(AppError::bad_request(
                "Cannot link a client to a cancelled enrollment",
            ));
        }
        if enrollment.client_id.is_some() {
            return Err(AppError::bad_request("Enrollment already has a client"));
        }

        let client = self.eligible_client(client_id, &enrollment.property_id).await?;
        let partner_id = derive_partner_attribution(self.parties.as_ref(), &client).await?;
        let now = self.clock.now();

        let deactivated_links = self
            .enrollments
            .link_client(&ClientLink {
                enrollment_id: enrollment.id.clone(),
                property_id: enrollment.property_id.clone(),
                client_id: client.id.clone(),
                partner_id: partner_id.clone(),
                linked_at: now,
            })
            .await?;

        enrollment.client_id = Some(client.id);
        enrollment.partner_id = partner_id;
        enrollment.updated_at = now;

        info!(
            enrollment_id = %enrollment.id,
            client_id = client_id,
            deactivated_links = deactivated_links,
            "Client linked to enrollment"
        );

        Ok(LinkedClient {
            enrollment,
            deactivated_links,
        })
    }

    async fn find(&self, enrollment_id: &str) -> Result<Enrollment> {
        self.enrollments
            .find_by_id(enrollment_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Enrollment '{}' not found", enrollment_id)))
    }

    /// Client exists, finished onboarding and has no active enrollment for
    /// the property
    async fn eligible_client(&self, client_id: &str, property_id: &str) -> Result<Client> {
        let client = self
            .parties
            .find_client(client_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Client '{}' not found", client_id)))?;

        if !client.has_completed_onboarding {
            return Err(AppError::bad_request(
                "Client has not completed onboarding",
            ));
        }

        if self
            .enrollments
            .has_active_enrollment(&client.id, property_id)
            .await?
        {
            return Err(AppError::bad_request(
                "Client already has an active enrollment for this property",
            ));
        }

        Ok(client)
    }
}
