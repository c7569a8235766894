// In-memory implementation of every persistence port.
//
// Mutating calls check their preconditions first and only then write, so a
// rejected call leaves the store untouched, the same way a rolled-back
// transaction would.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use estatepay::core::{AppError, Result};
use estatepay::modules::commissions::models::{Commission, CommissionStatus};
use estatepay::modules::commissions::repositories::CommissionRepository;
use estatepay::modules::enrollments::models::{Enrollment, EnrollmentState, EnrollmentStatus};
use estatepay::modules::enrollments::repositories::{
    CancellationSummary, ClientLink, EnrollmentRepository,
};
use estatepay::modules::invoices::models::{Invoice, InvoiceStatus};
use estatepay::modules::invoices::repositories::InvoiceRepository;
use estatepay::modules::invoices::services::GraceEvaluation;
use estatepay::modules::parties::models::{Agent, Client, Partner};
use estatepay::modules::parties::repositories::PartyDirectory;
use estatepay::modules::payment_links::models::PaymentLink;
use estatepay::modules::payment_links::repositories::{LinkPreconditions, PaymentLinkRepository};
use estatepay::modules::properties::models::{Property, PropertyUnit, UnitStatus};
use estatepay::modules::properties::repositories::PropertyCatalog;

#[derive(Default)]
struct State {
    properties: HashMap<String, Property>,
    units: HashMap<String, PropertyUnit>,
    agents: HashMap<String, Agent>,
    clients: HashMap<String, Client>,
    partners: HashMap<String, Partner>,
    enrollments: HashMap<String, Enrollment>,
    invoices: Vec<Invoice>,
    commissions: Vec<Commission>,
    links: Vec<PaymentLink>,
    failing_grace_updates: HashSet<String>,
    fail_next_create: bool,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn add_property(&self, property: Property) {
        self.state().properties.insert(property.id.clone(), property);
    }

    pub fn add_unit(&self, unit: PropertyUnit) {
        self.state().units.insert(unit.id.clone(), unit);
    }

    pub fn add_agent(&self, agent: Agent) {
        self.state().agents.insert(agent.id.clone(), agent);
    }

    pub fn add_client(&self, client: Client) {
        self.state().clients.insert(client.id.clone(), client);
    }

    pub fn add_partner(&self, partner: Partner) {
        self.state().partners.insert(partner.id.clone(), partner);
    }

    pub fn add_commission(&self, commission: Commission) {
        self.state().commissions.push(commission);
    }

    /// Seed an enrollment with its invoices, bypassing validation
    pub fn insert_enrollment(&self, enrollment: Enrollment, invoices: Vec<Invoice>) {
        let mut state = self.state();
        state.enrollments.insert(enrollment.id.clone(), enrollment);
        state.invoices.extend(invoices);
    }

    pub fn enrollment(&self, enrollment_id: &str) -> Option<Enrollment> {
        self.state().enrollments.get(enrollment_id).cloned()
    }

    pub fn enrollment_count(&self) -> usize {
        self.state().enrollments.len()
    }

    pub fn invoices_of(&self, enrollment_id: &str) -> Vec<Invoice> {
        let mut invoices: Vec<Invoice> = self
            .state()
            .invoices
            .iter()
            .filter(|invoice| invoice.enrollment_id == enrollment_id)
            .cloned()
            .collect();
        invoices.sort_by_key(|invoice| invoice.installment_number);
        invoices
    }

    pub fn invoice_count(&self) -> usize {
        self.state().invoices.len()
    }

    pub fn commissions_of(&self, enrollment_id: &str) -> Vec<Commission> {
        self.state()
            .commissions
            .iter()
            .filter(|commission| commission.enrollment_id == enrollment_id)
            .cloned()
            .collect()
    }

    pub fn unit(&self, unit_id: &str) -> Option<PropertyUnit> {
        self.state().units.get(unit_id).cloned()
    }

    pub fn links_of(&self, enrollment_id: &str) -> Vec<PaymentLink> {
        self.state()
            .links
            .iter()
            .filter(|link| link.enrollment_id == enrollment_id)
            .cloned()
            .collect()
    }

    /// Mutate a stored invoice in place
    pub fn update_invoice(&self, invoice_id: &str, update: impl FnOnce(&mut Invoice)) {
        let mut state = self.state();
        if let Some(invoice) = state.invoices.iter_mut().find(|invoice| invoice.id == invoice_id) {
            update(invoice);
        }
    }

    /// Make every grace-period update for this enrollment fail
    pub fn fail_grace_updates_for(&self, enrollment_id: &str) {
        self.state()
            .failing_grace_updates
            .insert(enrollment_id.to_string());
    }

    /// Make the next enrollment creation fail after validation
    pub fn fail_next_create(&self) {
        self.state().fail_next_create = true;
    }
}

fn has_active(state: &State, client_id: &str, property_id: &str, excluding: Option<&str>) -> bool {
    state.enrollments.values().any(|enrollment| {
        enrollment.client_id.as_deref() == Some(client_id)
            && enrollment.property_id == property_id
            && !enrollment.is_cancelled()
            && Some(enrollment.id.as_str()) != excluding
    })
}

#[async_trait]
impl PropertyCatalog for InMemoryStore {
    async fn find_property(&self, property_id: &str) -> Result<Option<Property>> {
        Ok(self.state().properties.get(property_id).cloned())
    }

    async fn find_unit(&self, property_id: &str, unit_id: &str) -> Result<Option<PropertyUnit>> {
        Ok(self
            .state()
            .units
            .get(unit_id)
            .filter(|unit| unit.property_id == property_id)
            .cloned())
    }
}

#[async_trait]
impl PartyDirectory for InMemoryStore {
    async fn find_agent(&self, agent_id: &str) -> Result<Option<Agent>> {
        Ok(self.state().agents.get(agent_id).cloned())
    }

    async fn find_client(&self, client_id: &str) -> Result<Option<Client>> {
        Ok(self.state().clients.get(client_id).cloned())
    }

    async fn find_partner(&self, partner_id: &str) -> Result<Option<Partner>> {
        Ok(self.state().partners.get(partner_id).cloned())
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryStore {
    async fn create_with_invoices(
        &self,
        enrollment: &Enrollment,
        invoices: &[Invoice],
    ) -> Result<()> {
        let mut state = self.state();

        if std::mem::take(&mut state.fail_next_create) {
            return Err(AppError::internal("Failed to insert invoice: simulated failure"));
        }

        if let Some(client_id) = enrollment.client_id.as_deref() {
            if has_active(&state, client_id, &enrollment.property_id, None) {
                return Err(AppError::bad_request(
                    "Client already has an active enrollment for this property",
                ));
            }
        }

        if let Some(unit_id) = enrollment.property_unit_id.as_deref() {
            match state.units.get(unit_id) {
                Some(unit) if unit.status == UnitStatus::Available => {}
                _ => {
                    return Err(AppError::bad_request(format!(
                        "Unit '{}' is not available",
                        unit_id
                    )))
                }
            }
        }

        if let Some(unit_id) = enrollment.property_unit_id.as_deref() {
            if let Some(unit) = state.units.get_mut(unit_id) {
                unit.status = UnitStatus::Sold;
            }
        }
        state
            .enrollments
            .insert(enrollment.id.clone(), enrollment.clone());
        state.invoices.extend(invoices.iter().cloned());

        Ok(())
    }

    async fn find_by_id(&self, enrollment_id: &str) -> Result<Option<Enrollment>> {
        Ok(self.state().enrollments.get(enrollment_id).cloned())
    }

    async fn has_active_enrollment(&self, client_id: &str, property_id: &str) -> Result<bool> {
        Ok(has_active(&self.state(), client_id, property_id, None))
    }

    async fn cancel(&self, enrollment: &Enrollment) -> Result<CancellationSummary> {
        let mut state = self.state();
        let cancelled_at = enrollment
            .cancelled_at()
            .ok_or_else(|| AppError::internal("Enrollment must be cancelled before persisting"))?;

        match state.enrollments.get(&enrollment.id).map(Enrollment::status) {
            Some(EnrollmentStatus::Ongoing | EnrollmentStatus::Suspended) => {}
            _ => return Err(AppError::bad_request("Enrollment is already cancelled")),
        }

        state
            .enrollments
            .insert(enrollment.id.clone(), enrollment.clone());

        let mut cancelled_ids = Vec::new();
        for invoice in state
            .invoices
            .iter_mut()
            .filter(|invoice| invoice.enrollment_id == enrollment.id && invoice.status.is_unpaid())
        {
            invoice.status = InvoiceStatus::Cancelled;
            invoice.updated_at = cancelled_at;
            cancelled_ids.push(invoice.id.clone());
        }

        let before = state.commissions.len();
        state.commissions.retain(|commission| {
            !(commission.status == CommissionStatus::Pending
                && commission
                    .invoice_id
                    .as_ref()
                    .is_some_and(|id| cancelled_ids.contains(id)))
        });
        let deleted_commissions = (before - state.commissions.len()) as u64;

        Ok(CancellationSummary {
            cancelled_invoices: cancelled_ids.len(),
            deleted_commissions,
        })
    }

    async fn resume(&self, enrollment: &Enrollment) -> Result<()> {
        let mut state = self.state();
        let stored = state
            .enrollments
            .get_mut(&enrollment.id)
            .filter(|stored| stored.status() == EnrollmentStatus::Suspended)
            .ok_or_else(|| AppError::bad_request("Only suspended enrollments can be resumed"))?;

        stored.state = EnrollmentState::Ongoing { grace_days: 0 };
        stored.resumed_at = enrollment.resumed_at;
        stored.updated_at = enrollment.updated_at;
        Ok(())
    }

    async fn link_client(&self, link: &ClientLink) -> Result<u64> {
        let mut state = self.state();

        match state.enrollments.get(&link.enrollment_id) {
            Some(stored) if stored.client_id.is_none() && !stored.is_cancelled() => {}
            _ => {
                return Err(AppError::bad_request(
                    "Enrollment already has a client or is cancelled",
                ))
            }
        }

        if has_active(
            &state,
            &link.client_id,
            &link.property_id,
            Some(&link.enrollment_id),
        ) {
            return Err(AppError::bad_request(
                "Client already has an active enrollment for this property",
            ));
        }

        if let Some(stored) = state.enrollments.get_mut(&link.enrollment_id) {
            stored.client_id = Some(link.client_id.clone());
            stored.partner_id = link.partner_id.clone();
            stored.updated_at = link.linked_at;
        }

        let mut deactivated = 0;
        for payment_link in state.links.iter_mut().filter(|payment_link| {
            payment_link.enrollment_id == link.enrollment_id && payment_link.is_active
        }) {
            payment_link.is_active = false;
            deactivated += 1;
        }

        Ok(deactivated)
    }

    async fn apply_grace_evaluation(&self, evaluation: &GraceEvaluation) -> Result<()> {
        let mut state = self.state();
        let now = evaluation.evaluated_at;

        if state.failing_grace_updates.contains(&evaluation.enrollment_id) {
            return Err(AppError::internal("Failed to update grace period: simulated failure"));
        }

        for transition in &evaluation.transitions {
            let still_pending = state.invoices.iter().any(|invoice| {
                invoice.id == transition.invoice_id && invoice.status == InvoiceStatus::Pending
            });
            if !still_pending {
                return Err(AppError::internal(format!(
                    "Invoice '{}' changed status during the grace-period sweep",
                    transition.invoice_id
                )));
            }
        }

        let expected = if evaluation.suspends() {
            EnrollmentStatus::Ongoing
        } else {
            evaluation.next_state.status()
        };
        match state.enrollments.get(&evaluation.enrollment_id) {
            Some(stored) if stored.status() == expected => {}
            _ => {
                return Err(AppError::internal(format!(
                    "Enrollment '{}' changed status during the grace-period sweep",
                    evaluation.enrollment_id
                )))
            }
        }

        for transition in &evaluation.transitions {
            if let Some(invoice) = state
                .invoices
                .iter_mut()
                .find(|invoice| invoice.id == transition.invoice_id)
            {
                invoice.mark_overdue(now)?;
            }
        }

        if let Some(stored) = state.enrollments.get_mut(&evaluation.enrollment_id) {
            stored.state = evaluation.next_state.clone();
            if evaluation.suspends() {
                stored.suspended_at = Some(now);
            }
            stored.updated_at = now;
        }

        Ok(())
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryStore {
    async fn find_by_id(&self, invoice_id: &str) -> Result<Option<Invoice>> {
        Ok(self
            .state()
            .invoices
            .iter()
            .find(|invoice| invoice.id == invoice_id)
            .cloned())
    }

    async fn find_by_enrollment(&self, enrollment_id: &str) -> Result<Vec<Invoice>> {
        Ok(self.invoices_of(enrollment_id))
    }

    async fn find_past_due_pending(&self, now: DateTime<Utc>) -> Result<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .state()
            .invoices
            .iter()
            .filter(|invoice| invoice.is_past_due(now))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| {
            (a.enrollment_id.as_str(), a.installment_number)
                .cmp(&(b.enrollment_id.as_str(), b.installment_number))
        });
        Ok(invoices)
    }

    async fn find_pending_due_between(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .state()
            .invoices
            .iter()
            .filter(|invoice| {
                invoice.status == InvoiceStatus::Pending
                    && invoice.due_date >= from
                    && invoice.due_date <= until
            })
            .cloned()
            .collect();
        invoices.sort_by_key(|invoice| invoice.due_date);
        Ok(invoices)
    }

    async fn settle(
        &self,
        invoice_id: &str,
        payment_reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Invoice> {
        let mut state = self.state();

        let invoice = state
            .invoices
            .iter_mut()
            .find(|invoice| invoice.id == invoice_id)
            .ok_or_else(|| AppError::not_found(format!("Invoice '{}' not found", invoice_id)))?;

        invoice.mark_paid(payment_reference.to_string(), now)?;
        let settled = invoice.clone();

        if let Some(enrollment) = state.enrollments.get_mut(&settled.enrollment_id) {
            enrollment.amount_paid += settled.amount;
            enrollment.updated_at = now;
        }

        Ok(settled)
    }
}

#[async_trait]
impl CommissionRepository for InMemoryStore {
    async fn find_by_enrollment(&self, enrollment_id: &str) -> Result<Vec<Commission>> {
        Ok(self.commissions_of(enrollment_id))
    }
}

#[async_trait]
impl PaymentLinkRepository for InMemoryStore {
    async fn create(&self, link: &PaymentLink, preconditions: &LinkPreconditions) -> Result<()> {
        let mut state = self.state();

        let enrollment = state.enrollments.get(&link.enrollment_id).ok_or_else(|| {
            AppError::not_found(format!("Enrollment '{}' not found", link.enrollment_id))
        })?;
        if enrollment.is_cancelled() {
            return Err(AppError::bad_request(
                "Cannot generate a payment link for a cancelled enrollment",
            ));
        }
        if enrollment.client_id != preconditions.client_id {
            return Err(AppError::bad_request(
                "Enrollment client changed while the link was being issued",
            ));
        }

        let target = state
            .invoices
            .iter()
            .find(|invoice| {
                invoice.id == link.invoice_id && invoice.enrollment_id == link.enrollment_id
            })
            .ok_or_else(|| {
                AppError::not_found(format!("Invoice '{}' not found", link.invoice_id))
            })?;
        if !target.status.is_unpaid() {
            return Err(AppError::bad_request("Invoice is no longer awaiting payment"));
        }

        if let Some(number) = preconditions.required_paid_installment {
            let previous_paid = state.invoices.iter().any(|invoice| {
                invoice.enrollment_id == link.enrollment_id
                    && invoice.installment_number == number
                    && invoice.status == InvoiceStatus::Paid
            });
            if !previous_paid {
                return Err(AppError::bad_request("Previous invoices must be paid first"));
            }
        }

        state.links.push(link.clone());
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<PaymentLink>> {
        Ok(self
            .state()
            .links
            .iter()
            .find(|link| link.token == token)
            .cloned())
    }
}
