// Enrollment creation through the service: pricing, schedule, validation and
// the all-or-nothing write

#[path = "../helpers/mod.rs"]
mod helpers;

use chrono::Duration;
use estatepay::core::{Actor, AppError};
use estatepay::modules::commissions::models::{Commission, CommissionStatus};
use estatepay::modules::enrollments::models::EnrollmentStatus;
use estatepay::modules::invoices::models::InvoiceStatus;
use estatepay::modules::parties::models::{Client, PartnershipStatus};
use estatepay::modules::properties::models::{Property, PropertyStatus, UnitStatus};
use helpers::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn assert_bad_request(err: AppError, fragment: &str) {
    match err {
        AppError::BadRequest(message) => assert!(
            message.contains(fragment),
            "expected '{}' in '{}'",
            fragment,
            message
        ),
        other => panic!("expected BadRequest, got {:?}", other),
    }
}

#[tokio::test]
async fn test_outright_in_two_installments() {
    let fx = Fixture::new();

    let created = fx.enrollments.create(outright_request(2)).await.unwrap();

    assert_eq!(created.enrollment.total_amount, dec!(1000000));
    assert_eq!(created.enrollment.status(), EnrollmentStatus::Ongoing);
    assert_eq!(created.enrollment.grace_period_days_used(), 0);

    let invoices = fx.store.invoices_of(&created.enrollment.id);
    assert_eq!(invoices.len(), 2);
    assert_eq!(invoices[0].amount, dec!(500000));
    assert_eq!(invoices[1].amount, dec!(500000));
    assert_eq!(invoices[0].due_date, start_date());
    assert_eq!(invoices[1].due_date, start_date() + Duration::days(30));
    assert!(invoices.iter().all(|i| i.status == InvoiceStatus::Pending));
}

#[tokio::test]
async fn test_active_sales_discount_applies_to_outright() {
    let fx = Fixture::new();
    fx.store.add_property(discounted(dec!(10)));

    let created = fx.enrollments.create(outright_request(1)).await.unwrap();

    assert_eq!(created.quote.discount_amount, dec!(100000));
    assert_eq!(created.enrollment.total_amount, dec!(900000));
    assert_eq!(fx.store.invoices_of(&created.enrollment.id).len(), 1);
}

#[tokio::test]
async fn test_installment_plan_adds_interest() {
    let fx = Fixture::new();

    let created = fx
        .enrollments
        .create(installment_request(PLAN_12M))
        .await
        .unwrap();

    assert_eq!(created.enrollment.total_amount, dec!(1100000));
    let invoices = fx.store.invoices_of(&created.enrollment.id);
    assert_eq!(invoices.len(), 12);
    assert_eq!(invoices.iter().map(|i| i.amount).sum::<Decimal>(), dec!(1100000));
    assert_eq!(invoices[11].due_date, start_date() + Duration::days(11 * 30));
}

#[tokio::test]
async fn test_explicit_enrollment_date_anchors_schedule() {
    let fx = Fixture::new();
    let anchor = start_date() - Duration::days(10);

    let mut request = outright_request(2);
    request.enrollment_date = Some(anchor);
    let created = fx.enrollments.create(request).await.unwrap();

    assert_eq!(created.enrollment.enrollment_date, anchor);
    assert_eq!(created.invoices[0].due_date, anchor);
    assert_eq!(created.enrollment.created_at, start_date());
}

#[tokio::test]
async fn test_selected_unit_is_marked_sold() {
    let fx = Fixture::new();
    fx.store.add_unit(unit(UnitStatus::Available));

    let mut request = outright_request(1);
    request.property_unit_id = Some(UNIT_ID.to_string());
    fx.enrollments.create(request).await.unwrap();

    assert_eq!(fx.store.unit(UNIT_ID).unwrap().status, UnitStatus::Sold);
}

#[tokio::test]
async fn test_unavailable_unit_rejected() {
    let fx = Fixture::new();
    fx.store.add_unit(unit(UnitStatus::Reserved));

    let mut request = outright_request(1);
    request.property_unit_id = Some(UNIT_ID.to_string());
    let err = fx.enrollments.create(request).await.unwrap_err();

    assert_bad_request(err, "cannot be sold");
    assert_eq!(fx.store.enrollment_count(), 0);
}

#[tokio::test]
async fn test_unit_of_another_size_rejected() {
    let fx = Fixture::new();
    fx.store.add_unit(unit(UnitStatus::Available));

    let mut request = outright_request(1);
    request.selected_unit = "1000sqm".to_string();
    request.property_unit_id = Some(UNIT_ID.to_string());
    let err = fx.enrollments.create(request).await.unwrap_err();

    assert_bad_request(err, "sold as 500sqm, not 1000sqm");
    assert_eq!(fx.store.enrollment_count(), 0);
    assert_eq!(fx.store.unit(UNIT_ID).unwrap().status, UnitStatus::Available);
}

#[tokio::test]
async fn test_unknown_unit_not_found() {
    let fx = Fixture::new();

    let mut request = outright_request(1);
    request.property_unit_id = Some("unit-missing".to_string());
    let err = fx.enrollments.create(request).await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_archived_property_rejected() {
    let fx = Fixture::new();
    fx.store.add_property(Property {
        status: PropertyStatus::Archived,
        ..property()
    });

    let err = fx.enrollments.create(outright_request(1)).await.unwrap_err();
    assert_bad_request(err, "not accepting enrollments");
}

#[tokio::test]
async fn test_unknown_property_not_found() {
    let fx = Fixture::new();
    let mut request = outright_request(1);
    request.property_id = "prop-missing".to_string();

    let err = fx.enrollments.create(request).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_agent_without_onboarding_rights_forbidden() {
    let fx = Fixture::new();
    let mut restricted = agent();
    restricted.can_onboard_clients = false;
    fx.store.add_agent(restricted);

    let err = fx.enrollments.create(outright_request(1)).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_client_must_finish_onboarding() {
    let fx = Fixture::new();
    fx.store.add_client(Client {
        has_completed_onboarding: false,
        ..client()
    });

    let mut request = outright_request(1);
    request.client_id = Some(CLIENT_ID.to_string());
    let err = fx.enrollments.create(request).await.unwrap_err();

    assert_bad_request(err, "onboarding");
}

#[tokio::test]
async fn test_one_active_enrollment_per_client_and_property() {
    let fx = Fixture::new();
    let mut request = outright_request(1);
    request.client_id = Some(CLIENT_ID.to_string());

    fx.enrollments.create(request.clone()).await.unwrap();
    let err = fx.enrollments.create(request.clone()).await.unwrap_err();
    assert_bad_request(err, "active enrollment");
    assert_eq!(fx.store.enrollment_count(), 1);
}

#[tokio::test]
async fn test_cancelled_enrollment_frees_the_client() {
    let fx = Fixture::new();
    let mut request = outright_request(1);
    request.client_id = Some(CLIENT_ID.to_string());

    let first = fx.enrollments.create(request.clone()).await.unwrap();
    fx.enrollments
        .cancel(&first.enrollment.id, &Actor::admin("admin-1"))
        .await
        .unwrap();

    assert!(fx.enrollments.create(request).await.is_ok());
}

#[tokio::test]
async fn test_approved_partner_is_attributed() {
    let fx = Fixture::new();
    let mut request = outright_request(1);
    request.client_id = Some(CLIENT_ID.to_string());

    let created = fx.enrollments.create(request).await.unwrap();
    assert_eq!(created.enrollment.partner_id.as_deref(), Some(PARTNER_ID));
}

#[tokio::test]
async fn test_suspended_or_unapproved_partner_not_attributed() {
    for (status, suspended) in [
        (PartnershipStatus::Approved, true),
        (PartnershipStatus::Pending, false),
    ] {
        let fx = Fixture::new();
        fx.store.add_partner(partner(status, suspended));
        let mut request = outright_request(1);
        request.client_id = Some(CLIENT_ID.to_string());

        let created = fx.enrollments.create(request).await.unwrap();
        assert_eq!(created.enrollment.partner_id, None);
    }
}

#[tokio::test]
async fn test_failed_write_persists_nothing() {
    let fx = Fixture::new();
    fx.store.add_unit(unit(UnitStatus::Available));
    fx.store.fail_next_create();

    let mut request = outright_request(2);
    request.property_unit_id = Some(UNIT_ID.to_string());
    let err = fx.enrollments.create(request).await.unwrap_err();

    assert!(matches!(err, AppError::Internal(_)));
    assert_eq!(fx.store.enrollment_count(), 0);
    assert_eq!(fx.store.invoice_count(), 0);
    assert_eq!(fx.store.unit(UNIT_ID).unwrap().status, UnitStatus::Available);
}

#[tokio::test]
async fn test_invalid_pricing_persists_nothing() {
    let fx = Fixture::new();

    let err = fx
        .enrollments
        .create(installment_request("plan-missing"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_) | AppError::NotFound(_)));
    assert_eq!(fx.store.enrollment_count(), 0);
}

#[tokio::test]
async fn test_detail_visible_to_admin_agent_and_client_only() {
    let fx = Fixture::new();
    let mut request = outright_request(2);
    request.client_id = Some(CLIENT_ID.to_string());
    let created = fx.enrollments.create(request).await.unwrap();
    let id = created.enrollment.id.clone();

    for actor in [
        Actor::admin("admin-1"),
        Actor::agent(AGENT_ID),
        Actor::client(CLIENT_ID),
    ] {
        assert!(fx.enrollments.get_detail(&id, &actor).await.is_ok());
    }

    for actor in [Actor::agent("agent-other"), Actor::client("client-other")] {
        let err = fx.enrollments.get_detail(&id, &actor).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}

#[tokio::test]
async fn test_detail_reports_outstanding_and_commissions() {
    let fx = Fixture::new();
    let created = fx.enrollments.create(outright_request(2)).await.unwrap();
    let id = created.enrollment.id.clone();

    fx.store.add_commission(Commission {
        id: "com-1".to_string(),
        enrollment_id: id.clone(),
        invoice_id: Some(created.invoices[0].id.clone()),
        beneficiary_id: AGENT_ID.to_string(),
        amount: dec!(25000),
        status: CommissionStatus::Pending,
        created_at: fx.now(),
    });
    fx.invoices
        .settle_invoice(&created.invoices[0].id, "PAY-001")
        .await
        .unwrap();

    let detail = fx
        .enrollments
        .get_detail(&id, &Actor::admin("admin-1"))
        .await
        .unwrap();

    assert_eq!(detail.outstanding_amount, dec!(500000));
    assert_eq!(detail.invoices.len(), 2);
    assert_eq!(detail.invoices[0].status, InvoiceStatus::Paid);
    assert_eq!(detail.commissions.len(), 1);
}

#[tokio::test]
async fn test_detail_of_unknown_enrollment_not_found() {
    let fx = Fixture::new();
    let err = fx
        .enrollments
        .get_detail("enr-missing", &Actor::admin("admin-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
