pub mod enrollment_service;
pub mod pricing_calculator;

pub use enrollment_service::{
    CreateEnrollmentRequest, CreatedEnrollment, EnrollmentDetail, EnrollmentService, LinkedClient,
};
pub use pricing_calculator::{
    PricingCalculator, PricingQuote, PricingRequest, MAX_OUTRIGHT_INSTALLMENTS,
};
