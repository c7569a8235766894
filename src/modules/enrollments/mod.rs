// Enrollments module (pricing, lifecycle, cancel/resume, client linking)

pub mod models;
pub mod repositories;
pub mod services;

pub use models::{Enrollment, EnrollmentState, EnrollmentStatus, PaymentType};
pub use repositories::EnrollmentRepository;
pub use services::{EnrollmentService, PricingCalculator};
