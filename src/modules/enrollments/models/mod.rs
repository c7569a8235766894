mod enrollment;
mod enrollment_state;

pub use enrollment::{Enrollment, EnrollmentTerms, PaymentType};
pub use enrollment_state::{
    EnrollmentState, EnrollmentStatus, GraceDecision, GRACE_PERIOD_LIMIT_DAYS,
};
