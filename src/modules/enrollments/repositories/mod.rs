pub mod enrollment_repository;

pub use enrollment_repository::{
    CancellationSummary, ClientLink, EnrollmentRepository, MySqlEnrollmentRepository,
};
