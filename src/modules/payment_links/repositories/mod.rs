pub mod payment_link_repository;

pub use payment_link_repository::{
    deactivate_for_enrollment_tx, LinkPreconditions, MySqlPaymentLinkRepository,
    PaymentLinkRepository,
};
