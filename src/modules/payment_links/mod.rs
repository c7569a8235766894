// Payment links module (tokenized, sequential, expiring links per invoice)

pub mod models;
pub mod repositories;
pub mod services;

pub use models::{GeneratePaymentLinkRequest, PaymentLink, PaymentLinkResponse};
pub use repositories::PaymentLinkRepository;
pub use services::{PaymentLinkIssuer, PaymentLinkSettings};
