pub mod payment_link_issuer;

pub use payment_link_issuer::{PaymentLinkIssuer, PaymentLinkSettings, ResolvedPaymentLink};
