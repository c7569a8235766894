mod payment_link;

pub use payment_link::{
    generate_token, GeneratePaymentLinkRequest, PaymentLink, PaymentLinkResponse, TOKEN_BYTES,
};
