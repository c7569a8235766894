use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token length in bytes before hex encoding
pub const TOKEN_BYTES: usize = 32;

/// Tokenized, time-limited link for settling one invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub id: String,
    pub enrollment_id: String,
    pub invoice_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub first_name: String,
    pub last_name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl PaymentLink {
    pub fn issue(
        enrollment_id: String,
        invoice_id: String,
        first_name: String,
        last_name: String,
        created_by: String,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            enrollment_id,
            invoice_id,
            token: generate_token(),
            expires_at: now + ttl,
            is_active: true,
            first_name,
            last_name,
            created_by,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Active and not yet expired
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now)
    }
}

/// Opaque token from the operating system's CSPRNG, hex-encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Request to issue a payment link
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratePaymentLinkRequest {
    pub enrollment_id: String,
    pub invoice_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Issued payment link as returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentLinkResponse {
    pub token: String,
    pub payment_url: String,
    pub expires_at: DateTime<Utc>,
    pub enrollment_id: String,
    pub invoice_id: String,
}
