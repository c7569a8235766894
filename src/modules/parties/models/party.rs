use serde::{Deserialize, Serialize};

/// Sales agent who onboards clients and owns enrollments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub can_onboard_clients: bool,
}

/// Purchasing client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub has_completed_onboarding: bool,
    /// Partner who referred this client, if any
    pub referred_by_partner_id: Option<String>,
}

/// Partnership approval status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnershipStatus {
    Pending,
    Approved,
    Rejected,
}

impl TryFrom<String> for PartnershipStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(format!("Invalid partnership status: {}", value)),
        }
    }
}

/// Client holding a partnership, eligible for referral attribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: String,
    pub status: PartnershipStatus,
    pub is_suspended: bool,
}

impl Partner {
    /// Only approved, unsuspended partners are attributed on enrollments
    pub fn is_eligible_for_attribution(&self) -> bool {
        self.status == PartnershipStatus::Approved && !self.is_suspended
    }
}

/// Addressee of a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

impl Agent {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn recipient(&self) -> Recipient {
        Recipient {
            name: self.full_name(),
            email: self.email.clone(),
        }
    }
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn recipient(&self) -> Recipient {
        Recipient {
            name: self.full_name(),
            email: self.email.clone(),
        }
    }
}
