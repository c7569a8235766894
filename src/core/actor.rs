use serde::{Deserialize, Serialize};

/// Role of the party performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Admin,
    Agent,
    Client,
}

/// Authenticated caller, resolved by the HTTP layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, ActorRole::Admin)
    }

    pub fn agent(id: impl Into<String>) -> Self {
        Self::new(id, ActorRole::Agent)
    }

    pub fn client(id: impl Into<String>) -> Self {
        Self::new(id, ActorRole::Client)
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}
