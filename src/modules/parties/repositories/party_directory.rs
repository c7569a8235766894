use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::core::{AppError, Result};
use crate::modules::parties::models::{Agent, Client, Partner, PartnershipStatus};

/// Party directory port (agents, clients, partners)
#[async_trait]
pub trait PartyDirectory: Send + Sync {
    async fn find_agent(&self, agent_id: &str) -> Result<Option<Agent>>;

    async fn find_client(&self, client_id: &str) -> Result<Option<Client>>;

    async fn find_partner(&self, partner_id: &str) -> Result<Option<Partner>>;
}

/// Resolve the partner to attribute for a client, if any.
///
/// Returns the referring partner's id only when that partnership is
/// approved and not suspended.
pub async fn derive_partner_attribution(
    directory: &dyn PartyDirectory,
    client: &Client,
) -> Result<Option<String>> {
    let Some(partner_id) = client.referred_by_partner_id.as_deref() else {
        return Ok(None);
    };

    let partner = directory.find_partner(partner_id).await?;

    Ok(partner
        .filter(Partner::is_eligible_for_attribution)
        .map(|partner| partner.id))
}

/// MySQL-backed party directory
pub struct MySqlPartyDirectory {
    pool: MySqlPool,
}

impl MySqlPartyDirectory {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PartyDirectory for MySqlPartyDirectory {
    async fn find_agent(&self, agent_id: &str) -> Result<Option<Agent>> {
        let row = sqlx::query_as::<_, AgentRow>(
            r#"
            SELECT id, first_name, last_name, email, can_onboard_clients
            FROM agents
            WHERE id = ?
            "#,
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch agent: {}", e)))?;

        Ok(row.map(|row| Agent {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            can_onboard_clients: row.can_onboard_clients,
        }))
    }

    async fn find_client(&self, client_id: &str) -> Result<Option<Client>> {
        let row = sqlx::query_as::<_, ClientRow>(
            r#"
            SELECT
                id, first_name, last_name, email,
                has_completed_onboarding, referred_by_partner_id
            FROM clients
            WHERE id = ?
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch client: {}", e)))?;

        Ok(row.map(|row| Client {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            has_completed_onboarding: row.has_completed_onboarding,
            referred_by_partner_id: row.referred_by_partner_id,
        }))
    }

    async fn find_partner(&self, partner_id: &str) -> Result<Option<Partner>> {
        let row = sqlx::query_as::<_, PartnerRow>(
            r#"
            SELECT client_id, status, is_suspended
            FROM partnerships
            WHERE client_id = ?
            "#,
        )
        .bind(partner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch partnership: {}", e)))?;

        row.map(|row| {
            let status = PartnershipStatus::try_from(row.status).map_err(|e| {
                AppError::Internal(format!("Invalid partnership in database: {}", e))
            })?;
            Ok(Partner {
                id: row.client_id,
                status,
                is_suspended: row.is_suspended,
            })
        })
        .transpose()
    }
}

// Helper structs for database mapping

#[derive(Debug, sqlx::FromRow)]
struct AgentRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    can_onboard_clients: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct ClientRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    has_completed_onboarding: bool,
    referred_by_partner_id: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct PartnerRow {
    client_id: String,
    status: String,
    is_suspended: bool,
}
