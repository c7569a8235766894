use tracing::warn;

use crate::modules::enrollments::models::Enrollment;
use crate::modules::parties::models::Recipient;
use crate::modules::parties::repositories::PartyDirectory;
use crate::modules::properties::repositories::PropertyCatalog;

/// Who to notify about an enrollment and what to call its property
#[derive(Debug, Clone, Default)]
pub struct NoticeContext {
    pub property_name: String,
    pub recipients: Vec<Recipient>,
}

impl NoticeContext {
    /// Resolve the property name, the linked client and the agent.
    ///
    /// Lookup failures are logged and leave the affected party out; they
    /// never fail the caller.
    pub async fn load(
        properties: &dyn PropertyCatalog,
        parties: &dyn PartyDirectory,
        enrollment: &Enrollment,
    ) -> Self {
        let property_name = match properties.find_property(&enrollment.property_id).await {
            Ok(Some(property)) => property.name,
            Ok(None) => enrollment.property_id.clone(),
            Err(e) => {
                warn!(
                    enrollment_id = %enrollment.id,
                    property_id = %enrollment.property_id,
                    error = %e,
                    "Could not load property for notice"
                );
                enrollment.property_id.clone()
            }
        };

        let mut recipients = Vec::with_capacity(2);

        if let Some(client_id) = enrollment.client_id.as_deref() {
            match parties.find_client(client_id).await {
                Ok(Some(client)) => recipients.push(client.recipient()),
                Ok(None) => warn!(
                    enrollment_id = %enrollment.id,
                    client_id,
                    "Client not found for notice"
                ),
                Err(e) => warn!(
                    enrollment_id = %enrollment.id,
                    client_id,
                    error = %e,
                    "Could not load client for notice"
                ),
            }
        }

        match parties.find_agent(&enrollment.agent_id).await {
            Ok(Some(agent)) => recipients.push(agent.recipient()),
            Ok(None) => warn!(
                enrollment_id = %enrollment.id,
                agent_id = %enrollment.agent_id,
                "Agent not found for notice"
            ),
            Err(e) => warn!(
                enrollment_id = %enrollment.id,
                agent_id = %enrollment.agent_id,
                error = %e,
                "Could not load agent for notice"
            ),
        }

        Self {
            property_name,
            recipients,
        }
    }
}
