use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;

use crate::core::{AppError, Result};
use crate::modules::notifications::models::{OverdueNotice, ReminderNotice};
use crate::modules::notifications::services::NotificationService;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 of the request body
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Delivers notices as signed JSON webhooks to the notification service
pub struct WebhookNotifier {
    client: ClientWithMiddleware,
    base_url: String,
    secret: String,
}

impl WebhookNotifier {
    pub fn new(
        base_url: String,
        secret: String,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret,
        })
    }

    /// Hex-encoded HMAC-SHA256 of `body` under the shared secret
    pub fn sign(&self, body: &[u8]) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::Configuration(format!("Invalid webhook secret: {}", e)))?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, payload: &T) -> Result<()> {
        let url = format!("{}/{}", self.base_url, path);
        let body = serde_json::to_vec(payload)?;
        let signature = self.sign(&body)?;

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::notification(format!("Delivery to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(AppError::notification(format!(
                "Notification service returned {}: {}",
                status, error_body
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationService for WebhookNotifier {
    async fn send_overdue_notice(&self, notice: &OverdueNotice) -> Result<()> {
        self.post("notices/overdue", notice).await
    }

    async fn send_reminder_notice(&self, notice: &ReminderNotice) -> Result<()> {
        self.post("notices/reminder", notice).await
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
