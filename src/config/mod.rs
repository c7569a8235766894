use crate::core::{AppError, Currency, Result};
use crate::modules::payment_links::services::PaymentLinkSettings;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub mod database;
pub mod server;

pub use database::DatabaseConfig;
pub use server::ServerConfig;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub billing: BillingConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    /// `json` switches the subscriber to JSON lines
    pub log_format: String,
}

/// Billing engine settings
#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub currency: Currency,
    pub grace_sweep_interval: Duration,
    pub reminder_interval: Duration,
    pub reminder_window_days: i64,
    pub payment_link_ttl_days: i64,
    pub payment_link_base_url: String,
}

/// Notification channel settings
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Webhook endpoint; notices are only logged when unset
    pub webhook_url: Option<String>,
    pub webhook_secret: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            },
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
            billing: BillingConfig {
                currency: Currency::from_str(
                    &env::var("BILLING_CURRENCY").unwrap_or_else(|_| "NGN".to_string()),
                )
                .map_err(AppError::Configuration)?,
                grace_sweep_interval: Duration::from_secs(parse_var(
                    "GRACE_SWEEP_INTERVAL_SECS",
                    86_400,
                )?),
                reminder_interval: Duration::from_secs(parse_var("REMINDER_INTERVAL_SECS", 3_600)?),
                reminder_window_days: parse_var("REMINDER_WINDOW_DAYS", 3)?,
                payment_link_ttl_days: parse_var("PAYMENT_LINK_TTL_DAYS", 30)?,
                payment_link_base_url: env::var("PAYMENT_LINK_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:3000/pay".to_string()),
            },
            notifications: NotificationConfig {
                webhook_url: env::var("NOTIFICATION_WEBHOOK_URL")
                    .ok()
                    .filter(|url| !url.trim().is_empty()),
                webhook_secret: env::var("NOTIFICATION_WEBHOOK_SECRET").unwrap_or_default(),
                timeout: Duration::from_secs(parse_var("NOTIFICATION_TIMEOUT_SECS", 10)?),
                max_retries: parse_var("NOTIFICATION_MAX_RETRIES", 3)?,
            },
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.billing.grace_sweep_interval.is_zero() || self.billing.reminder_interval.is_zero() {
            return Err(AppError::Configuration(
                "Background job intervals must be greater than 0".to_string(),
            ));
        }

        if self.billing.reminder_window_days <= 0 {
            return Err(AppError::Configuration(
                "REMINDER_WINDOW_DAYS must be greater than 0".to_string(),
            ));
        }

        if self.billing.payment_link_ttl_days <= 0 {
            return Err(AppError::Configuration(
                "PAYMENT_LINK_TTL_DAYS must be greater than 0".to_string(),
            ));
        }

        if self.notifications.timeout.is_zero() {
            return Err(AppError::Configuration(
                "NOTIFICATION_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.notifications.webhook_url.is_some()
            && self.notifications.webhook_secret.is_empty()
        {
            return Err(AppError::Configuration(
                "NOTIFICATION_WEBHOOK_SECRET is required when NOTIFICATION_WEBHOOK_URL is set"
                    .to_string(),
            ));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.app.env == "production"
    }
}

impl BillingConfig {
    pub fn payment_link_settings(&self) -> PaymentLinkSettings {
        PaymentLinkSettings {
            ttl: chrono::Duration::days(self.payment_link_ttl_days),
            base_url: self.payment_link_base_url.clone(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("Invalid {}", name))),
        Err(_) => Ok(default),
    }
}
