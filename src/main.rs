use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use estatepay::config::{Config, DatabaseConfig};
use estatepay::core::{Clock, SystemClock};
use estatepay::modules::commissions::repositories::{
    CommissionRepository, MySqlCommissionRepository,
};
use estatepay::modules::enrollments::repositories::{
    EnrollmentRepository, MySqlEnrollmentRepository,
};
use estatepay::modules::enrollments::services::{EnrollmentService, PricingCalculator};
use estatepay::modules::health;
use estatepay::modules::invoices::repositories::{InvoiceRepository, MySqlInvoiceRepository};
use estatepay::modules::invoices::services::{
    GracePeriodSweep, InvoiceScheduler, InvoiceService, ReminderPass,
};
use estatepay::modules::notifications::services::{
    LogNotifier, NotificationService, WebhookNotifier,
};
use estatepay::modules::parties::repositories::{MySqlPartyDirectory, PartyDirectory};
use estatepay::modules::payment_links::repositories::{
    MySqlPaymentLinkRepository, PaymentLinkRepository,
};
use estatepay::modules::payment_links::services::PaymentLinkIssuer;
use estatepay::modules::properties::repositories::{MySqlPropertyCatalog, PropertyCatalog};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    init_tracing(&config);

    tracing::info!("Starting estatepay billing engine");
    tracing::info!(
        env = %config.app.env,
        currency = %config.billing.currency,
        bind = %config.server.bind_address(),
        "Configuration loaded"
    );

    // Create database connection pool
    let db_pool = config
        .database
        .create_pool()
        .await
        .context("Failed to create database pool")?;

    tracing::info!(
        max_connections = config.database.max_connections,
        "Database pool initialized"
    );

    if config.database.run_migrations {
        DatabaseConfig::run_migrations(&db_pool)
            .await
            .context("Failed to run migrations")?;
        tracing::info!("Database migrations applied");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let enrollments: Arc<dyn EnrollmentRepository> =
        Arc::new(MySqlEnrollmentRepository::new(db_pool.clone()));
    let invoices: Arc<dyn InvoiceRepository> =
        Arc::new(MySqlInvoiceRepository::new(db_pool.clone()));
    let properties: Arc<dyn PropertyCatalog> =
        Arc::new(MySqlPropertyCatalog::new(db_pool.clone()));
    let parties: Arc<dyn PartyDirectory> = Arc::new(MySqlPartyDirectory::new(db_pool.clone()));
    let commissions: Arc<dyn CommissionRepository> =
        Arc::new(MySqlCommissionRepository::new(db_pool.clone()));
    let links: Arc<dyn PaymentLinkRepository> =
        Arc::new(MySqlPaymentLinkRepository::new(db_pool.clone()));
    let notifier = build_notifier(&config)?;

    // Services shared with request handlers
    let currency = config.billing.currency;
    let enrollment_service = web::Data::new(EnrollmentService::new(
        Arc::clone(&properties),
        Arc::clone(&parties),
        Arc::clone(&enrollments),
        Arc::clone(&invoices),
        commissions,
        Arc::clone(&clock),
        PricingCalculator::new(currency),
        InvoiceScheduler::new(currency),
    ));
    let invoice_service = web::Data::new(InvoiceService::new(
        Arc::clone(&invoices),
        Arc::clone(&clock),
    ));
    let payment_link_issuer = web::Data::new(PaymentLinkIssuer::new(
        Arc::clone(&enrollments),
        Arc::clone(&invoices),
        Arc::clone(&parties),
        links,
        Arc::clone(&clock),
        config.billing.payment_link_settings(),
    ));

    // Background jobs
    let sweep = Arc::new(GracePeriodSweep::new(
        Arc::clone(&enrollments),
        Arc::clone(&invoices),
        Arc::clone(&properties),
        Arc::clone(&parties),
        Arc::clone(&notifier),
        Arc::clone(&clock),
        config.billing.grace_sweep_interval,
        config.notifications.timeout,
    ));
    tokio::spawn(sweep.start());

    let reminders = Arc::new(ReminderPass::new(
        enrollments,
        invoices,
        properties,
        parties,
        notifier,
        clock,
        config.billing.reminder_interval,
        chrono::Duration::days(config.billing.reminder_window_days),
        config.notifications.timeout,
    ));
    tokio::spawn(reminders.start());

    // Start HTTP server
    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(enrollment_service.clone())
            .app_data(invoice_service.clone())
            .app_data(payment_link_issuer.clone())
            .configure(health::configure)
    })
    .workers(config.server.workers)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await.context("HTTP server error")
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("estatepay={},actix_web=info", config.app.log_level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.app.log_format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_notifier(config: &Config) -> anyhow::Result<Arc<dyn NotificationService>> {
    let notifier: Arc<dyn NotificationService> = match &config.notifications.webhook_url {
        Some(url) => Arc::new(
            WebhookNotifier::new(
                url.clone(),
                config.notifications.webhook_secret.clone(),
                config.notifications.timeout,
                config.notifications.max_retries,
            )
            .context("Failed to build webhook notifier")?,
        ),
        None => {
            if config.is_production() {
                tracing::warn!(
                    "NOTIFICATION_WEBHOOK_URL not set in production, notices will only be logged"
                );
            } else {
                tracing::info!("Notices will be written to the log");
            }
            Arc::new(LogNotifier::new(config.billing.currency))
        }
    };

    Ok(notifier)
}
