//! # CRM API Server
//!
//! Serves account management and owner-scoped contacts, leads and tasks over
//! HTTP. Outgoing account email is handed to a background dispatcher.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/crm JWT_SECRET=... cargo run -p crm-api
//! ```
//!
//! `LOG_FORMAT=json` switches log output to JSON lines.

use anyhow::Context;
use crm_api::{
    app::{build_router, AppState},
    config::Config,
};
use crm_shared::db::{migrations, pool};
use crm_worker::{LinkBuilder, LogMailer, Mailer, NotificationDispatcher, SmtpMailer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "crm_api=debug,crm_shared=debug,crm_worker=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(json_logs.then(|| fmt::layer().json()))
        .with((!json_logs).then(fmt::layer))
        .init();

    tracing::info!("CRM API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Failed to load configuration")?;

    let db = pool::connect(&config.pool_settings())
        .await
        .context("Failed to connect to database")?;
    migrations::run_migrations(&db)
        .await
        .context("Failed to run database migrations")?;

    let mailer: Arc<dyn Mailer> = match &config.mail.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp).context("Failed to configure SMTP transport")?),
        None => {
            tracing::warn!("SMTP_HOST not set; emails will be logged, not sent");
            Arc::new(LogMailer::new())
        }
    };

    let shutdown = CancellationToken::new();
    let (notifier, mail_worker) = NotificationDispatcher::spawn(
        mailer,
        LinkBuilder::new(config.api.public_base_url.clone()),
        config.dispatcher_config(),
        shutdown.clone(),
    );

    let address = config.bind_address();
    let app = build_router(AppState::new(db.clone(), config, notifier));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutdown signal received, draining notification queue...");
    shutdown.cancel();
    if let Err(e) = mail_worker.await {
        tracing::error!(error = %e, "Notification worker panicked");
    }
    pool::close(db).await;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
    }
}
