//! # Shop Server
//!
//! Backend API for the Audio Tài Lộc storefront and dashboard.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Database pool, migrations and Redis
//! - Background jobs and the HTTP server

use anyhow::Result;
use tracing::info;

use shop_server::config::Settings;
use shop_server::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    shop_server::telemetry::init_tracing();
    shop_server::presentation::http::handlers::health::mark_started();

    info!("Starting shop server...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
