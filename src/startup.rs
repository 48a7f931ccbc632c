//! Application Startup
//!
//! Application building, background jobs and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::application::services::{CartService, CartServiceImpl, TokenKeys};
use crate::config::Settings;
use crate::domain::services::{BookingSchedule, PricingPolicy};
use crate::infrastructure::cache::{self, RedisCache};
use crate::infrastructure::payments::PaymentGateways;
use crate::infrastructure::repositories::{PgCartRepository, PgProductRepository};
use crate::infrastructure::telegram::TelegramClient;
use crate::infrastructure::database;
use crate::presentation::http::routes;
use crate::presentation::middleware::{create_cors_layer, create_trace_layer};

const POOL_STATS_INTERVAL: Duration = Duration::from_secs(15);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: ConnectionManager,
    pub cache: Arc<RedisCache>,
    pub token_keys: Arc<TokenKeys>,
    pub telegram: Arc<TelegramClient>,
    pub gateways: PaymentGateways,
    pub pricing: PricingPolicy,
    pub schedule: BookingSchedule,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(db: PgPool, redis: ConnectionManager, settings: Settings) -> Self {
        let http = reqwest::Client::new();

        Self {
            cache: Arc::new(RedisCache::new(redis.clone())),
            token_keys: Arc::new(TokenKeys::new(&settings.jwt)),
            telegram: Arc::new(TelegramClient::new(http.clone(), settings.telegram.clone())),
            gateways: PaymentGateways::from_settings(http, &settings.payments),
            pricing: PricingPolicy::from(&settings.shop),
            schedule: BookingSchedule::new(settings.shop.utc_offset_hours),
            settings: Arc::new(settings),
            db,
            redis,
        }
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");

        database::run_migrations(&db).await?;
        tracing::info!("Database migrations applied");

        let redis = cache::create_redis_client(&settings.redis).await?;

        let addr: SocketAddr = settings.server_addr().parse()?;
        let cors = create_cors_layer(&settings.cors);
        let state = AppState::new(db, redis, settings);

        spawn_background_jobs(&state);

        let router = routes::create_router(state)
            .layer(CompressionLayer::new())
            .layer(create_trace_layer())
            .layer(cors);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

fn spawn_background_jobs(state: &AppState) {
    let carts = CartServiceImpl::new(
        Arc::new(PgCartRepository::new(state.db.clone())),
        Arc::new(PgProductRepository::new(state.db.clone())),
        state.pricing,
        state.settings.shop.guest_cart_ttl_days,
    );
    let cleanup_every = Duration::from_secs(state.settings.shop.cart_cleanup_interval_secs.max(60));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_every);
        loop {
            ticker.tick().await;
            if let Err(e) = carts.cleanup_expired_guest_carts().await {
                tracing::warn!(error = %e, "Guest cart cleanup failed");
            }
        }
    });

    let pool = state.db.clone();
    let max_connections = state.settings.database.max_connections;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(POOL_STATS_INTERVAL);
        loop {
            ticker.tick().await;
            database::report_pool_stats(&pool, max_connections);
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
