//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration
    pub redis: RedisSettings,

    /// JWT authentication settings
    pub jwt: JwtSettings,

    /// Rate limiting configuration
    pub rate_limit: RateLimitSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Pricing and cart policy
    pub shop: ShopSettings,

    /// Telegram staff notifications
    pub telegram: TelegramSettings,

    /// Payment provider credentials
    pub payments: PaymentSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for signing tokens
    pub secret: String,

    /// Access token expiry in minutes
    pub access_token_expiry_minutes: i64,

    /// Refresh token expiry in days
    pub refresh_token_expiry_days: i64,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Requests per minute on authentication endpoints
    pub auth_per_minute: u32,

    /// Requests per minute on the rest of the API
    pub api_per_minute: u32,

    /// Extra requests tolerated above the per-minute limit
    pub burst_size: u32,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// Shop pricing and cart policy. Amounts are in VND.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopSettings {
    /// Flat shipping fee
    pub shipping_fee: i64,

    /// Subtotal from which shipping is free
    pub free_shipping_threshold: i64,

    /// Lifetime of an untouched guest cart
    pub guest_cart_ttl_days: i64,

    /// How often expired guest carts are swept, in seconds
    pub cart_cleanup_interval_secs: u64,

    /// Shop local time offset from UTC, used for booking slots
    pub utc_offset_hours: i32,
}

/// Telegram bot used for staff alerts. Disabled when the token is empty.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_ids: Vec<String>,
    pub api_url: String,
}

impl TelegramSettings {
    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_ids.is_empty()
    }
}

/// Payment provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentSettings {
    pub vnpay: VnPaySettings,
    pub momo: MomoSettings,
    pub payos: PayOsSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VnPaySettings {
    pub tmn_code: String,
    pub hash_secret: String,
    pub pay_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MomoSettings {
    pub partner_code: String,
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
    pub ipn_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayOsSettings {
    pub client_id: String,
    pub api_key: String,
    pub checksum_key: String,
    pub api_url: String,
}

impl VnPaySettings {
    pub fn is_configured(&self) -> bool {
        !self.tmn_code.is_empty() && !self.hash_secret.is_empty()
    }
}

impl MomoSettings {
    pub fn is_configured(&self) -> bool {
        !self.partner_code.is_empty() && !self.access_key.is_empty() && !self.secret_key.is_empty()
    }
}

impl PayOsSettings {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.api_key.is_empty() && !self.checksum_key.is_empty()
    }
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if JWT secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3010)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("jwt.access_token_expiry_minutes", 15)?
            .set_default("jwt.refresh_token_expiry_days", 7)?
            .set_default("rate_limit.auth_per_minute", 5)?
            .set_default("rate_limit.api_per_minute", 120)?
            .set_default("rate_limit.burst_size", 20)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("shop.shipping_fee", 50_000_i64)?
            .set_default("shop.free_shipping_threshold", 10_000_000_i64)?
            .set_default("shop.guest_cart_ttl_days", 7)?
            .set_default("shop.cart_cleanup_interval_secs", 3600_i64)?
            .set_default("shop.utc_offset_hours", 7)?
            .set_default("telegram.bot_token", "")?
            .set_default("telegram.chat_ids", Vec::<String>::new())?
            .set_default("telegram.api_url", "https://api.telegram.org")?
            .set_default("payments.vnpay.tmn_code", "")?
            .set_default("payments.vnpay.hash_secret", "")?
            .set_default(
                "payments.vnpay.pay_url",
                "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html",
            )?
            .set_default("payments.momo.partner_code", "")?
            .set_default("payments.momo.access_key", "")?
            .set_default("payments.momo.secret_key", "")?
            .set_default(
                "payments.momo.endpoint",
                "https://test-payment.momo.vn/v2/gateway/api/create",
            )?
            .set_default("payments.momo.ipn_url", "")?
            .set_default("payments.payos.client_id", "")?
            .set_default("payments.payos.api_key", "")?
            .set_default("payments.payos.checksum_key", "")?
            .set_default("payments.payos.api_url", "https://api-merchant.payos.vn")?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SHOP__SHIPPING_FEE=30000 -> shop.shipping_fee = 30000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .with_list_parse_key("telegram.chat_ids")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option(
                "telegram.bot_token",
                std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            )?
            .set_override_option(
                "telegram.chat_ids",
                std::env::var("TELEGRAM_CHAT_IDS").ok().map(|ids| {
                    ids.split(',')
                        .map(|id| id.trim().to_string())
                        .filter(|id| !id.is_empty())
                        .collect::<Vec<_>>()
                }),
            )?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                if settings.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
                    return Err(ConfigError::Message(format!(
                        "JWT secret must be at least {} characters for security. Current length: {}",
                        MIN_JWT_SECRET_LENGTH,
                        settings.jwt.secret.len()
                    )));
                }
                Ok(settings)
            })
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
