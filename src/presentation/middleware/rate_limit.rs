//! Rate Limiting Middleware
//!
//! Redis-based distributed rate limiting using a sliding window.
//! Auth endpoints get a strict per-minute budget, the rest of the API a
//! looser one; both come from `RateLimitSettings`.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use redis::aio::ConnectionManager;
use serde::Serialize;

use crate::config::RateLimitSettings;
use crate::infrastructure::cache::{keys, KEY_PREFIX};
use crate::presentation::middleware::auth::AuthUser;
use crate::shared::error::{AppError, ErrorResponse};
use crate::startup::AppState;

const WINDOW_SECONDS: u64 = 60;

/// Sliding window over a sorted set of request timestamps.
///
/// Returns `{allowed, count, retry_after_ms}`.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now_ms = tonumber(ARGV[1])
local window_start = tonumber(ARGV[2])
local max_requests = tonumber(ARGV[3])
local window_seconds = tonumber(ARGV[4])

redis.call('ZREMRANGEBYSCORE', key, '-inf', window_start)
local current_count = redis.call('ZCARD', key)

if current_count < max_requests then
    local member = now_ms .. ':' .. math.random(1000000)
    redis.call('ZADD', key, now_ms, member)
    redis.call('EXPIRE', key, window_seconds + 1)
    return {1, current_count + 1, 0}
end

local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
local retry_after = 0
if oldest and #oldest >= 2 then
    retry_after = oldest[2] + (window_seconds * 1000) - now_ms
end
return {0, current_count, retry_after}
"#;

/// Limit applied to one bucket of endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_seconds: u64,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    pub fn max_requests(&self) -> u32 {
        self.requests_per_window + self.burst_allowance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointType {
    /// Login, register and token refresh
    Auth,
    /// Everything else under `/api/v1`
    Api,
}

impl EndpointType {
    /// Auth endpoints get no burst allowance.
    pub fn config(&self, settings: &RateLimitSettings) -> RateLimitConfig {
        match self {
            EndpointType::Auth => RateLimitConfig {
                requests_per_window: settings.auth_per_minute,
                window_seconds: WINDOW_SECONDS,
                burst_allowance: 0,
            },
            EndpointType::Api => RateLimitConfig {
                requests_per_window: settings.api_per_minute,
                window_seconds: WINDOW_SECONDS,
                burst_allowance: settings.burst_size,
            },
        }
    }

    fn bucket(&self) -> &'static str {
        match self {
            EndpointType::Auth => "auth",
            EndpointType::Api => "api",
        }
    }
}

/// Rate limit status returned to clients.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Unix timestamp when the window resets
    pub reset_at: i64,
    pub retry_after: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed(RateLimitInfo),
    Limited(RateLimitInfo),
}

#[derive(Debug, Serialize)]
struct RateLimitExceededResponse {
    #[serde(flatten)]
    error: ErrorResponse,
    rate_limit: RateLimitInfo,
}

#[derive(Clone)]
pub struct RateLimiter {
    redis: ConnectionManager,
    config: RateLimitConfig,
    endpoint_type: EndpointType,
}

impl RateLimiter {
    pub fn new(
        redis: ConnectionManager,
        endpoint_type: EndpointType,
        settings: &RateLimitSettings,
    ) -> Self {
        Self {
            redis,
            config: endpoint_type.config(settings),
            endpoint_type,
        }
    }

    /// Count this request against the identifier's window.
    pub async fn check(&self, identifier: &str) -> Result<Decision, redis::RedisError> {
        let key = format!(
            "{}{}",
            KEY_PREFIX,
            keys::rate_limit(self.endpoint_type.bucket(), identifier)
        );
        let now_ms = chrono::Utc::now().timestamp_millis();
        let window_ms = (self.config.window_seconds * 1000) as i64;
        let max_requests = self.config.max_requests();

        let mut conn = self.redis.clone();
        let result: Vec<i64> = redis::Script::new(SLIDING_WINDOW_SCRIPT)
            .key(&key)
            .arg(now_ms)
            .arg(now_ms - window_ms)
            .arg(max_requests as i64)
            .arg(self.config.window_seconds as i64)
            .invoke_async(&mut conn)
            .await?;

        let allowed = result.first().copied().unwrap_or(1) == 1;
        let count = result.get(1).copied().unwrap_or(0).max(0) as u32;
        let retry_ms = result.get(2).copied().unwrap_or(0);

        Ok(decide(
            &self.config,
            allowed,
            count,
            retry_ms,
            now_ms / 1000,
        ))
    }
}

fn decide(
    config: &RateLimitConfig,
    allowed: bool,
    count: u32,
    retry_ms: i64,
    now_secs: i64,
) -> Decision {
    let limit = config.max_requests();
    let info = RateLimitInfo {
        limit,
        remaining: limit.saturating_sub(count),
        reset_at: now_secs + config.window_seconds as i64,
        retry_after: if allowed {
            0
        } else {
            (retry_ms.max(0) as u64).div_ceil(1000)
        },
    };

    if allowed {
        Decision::Allowed(info)
    } else {
        Decision::Limited(RateLimitInfo {
            remaining: 0,
            ..info
        })
    }
}

/// Extract the rate limit identifier from a request.
///
/// Priority: authenticated user, `X-Forwarded-For`, `X-Real-IP`, then the
/// socket address recorded by `into_make_service_with_connect_info`.
fn extract_identifier(request: &Request) -> String {
    if let Some(auth_user) = request.extensions().get::<AuthUser>() {
        return format!("user:{}", auth_user.user_id);
    }

    let headers = request.headers();

    if let Some(first_ip) = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
    {
        if first_ip.parse::<IpAddr>().is_ok() {
            return format!("ip:{}", first_ip);
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        if real_ip.parse::<IpAddr>().is_ok() {
            return format!("ip:{}", real_ip);
        }
    }

    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => {
            tracing::warn!("Could not determine client identifier for rate limiting");
            "ip:unknown".to_string()
        }
    }
}

pub async fn rate_limit_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    rate_limit_inner(state, request, next, EndpointType::Auth).await
}

pub async fn rate_limit_api(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    rate_limit_inner(state, request, next, EndpointType::Api).await
}

async fn rate_limit_inner(
    state: AppState,
    request: Request,
    next: Next,
    endpoint_type: EndpointType,
) -> Response {
    let identifier = extract_identifier(&request);
    let limiter = RateLimiter::new(
        state.redis.clone(),
        endpoint_type,
        &state.settings.rate_limit,
    );

    match limiter.check(&identifier).await {
        Ok(Decision::Allowed(info)) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(response.headers_mut(), &info);
            response
        }
        Ok(Decision::Limited(info)) => {
            tracing::warn!(
                identifier = %identifier,
                endpoint_type = ?endpoint_type,
                "Rate limit exceeded"
            );
            create_rate_limit_response(info)
        }
        Err(e) => {
            // Fail open
            tracing::error!(error = %e, "Rate limiter Redis error");
            next.run(request).await
        }
    }
}

fn add_rate_limit_headers(headers: &mut HeaderMap, info: &RateLimitInfo) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(info.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(info.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(info.reset_at));
}

fn create_rate_limit_response(info: RateLimitInfo) -> Response {
    let err = AppError::RateLimited;
    let body = RateLimitExceededResponse {
        error: ErrorResponse {
            code: err.code(),
            message: "Too many requests. Please slow down.".to_string(),
            errors: None,
        },
        rate_limit: info.clone(),
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(info.retry_after));
    add_rate_limit_headers(response.headers_mut(), &info);
    response
}
