//! Health Checks
//!
//! `/health` and `/health/live` never touch a dependency. `/health/ready`
//! pings Postgres and Redis, reports pool usage, and lists which outbound
//! integrations have credentials. Only a database failure makes the shop
//! unready: the catalog cache and the rate limiter both fail open.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::config::Settings;
use crate::startup::AppState;

static STARTED: Lazy<Instant> = Lazy::new(Instant::now);

const SLOW_DATABASE: Duration = Duration::from_millis(100);
const SLOW_REDIS: Duration = Duration::from_millis(50);

/// Pin the uptime clock to process start.
pub fn mark_started() {
    Lazy::force(&STARTED);
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DependencyStatus {
    Up,
    Slow,
    Down,
}

#[derive(Debug, Serialize)]
pub struct DependencyCheck {
    pub status: DependencyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PoolUsage {
    pub size: u32,
    pub idle: u32,
    pub max: u32,
}

/// Which outbound integrations have credentials.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Integrations {
    pub telegram: bool,
    pub vnpay: bool,
    pub momo: bool,
    pub payos: bool,
}

impl Integrations {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            telegram: settings.telegram.is_configured(),
            vnpay: settings.payments.vnpay.is_configured(),
            momo: settings.payments.momo.is_configured(),
            payos: settings.payments.payos.is_configured(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub database: DependencyCheck,
    pub pool: PoolUsage,
    pub redis: DependencyCheck,
    pub integrations: Integrations,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive",
        uptime_seconds: STARTED.elapsed().as_secs(),
    })
}

/// 503 only when Postgres is unreachable.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let database =
        check_dependency(sqlx::query("SELECT 1").execute(&state.db), SLOW_DATABASE).await;

    let mut conn = state.redis.clone();
    let redis = check_dependency(
        redis::cmd("PING").query_async::<String>(&mut conn),
        SLOW_REDIS,
    )
    .await;

    let idle = state.db.num_idle() as u32;
    let pool = PoolUsage {
        size: state.db.size(),
        idle,
        max: state.settings.database.max_connections,
    };

    let status = overall_status(database.status, redis.status);
    let code = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    if status != HealthStatus::Healthy {
        tracing::warn!(
            ?status,
            database = ?database.status,
            redis = ?redis.status,
            "Readiness check"
        );
    }

    let response = ReadinessResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: STARTED.elapsed().as_secs(),
        database,
        pool,
        redis,
        integrations: Integrations::from_settings(&state.settings),
    };

    (code, Json(response))
}

async fn check_dependency<F, T, E>(check: F, slow_after: Duration) -> DependencyCheck
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let start = Instant::now();
    match check.await {
        Ok(_) => {
            let elapsed = start.elapsed();
            DependencyCheck {
                status: classify_latency(elapsed, slow_after),
                latency_ms: Some(elapsed.as_millis() as u64),
                error: None,
            }
        }
        Err(e) => DependencyCheck {
            status: DependencyStatus::Down,
            latency_ms: None,
            error: Some(e.to_string()),
        },
    }
}

fn classify_latency(elapsed: Duration, slow_after: Duration) -> DependencyStatus {
    if elapsed < slow_after {
        DependencyStatus::Up
    } else {
        DependencyStatus::Slow
    }
}

fn overall_status(database: DependencyStatus, redis: DependencyStatus) -> HealthStatus {
    match (database, redis) {
        (DependencyStatus::Down, _) => HealthStatus::Unhealthy,
        (DependencyStatus::Up, DependencyStatus::Up) => HealthStatus::Healthy,
        _ => HealthStatus::Degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::DependencyStatus::{Down, Slow, Up};
    use super::*;
    use test_case::test_case;

    #[test_case(Up, Up, HealthStatus::Healthy)]
    #[test_case(Up, Down, HealthStatus::Degraded; "redis down degrades")]
    #[test_case(Slow, Up, HealthStatus::Degraded)]
    #[test_case(Down, Up, HealthStatus::Unhealthy)]
    fn combines_dependency_checks(
        db: DependencyStatus,
        redis: DependencyStatus,
        expected: HealthStatus,
    ) {
        assert_eq!(overall_status(db, redis), expected);
    }

    #[test]
    fn slow_threshold_is_exclusive() {
        assert_eq!(classify_latency(Duration::from_millis(99), SLOW_DATABASE), Up);
        assert_eq!(classify_latency(SLOW_DATABASE, SLOW_DATABASE), Slow);
    }

    #[tokio::test]
    async fn failed_check_reports_the_error() {
        let failing = async { Err::<(), _>("connection refused") };
        let check = check_dependency(failing, SLOW_REDIS).await;
        assert_eq!(check.status, Down);
        assert_eq!(check.error.as_deref(), Some("connection refused"));
        assert!(check.latency_ms.is_none());
    }

    #[test]
    fn statuses_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Slow).unwrap(), "\"slow\"");
        assert_eq!(serde_json::to_string(&HealthStatus::Degraded).unwrap(), "\"degraded\"");
    }
}
