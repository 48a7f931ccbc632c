//! Prometheus Metrics Module
//!
//! # Metrics Collected
//! - HTTP request counts by method, route, and status
//! - HTTP request latency histograms
//! - Orders placed and payment webhooks processed
//! - Expired guest carts abandoned by the cleanup task
//! - Database pool gauges

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

const NAMESPACE: &str = "shop_server";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter by method, matched route and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Orders placed, split by customer kind ("user", "guest")
pub static ORDERS_PLACED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("orders_placed_total", "Total number of orders placed").namespace(NAMESPACE),
        &["customer"],
    )
    .expect("Failed to create ORDERS_PLACED_TOTAL metric")
});

/// Payment webhooks by provider and outcome ("paid", "failed", "duplicate", "rejected")
pub static PAYMENT_WEBHOOKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("payment_webhooks_total", "Payment provider callbacks processed")
            .namespace(NAMESPACE),
        &["provider", "outcome"],
    )
    .expect("Failed to create PAYMENT_WEBHOOKS_TOTAL metric")
});

pub static CARTS_ABANDONED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("carts_abandoned_total", "Expired guest carts released").namespace(NAMESPACE),
    )
    .expect("Failed to create CARTS_ABANDONED_TOTAL metric")
});

/// Database connection pool stats
pub static DB_POOL_CONNECTIONS: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("db_pool_connections", "Database connection pool statistics")
            .namespace(NAMESPACE),
        &["state"], // "idle", "active", "max"
    )
    .expect("Failed to create DB_POOL_CONNECTIONS metric")
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(ORDERS_PLACED_TOTAL.clone()))
        .expect("Failed to register ORDERS_PLACED_TOTAL");
    registry
        .register(Box::new(PAYMENT_WEBHOOKS_TOTAL.clone()))
        .expect("Failed to register PAYMENT_WEBHOOKS_TOTAL");
    registry
        .register(Box::new(CARTS_ABANDONED_TOTAL.clone()))
        .expect("Failed to register CARTS_ABANDONED_TOTAL");
    registry
        .register(Box::new(DB_POOL_CONNECTIONS.clone()))
        .expect("Failed to register DB_POOL_CONNECTIONS");
}

/// Collect and encode all metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn record_order_placed(guest: bool) {
    ORDERS_PLACED_TOTAL
        .with_label_values(&[if guest { "guest" } else { "user" }])
        .inc();
}

pub fn record_payment_webhook(provider: &str, outcome: &str) {
    PAYMENT_WEBHOOKS_TOTAL
        .with_label_values(&[provider, outcome])
        .inc();
}

pub fn record_carts_abandoned(count: u64) {
    CARTS_ABANDONED_TOTAL.inc_by(count);
}

pub fn update_db_pool_stats(idle: u32, active: u32, max: u32) {
    DB_POOL_CONNECTIONS
        .with_label_values(&["idle"])
        .set(idle as f64);
    DB_POOL_CONNECTIONS
        .with_label_values(&["active"])
        .set(active as f64);
    DB_POOL_CONNECTIONS
        .with_label_values(&["max"])
        .set(max as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_http_requests() {
        record_http_request("GET", "/health", 200, 0.001);
        let metrics = gather_metrics().unwrap();
        assert!(metrics.contains("shop_server_http_requests_total"));
    }

    #[test]
    fn records_business_counters() {
        record_order_placed(true);
        record_payment_webhook("VNPAY", "paid");
        record_carts_abandoned(2);
        let metrics = gather_metrics().unwrap();
        assert!(metrics.contains("shop_server_orders_placed_total"));
        assert!(metrics.contains("shop_server_payment_webhooks_total"));
        assert!(metrics.contains("shop_server_carts_abandoned_total"));
    }
}
