//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL)
//! - Cache implementations (Redis)
//! - Payment gateways and Telegram alerts
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod metrics;
pub mod payments;
pub mod repositories;
pub mod telegram;
