//! Integration Tests Entry Point
//!
//! Tests are organized by module:
//! - `api/` - HTTP surface tests against routers that need no database
//! - `repositories/` - Postgres repository tests (need `DATABASE_URL`, ignored by default)
//! - `common/` - Shared test utilities

mod api;
mod common;
mod repositories;
