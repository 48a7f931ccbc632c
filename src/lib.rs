//! # Shop Server Library
//!
//! Backend for the Audio Tài Lộc audio equipment shop:
//! - Product catalog, inventory, carts and promotions
//! - Checkout, orders and online payments (VNPAY, MOMO, PAYOS)
//! - Installation and repair service bookings
//! - In-app notifications and Telegram staff alerts
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core business entities, repository traits and pricing rules
//! - **Application Layer**: Business logic services and DTOs
//! - **Infrastructure Layer**: Database, cache, payment and Telegram implementations
//! - **Presentation Layer**: HTTP handlers and middleware
//!
//! ## Module Structure
//!
//! ```text
//! shop_server/
//! +-- config/         Configuration management
//! +-- domain/         Entities, repository traits, domain services
//! +-- application/    Application services and DTOs
//! +-- infrastructure/ Postgres, Redis, payments, Telegram, metrics
//! +-- presentation/   HTTP routes, handlers and middleware
//! +-- shared/         Errors, pagination, slugs, validation
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
