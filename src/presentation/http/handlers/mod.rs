//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints. Handlers build their services
//! from `AppState` on every request; repositories only hold a pool clone.

pub mod auth;
pub mod bookings;
pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod health;
pub mod inventory;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod promotions;
pub mod services;
pub mod users;
