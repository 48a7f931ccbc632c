//! # Domain Layer
//!
//! Business rules of the shop, independent of HTTP, SQL and Redis.
//!
//! - **entities**: domain types and their repository traits
//! - **services**: rules spanning several entities (pricing, booking schedule)

pub mod entities;
pub mod services;

pub use entities::*;
