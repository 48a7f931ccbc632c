//! Application Layer
//!
//! Use cases of the shop: checkout, carts, payments, bookings and the rest.
//! Services here depend on domain repository traits only, so handlers get
//! them wired to Postgres while unit tests wire them to mocks.

pub mod dto;
pub mod services;
