//! # Domain Services
//!
//! Rules that span several entities.
//!
//! - **PricingPolicy**: shipping and order totals
//! - **BookingSchedule**: booking slot and date validation

mod booking_schedule;
mod pricing;

pub use booking_schedule::{BookingSchedule, ScheduleError, BOOKING_SLOTS};
pub use pricing::{PriceQuote, PricingPolicy};
