//! Shared Utilities
//!
//! Common utilities used across all layers.

pub mod error;
pub mod pagination;
pub mod slug;
pub mod validation;
