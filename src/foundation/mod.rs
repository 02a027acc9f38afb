//! Shared value types and the crate error.

pub mod core;
pub mod error;
