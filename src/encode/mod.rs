//! Frame sinks.
//!
//! Sinks consume rendered frames in timeline order.

pub mod sink;
