//! Turning one frame of data into a backend-agnostic draw list.

pub mod compositor;
pub mod plan;
