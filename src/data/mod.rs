//! Recording model and JSON loading.

/// Reading recordings and picking named items out of them.
pub mod load;
/// Image sequences, vector fields, event sets and the recording that holds them.
pub mod model;
