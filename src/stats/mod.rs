//! Snapshot model, two-generation storage and the diff/rate engine.

pub mod model;
pub mod rates;
pub mod store;
