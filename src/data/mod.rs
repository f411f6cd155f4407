//! Data source handling.
//!
//! Reading the churn predictions file and memoising loaded datasets
//! for the lifetime of a session.

pub mod cache;
pub mod loader;

pub use cache::DatasetCache;
