//! Analysis modules.
//!
//! The aggregation engine behind every dashboard section.

pub mod aggregator;

pub use aggregator::*;
