//! Dashboard report generation.

pub mod generator;

pub use generator::{build_report, generate_at_risk_section, write_report, ReportOptions};
