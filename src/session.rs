//! Interactive dashboard session.
//!
//! Holds the loaded dataset and the current at-risk threshold. A threshold
//! change is the only event that triggers recomputation, and it only
//! re-runs the at-risk query.

use crate::analysis::{at_risk_customers, clamp_threshold};
use crate::models::{AtRiskView, Dataset};
use std::sync::Arc;
use tracing::debug;

/// Parsed line of interactive input.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Re-filter at a new threshold.
    Threshold(f64),
    /// End the session.
    Quit,
    /// Nothing to do (blank line).
    Skip,
}

impl SessionCommand {
    /// Parse one line typed by the user.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();

        match line.to_lowercase().as_str() {
            "" => Ok(SessionCommand::Skip),
            "q" | "quit" | "exit" => Ok(SessionCommand::Quit),
            value => {
                let threshold: f64 = value
                    .parse()
                    .map_err(|_| format!("'{}' is not a number", line))?;

                if !(0.0..=1.0).contains(&threshold) {
                    return Err("Threshold must be between 0.0 and 1.0".to_string());
                }

                Ok(SessionCommand::Threshold(threshold))
            }
        }
    }
}

/// A dashboard bound to one loaded dataset.
#[derive(Debug, Clone)]
pub struct Session {
    dataset: Arc<Dataset>,
    threshold: f64,
    display_limit: usize,
}

impl Session {
    pub fn new(dataset: Arc<Dataset>, threshold: f64, display_limit: usize) -> Self {
        Self {
            dataset,
            threshold: clamp_threshold(threshold),
            display_limit,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// At-risk customers for the current threshold.
    pub fn at_risk(&self) -> AtRiskView {
        at_risk_customers(&self.dataset, self.threshold, self.display_limit)
    }

    /// Handle a threshold change and return the refreshed at-risk list.
    pub fn set_threshold(&mut self, threshold: f64) -> AtRiskView {
        self.threshold = clamp_threshold(threshold);
        debug!("Threshold changed to {:.2}", self.threshold);
        self.at_risk()
    }
}
