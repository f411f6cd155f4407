//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::ReportFormat;
use clap::Parser;
use std::path::PathBuf;

/// ChurnLens - customer churn insights dashboard
///
/// Reads precomputed churn predictions and renders overall churn metrics,
/// key churn drivers, churn by country group and the at-risk customer list.
///
/// Examples:
///   churnlens
///   churnlens --data predictions.csv --threshold 0.7
///   churnlens --format json --output dashboard.json
///   churnlens --interactive
///   churnlens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Churn predictions CSV to load
    ///
    /// Defaults to data/processed/customer_churn_predictions.csv or the
    /// path set in .churnlens.toml.
    #[arg(short, long, value_name = "FILE", env = "CHURNLENS_DATA")]
    pub data: Option<PathBuf>,

    /// Churn probability threshold for the at-risk list (0.0 - 1.0)
    ///
    /// Customers at or above this probability are listed. Default: 0.5.
    #[arg(short, long, value_name = "P")]
    pub threshold: Option<f64>,

    /// Output file path for the dashboard
    ///
    /// Default: churn_dashboard.md
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<ReportFormat>,

    /// Maximum number of at-risk customers to list
    ///
    /// The reported count always covers every matching customer.
    #[arg(long, value_name = "COUNT")]
    pub display_limit: Option<usize>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .churnlens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Keep the session open and re-filter at-risk customers
    ///
    /// After the dashboard is written, type a threshold per line to see the
    /// refreshed at-risk list. Type q to quit.
    #[arg(short, long)]
    pub interactive: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .churnlens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(threshold) = self.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err("Threshold must be between 0.0 and 1.0".to_string());
            }
        }

        if self.display_limit == Some(0) {
            return Err("Display limit must be at least 1".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref data) = self.data {
            if data.is_dir() {
                return Err(format!("Data path is a directory: {}", data.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `--quiet` wins over `verbose = true` from the config file.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
