//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.churnlens.toml` files.

use crate::models::ReportFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".churnlens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Data source settings.
    #[serde(default)]
    pub data: DataConfig,

    /// Dashboard settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> PathBuf {
    PathBuf::from("churn_dashboard.md")
}

/// Where the predictions come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Path of the churn predictions CSV.
    #[serde(default = "default_data_path")]
    pub path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
        }
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/processed/customer_churn_predictions.csv")
}

/// Dashboard behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Initial churn probability threshold for the at-risk list.
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,

    /// Maximum at-risk customers listed.
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,

    /// Maximum features shown in the drivers chart.
    #[serde(default = "default_feature_chart_limit")]
    pub feature_chart_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_threshold(),
            display_limit: default_display_limit(),
            feature_chart_limit: default_feature_chart_limit(),
        }
    }
}

fn default_threshold() -> f64 {
    0.5
}

fn default_display_limit() -> usize {
    crate::analysis::DISPLAY_LIMIT
}

fn default_feature_chart_limit() -> usize {
    10
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format.
    #[serde(default)]
    pub format: ReportFormat,

    /// Append the retention insights call-out.
    #[serde(default = "default_true")]
    pub include_insights: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::default(),
            include_insights: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref data) = args.data {
            self.data.path = data.clone();
        }
        if let Some(ref output) = args.output {
            self.general.output = output.clone();
        }
        if let Some(threshold) = args.threshold {
            self.dashboard.default_threshold = threshold;
        }
        if let Some(limit) = args.display_limit {
            self.dashboard.display_limit = limit;
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check values that may have come from a hand-edited file.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.dashboard.default_threshold) {
            return Err("Threshold must be between 0.0 and 1.0".to_string());
        }
        if self.dashboard.display_limit == 0 {
            return Err("Display limit must be at least 1".to_string());
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
