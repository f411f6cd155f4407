//! Data models for the churn dashboard.
//!
//! This module contains the core data structures shared by the loader,
//! the aggregation engine and the report generator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One row of the churn predictions file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// Customer identifier, kept verbatim from the source.
    #[serde(rename = "Customer ID")]
    pub customer_id: String,
    /// Observed churn outcome.
    #[serde(deserialize_with = "de::flag")]
    pub is_churned: bool,
    /// Churn outcome predicted by the model.
    #[serde(deserialize_with = "de::flag")]
    pub predicted_churn: bool,
    /// Predicted probability of churning, in [0, 1].
    pub churn_probability: f64,
    /// Days since the last transaction.
    #[serde(rename = "Recency")]
    pub recency: f64,
    /// Number of transactions.
    #[serde(rename = "Frequency", deserialize_with = "de::count")]
    pub frequency: u64,
    /// Spend amount.
    #[serde(rename = "Monetary")]
    pub monetary: f64,
    /// Days since the first transaction.
    #[serde(rename = "Tenure")]
    pub tenure: f64,
    /// Grouped primary country label.
    #[serde(rename = "PrimaryCountry_Grouped_Original")]
    pub country_group: String,
}

impl CustomerRecord {
    /// Check the value constraints that the CSV types alone cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if !self.churn_probability.is_finite() || !(0.0..=1.0).contains(&self.churn_probability)
        {
            return Err(format!(
                "churn_probability {} is outside [0, 1]",
                self.churn_probability
            ));
        }

        for (name, value) in [
            ("Recency", self.recency),
            ("Monetary", self.monetary),
            ("Tenure", self.tenure),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number, got {}", name, value));
            }
        }

        Ok(())
    }
}

/// Loaded, immutable churn predictions.
///
/// A `Dataset` always holds at least one record, so every aggregate over it
/// is well defined.
#[derive(Debug, Clone)]
pub struct Dataset {
    source: PathBuf,
    records: Vec<CustomerRecord>,
}

impl Dataset {
    /// Wrap loaded records. Returns `None` when there are no records.
    pub fn new(source: impl Into<PathBuf>, records: Vec<CustomerRecord>) -> Option<Self> {
        if records.is_empty() {
            return None;
        }

        Some(Self {
            source: source.into(),
            records,
        })
    }

    /// Path the dataset was read from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// All records in file order.
    pub fn records(&self) -> &[CustomerRecord] {
        &self.records
    }

    /// Number of rows.
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

/// Headline churn figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewMetrics {
    /// Number of distinct customer IDs.
    pub total_customers: usize,
    /// Observed churn rate, as a percentage.
    pub actual_churn_rate: f64,
    /// Predicted churn rate, as a percentage.
    pub predicted_churn_rate: f64,
    /// Number of rows predicted to churn.
    pub predicted_churners: usize,
}

/// Churn rate for one country group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryChurn {
    pub country: String,
    /// Observed churn rate, as a percentage.
    pub churn_rate: f64,
}

/// Relative influence of one feature on churn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Customers at or above a churn probability threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtRiskView {
    /// Threshold actually applied (after clamping).
    pub threshold: f64,
    /// Number of matching customers before truncation.
    pub total_matches: usize,
    /// Matching customers, highest probability first, truncated for display.
    pub customers: Vec<CustomerRecord>,
}

impl AtRiskView {
    /// Whether the display list was cut short.
    pub fn is_truncated(&self) -> bool {
        self.customers.len() < self.total_matches
    }
}

/// Output format for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Markdown => write!(f, "markdown"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}

/// Metadata about a rendered dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the predictions file.
    pub data_source: String,
    /// When the dashboard was generated.
    pub generated_at: DateTime<Utc>,
    /// Number of rows loaded.
    pub rows_loaded: usize,
    /// Threshold used for the at-risk list.
    pub threshold: f64,
    /// Time spent loading and aggregating, in seconds.
    pub duration_seconds: f64,
}

/// The complete dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    pub metadata: ReportMetadata,
    pub overview: OverviewMetrics,
    pub feature_importance: Vec<FeatureImportance>,
    pub churn_by_country: Vec<CountryChurn>,
    pub at_risk: AtRiskView,
    /// Retention guidance shown at the bottom of the dashboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<String>,
}

mod de {
    //! Lenient field parsers for columns written by dataframe tooling,
    //! which often emits `1.0` for a flag or a count.

    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Number(f64),
        Text(String),
    }

    pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Ok(b),
            Raw::Number(n) if n == 1.0 => Ok(true),
            Raw::Number(n) if n == 0.0 => Ok(false),
            Raw::Number(n) => Err(D::Error::custom(format!("invalid flag value '{}'", n))),
            Raw::Text(s) => match s.trim().to_lowercase().as_str() {
                "1" | "1.0" | "true" => Ok(true),
                "0" | "0.0" | "false" => Ok(false),
                other => Err(D::Error::custom(format!("invalid flag value '{}'", other))),
            },
        }
    }

    pub fn count<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => n,
            Raw::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| D::Error::custom(format!("invalid count '{}'", s)))?,
            Raw::Bool(b) => return Err(D::Error::custom(format!("invalid count '{}'", b))),
        };

        if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
            Ok(value as u64)
        } else {
            Err(D::Error::custom(format!("invalid count '{}'", value)))
        }
    }
}
