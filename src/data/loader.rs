//! Churn predictions loader.
//!
//! Reads the whole CSV into memory. A load either yields a non-empty
//! [`Dataset`] or a [`LoadError`]; there is no partially loaded state.

use crate::models::{CustomerRecord, Dataset};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Columns that must be present in the header row.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "Customer ID",
    "is_churned",
    "predicted_churn",
    "churn_probability",
    "Recency",
    "Frequency",
    "Monetary",
    "Tenure",
    "PrimaryCountry_Grouped_Original",
];

/// Why a dataset could not be produced.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("'{}' not found", file_name(.path))]
    SourceNotFound { path: PathBuf },

    #[error("{}: {reason}", .path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("{} contains no customer rows", .path.display())]
    SourceEmpty { path: PathBuf },
}

impl LoadError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::SourceNotFound { .. })
    }

    /// Message shown to the user before the session halts.
    pub fn user_message(&self) -> String {
        match self {
            LoadError::SourceNotFound { path } => format!(
                "Error: '{}' not found. Please ensure the feature engineering and prediction steps were run.",
                file_name(path)
            ),
            other => format!("Error loading customer churn predictions data: {}", other),
        }
    }

    fn unreadable(path: &Path, reason: impl Into<String>) -> Self {
        LoadError::SourceUnreadable {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load the churn predictions file at `path`, optionally showing a spinner.
pub fn load_dataset(path: &Path, show_progress: bool) -> Result<Dataset, LoadError> {
    info!("Loading churn predictions from {}", path.display());

    let spinner = if show_progress {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Loading {}", file_name(path)));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let result = read_records(path);

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let records = result?;
    debug!("Parsed {} rows from {}", records.len(), path.display());

    Dataset::new(path, records).ok_or_else(|| LoadError::SourceEmpty {
        path: path.to_path_buf(),
    })
}

fn read_records(path: &Path) -> Result<Vec<CustomerRecord>, LoadError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LoadError::SourceNotFound {
            path: path.to_path_buf(),
        },
        _ => LoadError::unreadable(path, e.to_string()),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| LoadError::unreadable(path, e.to_string()))?
        .clone();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();

    if !missing.is_empty() {
        return Err(LoadError::unreadable(
            path,
            format!("missing required columns: {}", missing.join(", ")),
        ));
    }

    let mut records = Vec::new();

    for (index, row) in reader.deserialize::<CustomerRecord>().enumerate() {
        let row_number = index + 1;
        let record =
            row.map_err(|e| LoadError::unreadable(path, format!("row {}: {}", row_number, e)))?;

        record
            .validate()
            .map_err(|reason| LoadError::unreadable(path, format!("row {}: {}", row_number, reason)))?;

        records.push(record);
    }

    Ok(records)
}
