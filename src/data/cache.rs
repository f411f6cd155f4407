//! Session-scoped dataset memoisation.

use super::loader::{load_dataset, LoadError};
use crate::models::Dataset;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Memoises loaded datasets by source path.
///
/// Owned by whoever drives the session; entries live until the cache is
/// dropped. Failed loads are not remembered.
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: HashMap<PathBuf, Arc<Dataset>>,
    show_progress: bool,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a spinner while a file is being read.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Return the cached dataset for `path`, loading it on first use.
    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<Dataset>, LoadError> {
        if let Some(dataset) = self.entries.get(path) {
            debug!("Dataset cache hit: {}", path.display());
            return Ok(Arc::clone(dataset));
        }

        let dataset = Arc::new(load_dataset(path, self.show_progress)?);
        self.entries.insert(path.to_path_buf(), Arc::clone(&dataset));

        Ok(dataset)
    }

    /// Number of datasets held.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
