use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf}
};

use tempfile::NamedTempFile;

use super::{BASELINE_VERSION, Baseline};
use crate::error::{AppResult, baseline_format_error, baseline_io_error};

/// Where baselines live
pub trait BaselineStore {
    /// `Ok(None)` when no baseline has been saved yet
    fn load(&self) -> AppResult<Option<Baseline>>;

    /// Replace the stored baseline
    fn save(&self, baseline: &Baseline) -> AppResult<()>;

    /// Where the baseline lives, for notices
    fn describe(&self) -> String;
}

/// Pretty-printed JSON file, replaced by write-then-rename
#[derive(Debug, Clone)]
pub struct JsonFileBaselineStore {
    path: PathBuf
}

impl JsonFileBaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into()
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }
}

impl BaselineStore for JsonFileBaselineStore {
    fn load(&self) -> AppResult<Option<Baseline>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(baseline_io_error(&self.display(), e))
        };
        let baseline: Baseline = serde_json::from_str(&content)
            .map_err(|e| baseline_format_error(&self.display(), e.to_string()))?;
        if baseline.version != BASELINE_VERSION {
            return Err(baseline_format_error(
                &self.display(),
                format!(
                    "unsupported version {} (expected {})",
                    baseline.version, BASELINE_VERSION
                )
            ));
        }
        tracing::debug!(path = %self.display(), metrics = baseline.len(), "loaded baseline");
        Ok(Some(baseline))
    }

    fn save(&self, baseline: &Baseline) -> AppResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from(".")
        };
        fs::create_dir_all(&dir).map_err(|e| baseline_io_error(&self.display(), e))?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| baseline_io_error(&self.display(), e))?;
        serde_json::to_writer_pretty(&mut tmp, baseline)
            .map_err(|e| baseline_io_error(&self.display(), io::Error::other(e)))?;
        tmp.write_all(b"\n")
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| baseline_io_error(&self.display(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| baseline_io_error(&self.display(), e.error))?;

        tracing::info!(path = %self.display(), metrics = baseline.len(), "baseline saved");
        Ok(())
    }

    fn describe(&self) -> String {
        self.display()
    }
}
