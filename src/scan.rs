//! Source tree scanning.
//!
//! Walks a repository root, keeps files matching the include globs and not
//! matching the exclude globs, and reads them into [`SourceArtifact`]s.
//! Globs are matched against `/`-separated paths relative to the root. A
//! `**/` prefix also matches files directly under the root. Hidden
//! directories are not entered.

use std::{fs, path::Path};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::{DirEntry, WalkDir};

use crate::{
    config::TargetsConfig,
    error::{AppResult, config_error},
    extract::{ExtractionWarning, SourceArtifact}
};

/// Artifacts read from disk plus files that could not be read
#[derive(Debug, Default)]
pub struct ScanOutput {
    pub artifacts: Vec<SourceArtifact>,
    pub warnings:  Vec<ExtractionWarning>
}

fn build_globset(patterns: &[String]) -> AppResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| config_error(format!("Invalid glob pattern '{}': {}", pattern, e)))?;
        builder.add(glob);
        if let Some(rest) = pattern.strip_prefix("**/")
            && let Ok(top_level) = Glob::new(rest)
        {
            builder.add(top_level);
        }
    }
    builder
        .build()
        .map_err(|e| config_error(format!("Invalid glob set: {}", e)))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

/// Collect artifacts under `root` in path order
pub fn collect_artifacts(root: &Path, targets: &TargetsConfig) -> AppResult<ScanOutput> {
    let include = build_globset(&targets.include)?;
    let exclude = build_globset(&targets.exclude)?;
    let mut output = ScanOutput::default();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let file = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                output.warnings.push(ExtractionWarning {
                    file:    file.into(),
                    line:    None,
                    message: format!("cannot read directory entry: {}", e)
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !include.is_match(&relative) || exclude.is_match(&relative) {
            continue;
        }

        match fs::read_to_string(entry.path()) {
            Ok(content) => output.artifacts.push(SourceArtifact::new(relative, content)),
            Err(e) => {
                tracing::warn!(file = %relative, error = %e, "skipping unreadable file");
                output.warnings.push(ExtractionWarning {
                    file:    relative.into(),
                    line:    None,
                    message: format!("cannot read file: {}", e)
                });
            }
        }
    }

    tracing::debug!(
        root = %root.display(),
        artifacts = output.artifacts.len(),
        "scanned source tree"
    );
    Ok(output)
}
