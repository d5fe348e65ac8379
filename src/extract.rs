//! Statement extraction from source artifacts.
//!
//! Two kinds of artifacts are understood:
//!
//! - **SQL files** (`.sql`): split into top-level commands on `;`, ignoring
//!   terminators inside literals and comments.
//! - **Host source files** (anything else): string literals passed as the first
//!   argument of a recognized execute-style call (`execute`, `executemany`,
//!   `text` by default). A literal or a concatenation of literals is
//!   extracted; anything computed at runtime is reported as skipped.
//!
//! A malformed artifact (unterminated literal or comment) yields no statements
//! and one [`ExtractionWarning`]; the scan continues with the next artifact.
//!
//! # Example
//!
//! ```
//! use sql_quality_analyzer::extract::{Extractor, SourceArtifact};
//!
//! let artifacts = vec![SourceArtifact::new(
//!     "db/report.sql",
//!     "SELECT id FROM users;\nDELETE FROM sessions WHERE expired = 1;"
//! )];
//! let extractor = Extractor::new(artifacts);
//!
//! assert_eq!(extractor.statements().count(), 2);
//! // Restartable: a second pass yields the same sequence
//! assert_eq!(extractor.statements().count(), 2);
//! ```

mod source_file;
mod sql_file;
mod types;

use compact_str::CompactString;
use rayon::prelude::*;
pub use types::{
    ArtifactKind, Extracted, ExtractionOutput, ExtractionWarning, SkippedCandidate,
    SourceArtifact
};

use crate::statement::Statement;

/// Call names whose first argument is treated as SQL by default
pub const DEFAULT_CALL_NAMES: [&str; 3] = ["execute", "executemany", "text"];

/// Lazy, restartable statement extractor over a fixed set of artifacts
#[derive(Debug, Clone)]
pub struct Extractor {
    artifacts:  Vec<SourceArtifact>,
    call_names: Vec<CompactString>
}

impl Extractor {
    pub fn new(artifacts: Vec<SourceArtifact>) -> Self {
        Self {
            artifacts,
            call_names: DEFAULT_CALL_NAMES.iter().map(|&n| n.into()).collect()
        }
    }

    /// Override the recognized execute-style call names
    pub fn with_call_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>
    {
        self.call_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn artifacts(&self) -> &[SourceArtifact] {
        &self.artifacts
    }

    /// Iterate over every extraction event, artifact by artifact.
    ///
    /// Each call starts a fresh pass over the artifacts.
    pub fn iter(&self) -> impl Iterator<Item = Extracted> + '_ {
        self.artifacts
            .iter()
            .flat_map(|artifact| extract_artifact(artifact, &self.call_names))
    }

    /// Iterate over extracted statements only
    pub fn statements(&self) -> impl Iterator<Item = Statement> + '_ {
        self.iter().filter_map(|event| match event {
            Extracted::Statement(stmt) => Some(stmt),
            _ => None
        })
    }

    /// Extract all artifacts in parallel, keeping artifact order
    pub fn collect(&self) -> ExtractionOutput {
        let per_artifact: Vec<Vec<Extracted>> = self
            .artifacts
            .par_iter()
            .map(|artifact| extract_artifact(artifact, &self.call_names))
            .collect();
        let mut output = ExtractionOutput::default();
        for event in per_artifact.into_iter().flatten() {
            output.push(event);
        }
        output
    }
}

/// Extract one artifact. Never fails: problems become events.
pub fn extract_artifact(artifact: &SourceArtifact, call_names: &[CompactString]) -> Vec<Extracted> {
    let result = match artifact.kind() {
        ArtifactKind::Sql => sql_file::extract(artifact),
        ArtifactKind::Source => source_file::extract(artifact, call_names)
    };
    match result {
        Ok(events) => events,
        Err(warning) => {
            tracing::warn!(file = %warning.file, "{}", warning.message);
            vec![Extracted::Warning(warning)]
        }
    }
}
