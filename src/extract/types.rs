use std::path::Path;

use compact_str::CompactString;
use serde::Serialize;

use crate::statement::{SourceLocation, Statement};

/// File contents tagged with their origin
#[derive(Debug, Clone)]
pub struct SourceArtifact {
    pub path:    CompactString,
    pub content: String
}

impl SourceArtifact {
    pub fn new(path: impl Into<CompactString>, content: impl Into<String>) -> Self {
        Self {
            path:    path.into(),
            content: content.into()
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        let is_sql = Path::new(self.path.as_str())
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"));
        if is_sql { ArtifactKind::Sql } else { ArtifactKind::Source }
    }
}

/// How an artifact is scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Raw SQL split on terminators
    Sql,
    /// Host-language code scanned for execute-style calls
    Source
}

/// Non-fatal, per-artifact extraction problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionWarning {
    pub file:    CompactString,
    pub line:    Option<usize>,
    pub message: String
}

/// An execute-style call whose argument is built at runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCandidate {
    pub location: SourceLocation,
    pub call:     CompactString,
    pub reason:   String
}

/// One item of the extraction sequence
#[derive(Debug, Clone)]
pub enum Extracted {
    Statement(Statement),
    Skipped(SkippedCandidate),
    Warning(ExtractionWarning)
}

/// Materialized extraction results, in artifact order
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutput {
    pub statements: Vec<Statement>,
    pub skipped:    Vec<SkippedCandidate>,
    pub warnings:   Vec<ExtractionWarning>
}

impl ExtractionOutput {
    pub fn push(&mut self, event: Extracted) {
        match event {
            Extracted::Statement(stmt) => self.statements.push(stmt),
            Extracted::Skipped(skip) => self.skipped.push(skip),
            Extracted::Warning(warning) => self.warnings.push(warning)
        }
    }
}
