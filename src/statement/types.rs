use std::fmt;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use sqlparser::{ast, dialect::GenericDialect, parser::Parser};

use super::normalize::normalize_sql;
use crate::shape::rewrite_placeholders;

/// Stable statement identity: hash of normalized text and source location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatementId(CompactString);

impl StatementId {
    const HEX_LEN: usize = 16;

    /// Compute the identity of a normalized statement at a location
    pub fn compute(normalized_text: &str, location: &SourceLocation) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(normalized_text.as_bytes());
        hasher.update(b"\0");
        hasher.update(location.file.as_bytes());
        hasher.update(b"\0");
        hasher.update(location.line.to_string().as_bytes());
        let hex = hasher.finalize().to_hex();
        Self(CompactString::from(&hex.as_str()[..Self::HEX_LEN]))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StatementId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

/// Where a statement was found
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: CompactString,
    /// One-based line of the first character of the statement
    pub line: usize
}

impl SourceLocation {
    pub fn new(file: impl Into<CompactString>, line: usize) -> Self {
        Self {
            file: file.into(),
            line
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Statement kind, detected from the parsed statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other
}

impl StatementKind {
    /// Detect the kind from normalized text.
    ///
    /// A `WITH` clause takes the kind of the statement it prefixes, so
    /// `WITH old AS (...) DELETE FROM t` is a delete. Text holding more than
    /// one statement is [`StatementKind::Other`]. When the text does not
    /// parse, the leading keyword decides, and only a lone `SELECT` is
    /// trusted to be read-only.
    pub fn detect(normalized_text: &str) -> Self {
        let sql = rewrite_placeholders(normalized_text);
        match Parser::parse_sql(&GenericDialect {}, &sql) {
            Ok(parsed) => match parsed.as_slice() {
                [only] => Self::of_statement(only),
                _ => Self::Other
            },
            Err(_) => Self::from_keyword(&sql)
        }
    }

    fn of_statement(stmt: &ast::Statement) -> Self {
        match stmt {
            ast::Statement::Query(query) => Self::of_set_expr(&query.body),
            ast::Statement::Insert(_) => Self::Insert,
            ast::Statement::Update(_) => Self::Update,
            ast::Statement::Delete(_) => Self::Delete,
            _ => Self::Other
        }
    }

    fn of_set_expr(body: &ast::SetExpr) -> Self {
        match body {
            ast::SetExpr::Select(_)
            | ast::SetExpr::SetOperation {
                ..
            }
            | ast::SetExpr::Values(_) => Self::Select,
            ast::SetExpr::Query(query) => Self::of_set_expr(&query.body),
            ast::SetExpr::Insert(stmt) | ast::SetExpr::Update(stmt) | ast::SetExpr::Delete(stmt) => {
                Self::of_statement(stmt)
            }
            _ => Self::Other
        }
    }

    fn from_keyword(sql: &str) -> Self {
        let first = sql
            .trim_start_matches(|c: char| c == '(' || c.is_whitespace())
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or_default();
        match first.to_ascii_lowercase().as_str() {
            "select" if !sql.contains(';') => Self::Select,
            "insert" | "replace" => Self::Insert,
            "update" => Self::Update,
            "delete" => Self::Delete,
            _ => Self::Other
        }
    }

    pub fn is_mutation(self) -> bool {
        matches!(self, Self::Update | Self::Delete)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Other => write!(f, "OTHER")
        }
    }
}

/// A SQL statement with provenance. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    id:              StatementId,
    raw_text:        String,
    normalized_text: String,
    location:        SourceLocation,
    kind:            StatementKind
}

impl Statement {
    /// Build a statement from raw text found at `location`
    pub fn new(raw_text: impl Into<String>, location: SourceLocation) -> Self {
        let raw_text = raw_text.into();
        let normalized_text = normalize_sql(&raw_text);
        let kind = StatementKind::detect(&normalized_text);
        let id = StatementId::compute(&normalized_text, &location);
        Self {
            id,
            raw_text,
            normalized_text,
            location,
            kind
        }
    }

    pub fn id(&self) -> &StatementId {
        &self.id
    }

    /// Text as written in the source, for reporting
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Text used for matching: comments stripped, whitespace collapsed,
    /// keywords lowercased
    pub fn normalized_text(&self) -> &str {
        &self.normalized_text
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }
}
