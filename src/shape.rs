//! Structural analysis of statements.
//!
//! Statements are parsed with [`sqlparser`] and reduced to a
//! [`StatementShape`]: the handful of facts rules and suggestions need
//! (wildcard projections, WHERE presence, LIKE patterns, wrapped columns,
//! `IN` list sizes, filter columns). Host-language placeholders such as
//! `%s` and `%(name)s` are rewritten to `?` first so parameterized
//! statements still parse.
//!
//! # Example
//!
//! ```
//! use sql_quality_analyzer::shape::{SqlDialect, analyze_sql};
//!
//! let shape = analyze_sql("SELECT * FROM users WHERE YEAR(created_at) = 2024", SqlDialect::Generic)
//!     .unwrap();
//!
//! assert_eq!(shape.tables, vec!["users"]);
//! assert_eq!(shape.wildcards.len(), 1);
//! assert_eq!(shape.non_sargable[0].wrapper, "YEAR");
//! ```

mod collect;
mod types;

use std::fmt;

use collect::Collector;
use serde::Deserialize;
use sqlparser::{
    dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect},
    parser::Parser,
    tokenizer::{Token, Tokenizer}
};
pub use types::{
    ColumnRef, ColumnVec, InListPredicate, LikePattern, NonSargablePredicate, OrEqualityChain,
    StatementShape, WildcardProjection
};

use crate::{error::format_sql_error, statement::Statement};

/// SQL dialect for parsing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum SqlDialect {
    #[default]
    Generic,
    MySql,
    #[serde(alias = "postgres")]
    PostgreSql,
    Sqlite
}

impl SqlDialect {
    /// Convert to sqlparser dialect for parsing
    pub fn into_parser_dialect(self) -> Box<dyn Dialect> {
        match self {
            Self::Generic => Box::new(GenericDialect {}),
            Self::MySql => Box::new(MySqlDialect {}),
            Self::PostgreSql => Box::new(PostgreSqlDialect {}),
            Self::Sqlite => Box::new(SQLiteDialect {})
        }
    }
}

/// A statement the parser could not understand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError {
    pub message: String
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ShapeError {}

/// Analyze an extracted statement
pub fn analyze(statement: &Statement, dialect: SqlDialect) -> Result<StatementShape, ShapeError> {
    analyze_sql(statement.normalized_text(), dialect)
}

/// Analyze SQL text. Only the first statement is considered.
pub fn analyze_sql(sql: &str, dialect: SqlDialect) -> Result<StatementShape, ShapeError> {
    let sql = rewrite_placeholders(sql);
    let parser_dialect = dialect.into_parser_dialect();
    let statements = Parser::parse_sql(parser_dialect.as_ref(), &sql).map_err(|e| ShapeError {
        message: format_sql_error("unparseable statement", &e.to_string())
    })?;
    let Some(first) = statements.first() else {
        return Err(ShapeError {
            message: "unparseable statement: empty input".to_string()
        });
    };

    let mut collector = Collector::default();
    collector.statement(first);
    Ok(collector.finish())
}

/// Replace `%s` and `%(name)s` outside quoted text with `?`
pub fn rewrite_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    let mut chars = sql.char_indices();

    while let Some((idx, c)) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                out.push(c);
            }
            None if matches!(c, '\'' | '"' | '`') => {
                quote = Some(c);
                out.push(c);
            }
            None if c == '%' => {
                let rest = &sql[idx + 1..];
                if rest.starts_with('s') {
                    out.push('?');
                    chars.next();
                } else if rest.starts_with('(')
                    && let Some(close) = rest.find(")s")
                    && rest[1..close].chars().all(|ch| ch.is_alphanumeric() || ch == '_')
                {
                    out.push('?');
                    for _ in 0..rest[..close + 2].chars().count() {
                        chars.next();
                    }
                } else {
                    out.push(c);
                }
            }
            None => out.push(c)
        }
    }
    out
}

/// Whether the statement carries bind placeholders (`%s`, `%(name)s`, `?`,
/// `$1`, `:name`) whose values only exist at run time
pub fn has_placeholders(sql: &str) -> bool {
    if rewrite_placeholders(sql) != sql {
        return true;
    }
    let dialect = GenericDialect {};
    let Ok(tokens) = Tokenizer::new(&dialect, sql).tokenize() else {
        return false;
    };
    tokens.iter().enumerate().any(|(i, token)| match token {
        Token::Placeholder(_) | Token::Question => true,
        Token::Colon => {
            let named = matches!(tokens.get(i + 1), Some(Token::Word(_)));
            let after_word = i > 0 && matches!(tokens.get(i - 1), Some(Token::Word(_)));
            named && !after_word
        }
        _ => false
    })
}
