use std::{collections::BTreeMap, fmt};

use compact_str::CompactString;
use serde::Serialize;
use smallvec::SmallVec;

/// Small column lists (filters rarely name more than a handful of columns)
pub type ColumnVec = SmallVec<[ColumnRef; 4]>;

/// A column reference, with its table resolved when the statement makes it
/// unambiguous
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ColumnRef {
    pub table: Option<CompactString>,
    pub name:  CompactString
}

impl ColumnRef {
    pub fn new(table: Option<&str>, name: &str) -> Self {
        Self {
            table: table.map(Into::into),
            name:  name.into()
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.name),
            None => f.write_str(&self.name)
        }
    }
}

/// `*` or `table.*` in a projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WildcardProjection {
    /// Projection as written
    pub text:  CompactString,
    /// Table the wildcard expands, when qualified or when only one table is read
    pub table: Option<CompactString>
}

/// Characters that match anything in a LIKE pattern
pub(crate) const LIKE_WILDCARDS: [char; 2] = ['%', '_'];

/// `col LIKE 'pattern'` with a pattern that starts with a literal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikePattern {
    pub column:  Option<ColumnRef>,
    pub pattern: String,
    pub negated: bool
}

impl LikePattern {
    /// `%` or `_` first, so no index prefix can be used
    pub fn has_leading_wildcard(&self) -> bool {
        self.pattern.starts_with(LIKE_WILDCARDS)
    }
}

/// A column hidden behind a function call, cast or arithmetic in a comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NonSargablePredicate {
    pub column:    ColumnRef,
    /// Function name (`YEAR`, `LOWER`, ...) or operator (`+`, `*`, ...)
    pub wrapper:   CompactString,
    /// The comparison as written
    pub predicate: String
}

/// `expr IN (v1, v2, ...)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InListPredicate {
    pub column: Option<ColumnRef>,
    pub size:   usize
}

/// `col = 'a' OR col = 'b' OR col = 'c'`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrEqualityChain {
    pub column:  ColumnRef,
    /// Column as written in the statement
    pub written: String,
    /// Compared literals as written, in order
    pub values:  Vec<String>
}

/// Structural facts about one statement used by rules and suggestions.
///
/// Built once per statement and shared through the shape cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatementShape {
    /// Base tables read or written, in order of appearance (CTE names excluded)
    pub tables:          Vec<CompactString>,
    pub wildcards:       Vec<WildcardProjection>,
    /// Whether the top-level statement has a WHERE clause
    pub has_where:       bool,
    /// Top-level WHERE clause text when it always evaluates to true
    pub where_tautology: Option<String>,
    pub like_patterns:   Vec<LikePattern>,
    pub non_sargable:    Vec<NonSargablePredicate>,
    pub in_lists:        Vec<InListPredicate>,
    /// Equality chains that could be an `IN` list
    pub or_chains:       Vec<OrEqualityChain>,
    /// Whether any query level pages with OFFSET
    pub has_offset:      bool,
    /// Columns in equality, `IN` or prefix-`LIKE` conditions, deduplicated,
    /// in order of appearance
    pub filter_columns:  ColumnVec,
    pub order_columns:   ColumnVec,
    pub group_columns:   ColumnVec,
    /// Table aliases to the base tables they name
    pub aliases:         BTreeMap<CompactString, CompactString>
}

impl StatementShape {
    pub fn leading_wildcard_likes(&self) -> impl Iterator<Item = &LikePattern> {
        self.like_patterns
            .iter()
            .filter(|like| !like.negated && like.has_leading_wildcard())
    }

    /// Base table behind an alias, or `name` itself when it is no alias.
    /// Execution plans report tables by alias.
    pub fn resolve_table<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases
            .get(name)
            .or_else(|| {
                self.aliases
                    .iter()
                    .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
                    .map(|(_, table)| table)
            })
            .map_or(name, CompactString::as_str)
    }

    /// Table for unqualified columns, if the statement reads exactly one
    pub fn sole_table(&self) -> Option<&str> {
        match self.tables.as_slice() {
            [only] => Some(only.as_str()),
            _ => None
        }
    }
}
