//! Known table definitions used as suggestion context.
//!
//! Tables come from `CREATE TABLE` / `CREATE INDEX` statements (schema files
//! named in the policy, or DDL found among the scanned statements) and from
//! inline column lists in the policy. The column set lets wildcard rewrites
//! name explicit columns; known indexes keep the suggestion generator from
//! proposing an index that already exists.
//!
//! # Example
//!
//! ```
//! use sql_quality_analyzer::{schema::Schema, shape::SqlDialect};
//!
//! let sql = r#"
//!     CREATE TABLE users (
//!         id INT PRIMARY KEY,
//!         email VARCHAR(255) NOT NULL
//!     );
//!     CREATE INDEX idx_email ON users(email);
//! "#;
//!
//! let schema = Schema::parse(sql, SqlDialect::Generic).unwrap();
//!
//! assert_eq!(schema.columns_of("USERS"), Some(vec!["id", "email"]));
//! assert!(schema.has_index_prefix("users", &["email"]));
//! ```

use std::collections::BTreeMap;

use sqlparser::parser::Parser;

use crate::{
    error::{AppResult, schema_parse_error},
    shape::SqlDialect
};

/// Complete information about a database table.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name:    String,
    /// Ordered list of columns
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>
}

/// Column metadata extracted from CREATE TABLE.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name:       String,
    /// SQL data type (e.g., "INT", "VARCHAR(255)"); empty for inline policy columns
    pub data_type:  String,
    pub is_primary: bool
}

/// Index metadata extracted from CREATE INDEX or table constraints.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    /// Index name (may be empty for anonymous indexes)
    pub name:    String,
    /// Ordered list of indexed columns
    pub columns: Vec<String>
}

/// Known tables keyed by lowercase name.
///
/// Tables are stored in a `BTreeMap` for deterministic iteration order.
#[derive(Debug, Default, Clone)]
pub struct Schema {
    pub tables: BTreeMap<String, TableInfo>
}

impl Schema {
    /// Parse DDL text.
    ///
    /// # Errors
    ///
    /// Returns error if SQL parsing fails
    pub fn parse(sql: &str, dialect: SqlDialect) -> AppResult<Self> {
        let mut schema = Self::default();
        schema
            .absorb(sql, dialect)
            .map_err(|e| schema_parse_error(e.to_string()))?;
        Ok(schema)
    }

    /// Merge DDL into this schema; non-DDL statements are ignored.
    pub fn absorb(&mut self, sql: &str, dialect: SqlDialect) -> Result<(), sqlparser::parser::ParserError> {
        let parser_dialect = dialect.into_parser_dialect();
        let statements = Parser::parse_sql(parser_dialect.as_ref(), sql)?;
        for stmt in statements {
            self.process_statement(stmt);
        }
        Ok(())
    }

    /// Register a table from a plain column list
    pub fn add_table(&mut self, name: &str, columns: &[String]) {
        let table = self.tables.entry(name.to_lowercase()).or_insert_with(|| TableInfo {
            name:    name.to_string(),
            columns: Vec::new(),
            indexes: Vec::new()
        });
        for column in columns {
            if !table.columns.iter().any(|c| c.name.eq_ignore_ascii_case(column)) {
                table.columns.push(ColumnInfo {
                    name:       column.clone(),
                    data_type:  String::new(),
                    is_primary: false
                });
            }
        }
    }

    fn process_statement(&mut self, stmt: sqlparser::ast::Statement) {
        use sqlparser::ast::Statement;
        match stmt {
            Statement::CreateTable(create) => {
                let table_name = create.name.to_string();
                let mut columns = Vec::new();
                let mut indexes = Vec::new();
                for column in create.columns {
                    let is_primary = column
                        .options
                        .iter()
                        .any(|opt| matches!(opt.option, sqlparser::ast::ColumnOption::PrimaryKey(_)));
                    if is_primary {
                        indexes.push(IndexInfo {
                            name:    "PRIMARY".to_string(),
                            columns: vec![column.name.value.clone()]
                        });
                    }
                    columns.push(ColumnInfo {
                        name: column.name.value.clone(),
                        data_type: column.data_type.to_string(),
                        is_primary
                    });
                }
                for constraint in create.constraints {
                    use sqlparser::ast::TableConstraint;

                    let (name, idx_cols) = match constraint {
                        TableConstraint::PrimaryKey(pk) => (Some("PRIMARY".to_string()), pk.columns),
                        TableConstraint::Unique(unique) => (unique.name.map(|n| n.to_string()), unique.columns),
                        TableConstraint::Index(index) => (index.name.map(|n| n.to_string()), index.columns),
                        _ => continue
                    };
                    indexes.push(IndexInfo {
                        name:    name.unwrap_or_default(),
                        columns: idx_cols.iter().map(|c| c.to_string()).collect()
                    });
                }
                self.tables.insert(
                    table_name.to_lowercase(),
                    TableInfo {
                        name: table_name,
                        columns,
                        indexes
                    }
                );
            }
            Statement::CreateIndex(create_index) => {
                let table_name = create_index.table_name.to_string().to_lowercase();
                if let Some(table) = self.tables.get_mut(&table_name) {
                    table.indexes.push(IndexInfo {
                        name:    create_index.name.map(|n| n.to_string()).unwrap_or_default(),
                        columns: create_index.columns.iter().map(|c| c.to_string()).collect()
                    });
                }
            }
            _ => {}
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(&name.to_lowercase())
    }

    /// Ordered column names of a known table
    pub fn columns_of(&self, table: &str) -> Option<Vec<&str>> {
        self.table(table)
            .filter(|t| !t.columns.is_empty())
            .map(|t| t.columns.iter().map(|c| c.name.as_str()).collect())
    }

    /// Whether an existing index starts with exactly these columns
    pub fn has_index_prefix(&self, table: &str, columns: &[&str]) -> bool {
        let Some(table) = self.table(table) else {
            return false;
        };
        table.indexes.iter().any(|index| {
            index.columns.len() >= columns.len()
                && index
                    .columns
                    .iter()
                    .zip(columns)
                    .all(|(indexed, wanted)| index_column_name(indexed).eq_ignore_ascii_case(wanted))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Strip sort order from an index column (`email DESC` -> `email`)
fn index_column_name(column: &str) -> &str {
    column.split_whitespace().next().unwrap_or(column)
}
