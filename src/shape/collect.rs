mod expr;
mod set_expr;
mod table;

use std::collections::{HashMap, HashSet};

use compact_str::CompactString;
use indexmap::IndexSet;

use super::types::{
    ColumnRef, ColumnVec, InListPredicate, LikePattern, NonSargablePredicate, OrEqualityChain,
    StatementShape, WildcardProjection
};

/// Column as written: optional qualifier (alias or table) and name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct RawColumn {
    qualifier: Option<CompactString>,
    name:      CompactString
}

struct RawWildcard {
    text:      CompactString,
    qualifier: Option<CompactString>
}

struct RawNonSargable {
    column:    RawColumn,
    wrapper:   CompactString,
    predicate: String
}

#[derive(Clone, Copy)]
enum ColumnTarget {
    Filter,
    Order,
    Group
}

/// Accumulates facts while walking the AST, then resolves aliases once the
/// whole statement has been seen
#[derive(Default)]
pub(super) struct Collector {
    tables:          IndexSet<CompactString>,
    cte_names:       HashSet<CompactString>,
    aliases:         HashMap<CompactString, CompactString>,
    wildcards:       Vec<RawWildcard>,
    has_where:       bool,
    where_tautology: Option<String>,
    likes:           Vec<(Option<RawColumn>, String, bool)>,
    non_sargable:    Vec<RawNonSargable>,
    in_lists:        Vec<(Option<RawColumn>, usize)>,
    or_chains:       Vec<(RawColumn, String, Vec<String>)>,
    has_offset:      bool,
    filter:          IndexSet<RawColumn>,
    order:           IndexSet<RawColumn>,
    group:           IndexSet<RawColumn>,
    depth:           usize,
    in_exists:       bool
}

impl Collector {
    pub(super) fn statement(&mut self, stmt: &sqlparser::ast::Statement) {
        use sqlparser::ast::{FromTable, Statement};

        match stmt {
            Statement::Query(query) => self.query(query),
            Statement::Insert(insert) => {
                self.tables.insert(insert.table.to_string().into());
                if let Some(source) = &insert.source {
                    self.nested(|c| c.query(source));
                }
            }
            Statement::Update(update) => {
                self.table_factor(&update.table.relation);
                for join in &update.table.joins {
                    self.table_factor(&join.relation);
                }
                if let Some(selection) = &update.selection {
                    self.where_clause(selection);
                }
            }
            Statement::Delete(delete) => {
                match &delete.from {
                    FromTable::WithFromKeyword(items) | FromTable::WithoutKeyword(items) => {
                        for item in items {
                            self.table_factor(&item.relation);
                        }
                    }
                }
                if let Some(selection) = &delete.selection {
                    self.where_clause(selection);
                }
            }
            _ => {}
        }
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.depth += 1;
        f(self);
        self.depth -= 1;
    }

    fn push_column(&mut self, column: RawColumn, target: ColumnTarget) {
        match target {
            ColumnTarget::Filter => self.filter.insert(column),
            ColumnTarget::Order => self.order.insert(column),
            ColumnTarget::Group => self.group.insert(column)
        };
    }

    pub(super) fn finish(self) -> StatementShape {
        let tables: Vec<CompactString> = self
            .tables
            .iter()
            .filter(|t| !self.cte_names.contains(*t))
            .cloned()
            .collect();
        let sole_table = match tables.as_slice() {
            [only] => Some(only.clone()),
            _ => None
        };
        let resolve_table = |qualifier: &Option<CompactString>| -> Option<CompactString> {
            match qualifier {
                Some(q) => Some(self.aliases.get(q).cloned().unwrap_or_else(|| q.clone())),
                None => sole_table.clone()
            }
        };
        let resolve = |raw: &RawColumn| ColumnRef {
            table: resolve_table(&raw.qualifier),
            name:  raw.name.clone()
        };
        let resolve_all = |set: &IndexSet<RawColumn>| -> ColumnVec {
            set.iter()
                .map(&resolve)
                .collect::<IndexSet<_>>()
                .into_iter()
                .collect()
        };

        StatementShape {
            wildcards:       self
                .wildcards
                .iter()
                .map(|w| WildcardProjection {
                    text:  w.text.clone(),
                    table: resolve_table(&w.qualifier)
                })
                .collect(),
            has_where:       self.has_where,
            where_tautology: self.where_tautology.clone(),
            like_patterns:   self
                .likes
                .iter()
                .map(|(column, pattern, negated)| LikePattern {
                    column:  column.as_ref().map(&resolve),
                    pattern: pattern.clone(),
                    negated: *negated
                })
                .collect(),
            non_sargable:    self
                .non_sargable
                .iter()
                .map(|n| NonSargablePredicate {
                    column:    resolve(&n.column),
                    wrapper:   n.wrapper.clone(),
                    predicate: n.predicate.clone()
                })
                .collect(),
            in_lists:        self
                .in_lists
                .iter()
                .map(|(column, size)| InListPredicate {
                    column: column.as_ref().map(&resolve),
                    size:   *size
                })
                .collect(),
            or_chains:       self
                .or_chains
                .iter()
                .map(|(column, written, values)| OrEqualityChain {
                    column:  resolve(column),
                    written: written.clone(),
                    values:  values.clone()
                })
                .collect(),
            has_offset:      self.has_offset,
            filter_columns:  resolve_all(&self.filter),
            order_columns:   resolve_all(&self.order),
            group_columns:   resolve_all(&self.group),
            aliases:         self
                .aliases
                .iter()
                .filter(|(alias, table)| alias != table)
                .map(|(alias, table)| (alias.clone(), table.clone()))
                .collect(),
            tables
        }
    }
}
