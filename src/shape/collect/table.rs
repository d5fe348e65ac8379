use compact_str::CompactString;

use super::Collector;

impl Collector {
    pub(super) fn table_factor(&mut self, table_factor: &sqlparser::ast::TableFactor) {
        use sqlparser::ast::TableFactor;

        match table_factor {
            TableFactor::Table {
                name,
                alias,
                ..
            } => {
                let table: CompactString = name.to_string().into();
                if let Some(alias) = alias {
                    self.aliases
                        .insert(alias.name.value.as_str().into(), table.clone());
                }
                self.tables.insert(table);
            }
            TableFactor::Derived {
                subquery, ..
            } => self.nested(|c| c.query(subquery)),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => {
                self.table_factor(&table_with_joins.relation);
                for join in &table_with_joins.joins {
                    self.table_factor(&join.relation);
                }
            }
            _ => {}
        }
    }
}
