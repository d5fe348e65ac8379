use sqlparser::ast::LimitClause;

use super::{ColumnTarget, Collector, RawWildcard, expr::column_of};

impl Collector {
    pub(super) fn query(&mut self, query: &sqlparser::ast::Query) {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.cte_names.insert(cte.alias.name.value.as_str().into());
                self.nested(|c| c.query(&cte.query));
            }
        }
        self.set_expr(&query.body);
        match &query.limit_clause {
            Some(LimitClause::LimitOffset {
                offset: Some(_), ..
            })
            | Some(LimitClause::OffsetCommaLimit {
                ..
            }) => self.has_offset = true,
            _ => {}
        }
        if let Some(order_by) = &query.order_by
            && let sqlparser::ast::OrderByKind::Expressions(exprs) = &order_by.kind
        {
            for order_expr in exprs {
                if let Some(column) = column_of(&order_expr.expr) {
                    self.push_column(column, ColumnTarget::Order);
                }
            }
        }
    }

    fn set_expr(&mut self, set_expr: &sqlparser::ast::SetExpr) {
        use sqlparser::ast::SetExpr;

        match set_expr {
            SetExpr::Select(select) => {
                for table in &select.from {
                    self.table_factor(&table.relation);
                    for join in &table.joins {
                        self.table_factor(&join.relation);
                        match &join.join_operator {
                            sqlparser::ast::JoinOperator::Join(constraint)
                            | sqlparser::ast::JoinOperator::Inner(constraint)
                            | sqlparser::ast::JoinOperator::Left(constraint)
                            | sqlparser::ast::JoinOperator::LeftOuter(constraint)
                            | sqlparser::ast::JoinOperator::Right(constraint)
                            | sqlparser::ast::JoinOperator::RightOuter(constraint)
                            | sqlparser::ast::JoinOperator::FullOuter(constraint) => {
                                if let sqlparser::ast::JoinConstraint::On(expr) = constraint {
                                    self.predicate(expr);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                for item in &select.projection {
                    self.projection(item);
                }
                if let Some(selection) = &select.selection {
                    self.where_clause(selection);
                }
                if let sqlparser::ast::GroupByExpr::Expressions(exprs, _) = &select.group_by {
                    for expr in exprs {
                        if let Some(column) = column_of(expr) {
                            self.push_column(column, ColumnTarget::Group);
                        }
                    }
                }
                if let Some(having) = &select.having {
                    self.predicate(having);
                }
            }
            SetExpr::SetOperation {
                left,
                right,
                ..
            } => {
                self.set_expr(left);
                self.set_expr(right);
            }
            SetExpr::Query(query) => self.nested(|c| c.query(query)),
            SetExpr::Insert(stmt) | SetExpr::Update(stmt) | SetExpr::Delete(stmt) => {
                self.statement(stmt)
            }
            _ => {}
        }
    }

    fn projection(&mut self, item: &sqlparser::ast::SelectItem) {
        use sqlparser::ast::SelectItem;

        match item {
            SelectItem::Wildcard(_) => {
                if !self.in_exists {
                    self.wildcards.push(RawWildcard {
                        text:      "*".into(),
                        qualifier: None
                    });
                }
            }
            SelectItem::QualifiedWildcard(..) => {
                if !self.in_exists {
                    let text = item.to_string();
                    let qualifier = text
                        .split(".*")
                        .next()
                        .and_then(|q| q.rsplit('.').next())
                        .map(Into::into);
                    self.wildcards.push(RawWildcard {
                        text: text.as_str().into(),
                        qualifier
                    });
                }
            }
            SelectItem::UnnamedExpr(expr)
            | SelectItem::ExprWithAlias {
                expr, ..
            } => self.subqueries(expr),
            #[allow(unreachable_patterns)]
            _ => {}
        }
    }
}
