use compact_str::CompactString;
use sqlparser::ast::{BinaryOperator, Expr, Value};

use super::{ColumnTarget, Collector, RawColumn, RawNonSargable};
use crate::shape::types::LIKE_WILDCARDS;

/// Equalities on one column joined by OR before an `IN` list reads better
const OR_CHAIN_MIN: usize = 3;

impl Collector {
    pub(super) fn where_clause(&mut self, expr: &Expr) {
        if self.depth == 0 {
            self.has_where = true;
            if is_tautology(expr) {
                self.where_tautology = Some(expr.to_string());
            }
        }
        self.predicate(expr);
    }

    /// Walk a boolean condition collecting filter facts
    pub(super) fn predicate(&mut self, expr: &Expr) {
        match expr {
            Expr::BinaryOp {
                left,
                op,
                right
            } => match op {
                BinaryOperator::And => {
                    self.predicate(left);
                    self.predicate(right);
                }
                BinaryOperator::Or => {
                    let mut disjuncts = Vec::new();
                    disjuncts_of(expr, &mut disjuncts);
                    self.or_equality_chains(&disjuncts);
                    for disjunct in disjuncts {
                        self.predicate(disjunct);
                    }
                }
                op if is_comparison(op) => {
                    self.sargability(left, expr);
                    self.sargability(right, expr);
                    if *op == BinaryOperator::Eq {
                        match (column_of(left), column_of(right)) {
                            (Some(l), Some(r)) => {
                                self.push_column(l, ColumnTarget::Filter);
                                self.push_column(r, ColumnTarget::Filter);
                            }
                            (Some(c), None) | (None, Some(c)) => {
                                self.push_column(c, ColumnTarget::Filter)
                            }
                            (None, None) => {}
                        }
                    }
                    self.subqueries(left);
                    self.subqueries(right);
                }
                _ => {}
            },
            Expr::Like {
                negated,
                expr: target,
                pattern,
                ..
            }
            | Expr::ILike {
                negated,
                expr: target,
                pattern,
                ..
            } => {
                self.sargability(target, expr);
                if let Some(pattern) = like_pattern(pattern) {
                    let column = column_of(target);
                    if !*negated
                        && !pattern.starts_with(LIKE_WILDCARDS)
                        && let Some(column) = &column
                    {
                        self.push_column(column.clone(), ColumnTarget::Filter);
                    }
                    self.likes.push((column, pattern, *negated));
                }
            }
            Expr::InList {
                expr: target,
                list,
                negated,
                ..
            } => {
                self.sargability(target, expr);
                let column = column_of(target);
                if !*negated && let Some(column) = &column {
                    self.push_column(column.clone(), ColumnTarget::Filter);
                }
                self.in_lists.push((column, list.len()));
            }
            Expr::InSubquery {
                expr: target,
                subquery,
                negated,
                ..
            } => {
                if !*negated && let Some(column) = column_of(target) {
                    self.push_column(column, ColumnTarget::Filter);
                }
                self.nested(|c| c.query(subquery));
            }
            Expr::Between {
                expr: target, ..
            } => self.sargability(target, expr),
            Expr::Nested(inner)
            | Expr::UnaryOp {
                expr: inner, ..
            } => self.predicate(inner),
            Expr::Exists {
                subquery, ..
            } => self.exists(subquery),
            _ => {}
        }
    }

    /// Collect scalar, `IN` and `EXISTS` subqueries inside an expression
    pub(super) fn subqueries(&mut self, expr: &Expr) {
        match expr {
            Expr::Subquery(query) => self.nested(|c| c.query(query)),
            Expr::InSubquery {
                subquery, ..
            } => self.nested(|c| c.query(subquery)),
            Expr::Exists {
                subquery, ..
            } => self.exists(subquery),
            Expr::BinaryOp {
                left,
                right,
                ..
            } => {
                self.subqueries(left);
                self.subqueries(right);
            }
            Expr::Nested(inner) => self.subqueries(inner),
            _ => {}
        }
    }

    fn exists(&mut self, subquery: &sqlparser::ast::Query) {
        let outer = self.in_exists;
        self.in_exists = true;
        self.nested(|c| c.query(subquery));
        self.in_exists = outer;
    }

    /// Group `col = literal` disjuncts by column; a column compared with
    /// three or more literals is an `IN` list written the long way
    fn or_equality_chains(&mut self, disjuncts: &[&Expr]) {
        let mut chains: Vec<(RawColumn, String, Vec<String>)> = Vec::new();
        for disjunct in disjuncts {
            let Expr::BinaryOp {
                left,
                op: BinaryOperator::Eq,
                right
            } = disjunct
            else {
                continue;
            };
            let (column_expr, value) = match (column_of(left), column_of(right)) {
                (Some(_), None) if is_literal(right) => (left, right),
                (None, Some(_)) if is_literal(left) => (right, left),
                _ => continue
            };
            let Some(column) = column_of(column_expr) else {
                continue;
            };
            match chains.iter_mut().find(|(c, ..)| *c == column) {
                Some((.., values)) => values.push(value.to_string()),
                None => chains.push((column, column_expr.to_string(), vec![value.to_string()]))
            }
        }
        self.or_chains.extend(
            chains
                .into_iter()
                .filter(|(.., values)| values.len() >= OR_CHAIN_MIN)
        );
    }

    fn sargability(&mut self, side: &Expr, predicate: &Expr) {
        if let Some((column, wrapper)) = wrapped_column(side) {
            self.non_sargable.push(RawNonSargable {
                column,
                wrapper,
                predicate: predicate.to_string()
            });
        }
    }
}

/// Operands of an OR chain, flattened through parentheses
fn disjuncts_of<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right
        } => {
            disjuncts_of(left, out);
            disjuncts_of(right, out);
        }
        Expr::Nested(inner)
            if matches!(
                &**inner,
                Expr::BinaryOp {
                    op: BinaryOperator::Or,
                    ..
                }
            ) =>
        {
            disjuncts_of(inner, out)
        }
        _ => out.push(expr)
    }
}

/// Bare column reference, looking through parentheses
pub(super) fn column_of(expr: &Expr) -> Option<RawColumn> {
    match expr {
        Expr::Identifier(ident) => Some(RawColumn {
            qualifier: None,
            name:      ident.value.as_str().into()
        }),
        Expr::CompoundIdentifier(idents) => {
            let (name, rest) = idents.split_last()?;
            Some(RawColumn {
                qualifier: rest.last().map(|q| q.value.as_str().into()),
                name:      name.value.as_str().into()
            })
        }
        Expr::Nested(inner) => column_of(inner),
        _ => None
    }
}

/// First column referenced anywhere inside an expression
fn first_column(expr: &Expr) -> Option<RawColumn> {
    match expr {
        Expr::Identifier(_) | Expr::CompoundIdentifier(_) => column_of(expr),
        Expr::BinaryOp {
            left,
            right,
            ..
        } => first_column(left).or_else(|| first_column(right)),
        Expr::Nested(inner)
        | Expr::UnaryOp {
            expr: inner, ..
        }
        | Expr::Cast {
            expr: inner, ..
        } => first_column(inner),
        Expr::Function(func) => {
            let sqlparser::ast::FunctionArguments::List(arg_list) = &func.args else {
                return None;
            };
            arg_list.args.iter().find_map(|arg| match arg {
                sqlparser::ast::FunctionArg::Unnamed(sqlparser::ast::FunctionArgExpr::Expr(e)) => {
                    first_column(e)
                }
                _ => None
            })
        }
        _ => None
    }
}

/// A column hidden behind a function, cast or arithmetic
fn wrapped_column(expr: &Expr) -> Option<(RawColumn, CompactString)> {
    match expr {
        Expr::Nested(inner) => wrapped_column(inner),
        Expr::Function(func) => {
            first_column(expr).map(|c| (c, func.name.to_string().to_uppercase().into()))
        }
        Expr::Cast {
            expr: inner, ..
        } => first_column(inner).map(|c| (c, "CAST".into())),
        Expr::BinaryOp {
            op, ..
        } if is_arithmetic(op) => first_column(expr).map(|c| (c, op.to_string().into())),
        _ => None
    }
}

fn is_comparison(op: &BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::Eq
            | BinaryOperator::NotEq
            | BinaryOperator::Lt
            | BinaryOperator::LtEq
            | BinaryOperator::Gt
            | BinaryOperator::GtEq
            | BinaryOperator::Spaceship
    )
}

fn is_arithmetic(op: &BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::Plus
            | BinaryOperator::Minus
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Modulo
            | BinaryOperator::StringConcat
    )
}

fn string_literal(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Value(val) => match &val.value {
            Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => Some(s.clone()),
            _ => None
        },
        Expr::Nested(inner) => string_literal(inner),
        _ => None
    }
}

/// Pattern text of a LIKE whose pattern starts with a literal. Pieces of
/// `'%' || x` and `CONCAT('%', x)` are joined, non-literal pieces shown as `?`.
fn like_pattern(expr: &Expr) -> Option<String> {
    let mut parts = Vec::new();
    concat_parts(expr, &mut parts);
    string_literal(parts.first()?)?;
    Some(
        parts
            .iter()
            .map(|part| string_literal(part).unwrap_or_else(|| "?".to_string()))
            .collect()
    )
}

fn concat_parts<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    use sqlparser::ast::{FunctionArg, FunctionArgExpr, FunctionArguments};

    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::StringConcat,
            right
        } => {
            concat_parts(left, out);
            concat_parts(right, out);
        }
        Expr::Nested(inner) => concat_parts(inner, out),
        Expr::Function(func) if func.name.to_string().eq_ignore_ascii_case("concat") => {
            let FunctionArguments::List(arg_list) = &func.args else {
                out.push(expr);
                return;
            };
            for arg in &arg_list.args {
                match arg {
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => concat_parts(e, out),
                    _ => out.push(expr)
                }
            }
        }
        _ => out.push(expr)
    }
}

fn is_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Value(val) => !matches!(val.value, Value::Placeholder(_)),
        Expr::Nested(inner) => is_literal(inner),
        _ => false
    }
}

/// Whether a condition holds for every row (`1=1`, `TRUE`, `'a'='a'`,
/// `col = col`, or any OR containing one)
fn is_tautology(expr: &Expr) -> bool {
    match expr {
        Expr::Value(val) => match &val.value {
            Value::Boolean(b) => *b,
            Value::Number(n, _) => n.parse::<f64>().is_ok_and(|v| v != 0.0),
            _ => false
        },
        Expr::Nested(inner) => is_tautology(inner),
        Expr::BinaryOp {
            left,
            op,
            right
        } => match op {
            BinaryOperator::Or => is_tautology(left) || is_tautology(right),
            BinaryOperator::And => is_tautology(left) && is_tautology(right),
            BinaryOperator::Eq => {
                let same = left.to_string() == right.to_string();
                same && ((is_literal(left) && is_literal(right))
                    || (column_of(left).is_some() && column_of(right).is_some()))
            }
            BinaryOperator::NotEq => {
                is_literal(left) && is_literal(right) && left.to_string() != right.to_string()
            }
            _ => false
        },
        _ => false
    }
}
