use std::sync::Arc;

use sql_quality_analyzer::{
    cache::ShapeCache,
    shape::SqlDialect,
    statement::{SourceLocation, Statement}
};

fn statement(sql: &str, line: usize) -> Statement {
    Statement::new(sql, SourceLocation::new("q.sql", line))
}

#[test]
fn test_cache_miss_then_hit() {
    let cache = ShapeCache::new(SqlDialect::Generic, 16);
    let stmt = statement("SELECT id FROM users", 1);
    assert!(cache.get(stmt.id()).is_none());

    let first = cache.get_or_analyze(&stmt);
    let second = cache.get_or_analyze(&stmt);
    assert!(first.is_ok());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_parse_failures_are_cached() {
    let cache = ShapeCache::default();
    let stmt = statement("SELEC oops", 1);
    assert!(cache.get_or_analyze(&stmt).is_err());
    assert!(cache.get(stmt.id()).is_some_and(|r| r.is_err()));
}

#[test]
fn test_eviction_keeps_cache_bounded() {
    let cache = ShapeCache::new(SqlDialect::Generic, 3);
    let statements: Vec<_> = (1..=6)
        .map(|i| statement(&format!("SELECT {} FROM t", i), i))
        .collect();
    for stmt in &statements {
        cache.get_or_analyze(stmt);
    }
    assert!(cache.len() <= 3);
    assert!(cache.get(statements[5].id()).is_some());
}

#[test]
fn test_tiny_cache_still_evicts() {
    let cache = ShapeCache::new(SqlDialect::Generic, 1);
    cache.get_or_analyze(&statement("SELECT 1", 1));
    cache.get_or_analyze(&statement("SELECT 2", 2));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_dialect_is_kept() {
    assert_eq!(ShapeCache::new(SqlDialect::MySql, 8).dialect(), SqlDialect::MySql);
    assert!(ShapeCache::default().is_empty());
}
