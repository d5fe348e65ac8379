//! # SQL Quality Analyzer Library
//!
//! Statement extraction, static rules, live plan probes, optimizer
//! suggestions and baseline regression checks for SQL embedded in a
//! codebase.
//!
//! # Modules
//!
//! - [`extract`] - Statements from `.sql` files and execute-style calls
//! - [`shape`] - Structural facts parsed from each statement
//! - [`rules`] - Rule engine and built-in rules
//! - [`plan`] - EXPLAIN output parsing
//! - [`dynamic`] - Bounded-concurrency plan and latency probes
//! - [`suggest`] - Index and rewrite suggestions
//! - [`baseline`] - Baseline persistence and regression comparison
//! - [`engine`] - Run orchestration into a [`report::Report`]
//! - [`output`] - Text, JSON, YAML and Markdown rendering

pub mod app;
pub mod baseline;
pub mod cache;
pub mod cli;
pub mod config;
pub mod dynamic;
pub mod engine;
pub mod error;
pub mod extract;
pub mod output;
pub mod plan;
pub mod report;
pub mod rules;
pub mod scan;
pub mod schema;
pub mod shape;
pub mod statement;
pub mod suggest;
