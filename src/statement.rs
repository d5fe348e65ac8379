//! Extracted SQL statements and their stable identity.
//!
//! A [`Statement`] is the unit every other stage refers to. Its
//! [`StatementId`] is derived from the normalized text and the source
//! location, so the same statement at the same place hashes identically
//! across runs and can key persisted baselines.

mod normalize;
mod types;

pub use normalize::{looks_like_sql, normalize_sql};
pub use types::{SourceLocation, Statement, StatementId, StatementKind};
