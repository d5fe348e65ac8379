//! Application logic for the SQL Quality Analyzer CLI.
//!
//! Kept out of `main.rs` so commands can be driven from tests.

mod baseline;
mod check;
mod helpers;
mod types;

pub use baseline::run_baseline_save;
pub use check::run_check;
pub use helpers::{create_output_options, init_tracing, load_config, write_output};
pub use types::{BaselineSaveParams, CheckParams, CommandOutput, FATAL_EXIT_CODE};
