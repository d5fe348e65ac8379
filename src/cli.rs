use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::output::OutputFormat;

/// SQL Quality Analyzer - Review SQL in a codebase, probe plans, catch regressions
#[derive(Parser, Debug)]
#[command(name = "sql-quality-analyzer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze the repository and print a report
    Check {
        /// Policy file (YAML or TOML); discovered in the working directory when omitted
        #[arg(short, long)]
        policy: Option<PathBuf>,

        /// Repository root to scan
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,

        /// Database URL for plan and latency probes
        #[arg(long, env = "SQLQA_DSN")]
        dsn: Option<String>,

        /// Baseline file to compare against
        #[arg(short, long)]
        baseline: Option<PathBuf>,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: Format,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Show stage details, latencies and debug logs
        #[arg(short, long)]
        verbose: bool
    },

    /// Manage the regression baseline
    Baseline {
        #[command(subcommand)]
        command: BaselineCommands
    }
}

#[derive(Subcommand, Debug)]
pub enum BaselineCommands {
    /// Probe every statement and replace the baseline file
    Save {
        /// Database URL for plan and latency probes
        #[arg(long, env = "SQLQA_DSN")]
        dsn: Option<String>,

        /// Policy file (YAML or TOML)
        #[arg(short, long)]
        policy: Option<PathBuf>,

        /// Repository root to scan
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,

        /// Baseline file to write
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Debug logs
        #[arg(short, long)]
        verbose: bool
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml,
    Markdown
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => Self::Text,
            Format::Json => Self::Json,
            Format::Yaml => Self::Yaml,
            Format::Markdown => Self::Markdown
        }
    }
}
