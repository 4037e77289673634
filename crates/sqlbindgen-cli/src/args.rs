//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "sqlbindgen")]
#[command(author, version, about = "Generate typed data-access code from SQL")]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Analyze queries and write the generateable bundle
    Generate {
        #[command(flatten)]
        inputs: AnalyzeArgs,

        /// Where to write the bundle JSON (stdout if omitted)
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Analyze queries and report diagnostics without generating anything
    Check {
        #[command(flatten)]
        inputs: AnalyzeArgs,
    },

    /// Parse schema files and display the catalog
    Schema {
        /// Schema definition files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// SQL dialect
        #[arg(short, long, default_value = "mysql")]
        dialect: String,
    },
}

#[derive(clap::Args)]
pub struct AnalyzeArgs {
    /// Query files to analyze (supports glob patterns)
    pub queries: Vec<PathBuf>,

    /// Schema definition files
    #[arg(short, long = "schema", value_name = "FILE")]
    pub schema: Vec<PathBuf>,

    /// Directory containing schema files
    #[arg(long = "schema-dir", value_name = "DIR")]
    pub schema_dir: Option<PathBuf>,

    /// Configuration file (defaults to sqlbindgen.toml lookup)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SQL dialect
    #[arg(short, long)]
    pub dialect: Option<String>,

    /// Generated package name
    #[arg(short, long)]
    pub package: Option<String>,

    /// Output format for diagnostics
    #[arg(short, long, default_value = "human", value_enum)]
    pub format: OutputFormat,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable `file:line:col: message` lines
    #[default]
    Human,
    /// JSON output
    Json,
}
