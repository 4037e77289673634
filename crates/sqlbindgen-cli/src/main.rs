//! sqlbindgen CLI - typed data-access code generation from SQL

mod args;
mod config;
mod output;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use sqlbindgen_core::{
    Analyzer, Catalog, CommentSyntax, Generateable, QueryFile, SchemaBuilder, SqlDialect,
};

use crate::args::{AnalyzeArgs, Args, Command, OutputFormat};
use crate::config::Config;
use crate::output::OutputFormatter;

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .init();

    match run(args) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> Result<bool> {
    match args.command {
        Command::Generate { inputs, out } => {
            let config = load_config(&inputs)?;
            let out = out
                .or_else(|| config.out.as_ref().map(PathBuf::from));
            match analyze(&config, &inputs)? {
                Analysis::Failed => Ok(true),
                Analysis::Clean(bundle) => {
                    let json = serde_json::to_string_pretty(&bundle).into_diagnostic()?;
                    match out {
                        Some(path) => {
                            fs::write(&path, json).into_diagnostic()?;
                            eprintln!(
                                "Wrote {} query(ies) to {}",
                                bundle.queries.len(),
                                path.display()
                            );
                        }
                        None => println!("{json}"),
                    }
                    Ok(false)
                }
            }
        }

        Command::Check { inputs } => {
            let config = load_config(&inputs)?;
            match analyze(&config, &inputs)? {
                Analysis::Failed => Ok(true),
                Analysis::Clean(bundle) => {
                    eprintln!("{} query(ies) analyzed cleanly", bundle.queries.len());
                    Ok(false)
                }
            }
        }

        Command::Schema { files, dialect } => {
            let dialect: SqlDialect = dialect.parse().map_err(|e: String| miette::miette!(e))?;
            let catalog = match build_catalog(
                &files,
                dialect,
                &OutputFormatter::new(OutputFormat::Human),
            )? {
                Some(catalog) => catalog,
                None => return Ok(true),
            };

            for table in catalog.tables.values() {
                println!("{}", table.name);
                for col in table.columns.values() {
                    let null = if col.not_null { "not null" } else { "null" };
                    let auto = if col.auto_increment {
                        " auto_increment"
                    } else {
                        ""
                    };
                    println!("  {} {} {}{}", col.name, col.sql_type.display_name(), null, auto);
                }
            }
            Ok(false)
        }
    }
}

enum Analysis {
    /// Diagnostics were printed; exit non-zero
    Failed,
    Clean(Generateable),
}

fn load_config(inputs: &AnalyzeArgs) -> Result<Config> {
    let config = if let Some(path) = &inputs.config {
        Config::from_file(path)?
    } else {
        Config::find_and_load()?.unwrap_or_default()
    };
    Ok(config.merge_with_args(
        &inputs.schema,
        &inputs.schema_dir,
        &inputs.queries,
        &inputs.dialect,
        &inputs.package,
    ))
}

fn analyze(config: &Config, inputs: &AnalyzeArgs) -> Result<Analysis> {
    let dialect: SqlDialect = config
        .dialect
        .as_deref()
        .unwrap_or("mysql")
        .parse()
        .map_err(|e: String| miette::miette!(e))?;
    let formatter = OutputFormatter::new(inputs.format);

    // schema files, applied in order
    let mut schema_files: Vec<PathBuf> = expand_patterns(&config.schema)?;
    if let Some(dir) = &config.schema_dir {
        let pattern = format!("{}/**/*.sql", dir);
        for path in glob::glob(&pattern).into_diagnostic()?.flatten() {
            schema_files.push(path);
        }
    }
    if schema_files.is_empty() {
        miette::bail!(
            "No schema files specified. Use --schema, --schema-dir, or configure them in sqlbindgen.toml"
        );
    }

    let catalog = match build_catalog(&schema_files, dialect, &formatter)? {
        Some(catalog) => catalog,
        None => return Ok(Analysis::Failed),
    };

    // query files
    let query_paths = expand_patterns(&config.queries)?;
    if query_paths.is_empty() {
        miette::bail!(
            "No query files specified. Pass them as arguments or configure them in sqlbindgen.toml"
        );
    }
    let mut query_files = Vec::new();
    for path in &query_paths {
        let sql = fs::read_to_string(path).into_diagnostic()?;
        let syntax = comment_syntax_hint(&sql);
        query_files.push(QueryFile {
            filename: path.display().to_string(),
            sql,
            syntax,
        });
    }

    let analyzer = Analyzer::with_dialect(&catalog, dialect);
    let analysis = analyzer.analyze_package(&query_files);

    if !analysis.errors.is_empty() {
        formatter.print_errors(&analysis.errors);
        return Ok(Analysis::Failed);
    }

    Ok(Analysis::Clean(Generateable {
        catalog,
        queries: analysis.entries,
        settings: config.generate_settings(),
    }))
}

/// Build the catalog, printing schema diagnostics on failure.
/// Schema errors are fatal: no query can be analyzed against a broken schema.
fn build_catalog(
    files: &[PathBuf],
    dialect: SqlDialect,
    formatter: &OutputFormatter,
) -> Result<Option<Catalog>> {
    let mut builder = SchemaBuilder::with_dialect(dialect);
    for file in files {
        let sql = fs::read_to_string(file).into_diagnostic()?;
        if let Err(err) = builder.parse(&sql) {
            let file_err = err.into_file_err(&file.display().to_string(), 1);
            formatter.print_errors(std::slice::from_ref(&file_err));
            return Ok(None);
        }
    }
    Ok(Some(builder.build()))
}

fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        if pattern.contains('*') {
            for path in glob::glob(pattern).into_diagnostic()?.flatten() {
                paths.push(path);
            }
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }
    Ok(paths)
}

/// Pick the annotation comment syntax for a file: block if it ever uses
/// `/* name: ... */`, line otherwise.
fn comment_syntax_hint(sql: &str) -> CommentSyntax {
    if sql.contains("/* name") || sql.contains("/*name") {
        CommentSyntax::Block
    } else {
        CommentSyntax::Line
    }
}
