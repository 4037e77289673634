//! Diagnostic output formatting

use sqlbindgen_core::FileErr;

use crate::args::OutputFormat;

/// Prints per-query diagnostics in the configured format
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn print_errors(&self, errors: &[FileErr]) {
        match self.format {
            OutputFormat::Human => self.print_human(errors),
            OutputFormat::Json => self.print_json(errors),
        }
    }

    fn print_human(&self, errors: &[FileErr]) {
        for err in errors {
            eprintln!(
                "{}:{}:{}: {}",
                err.filename, err.line, err.column, err.message
            );
        }
        if !errors.is_empty() {
            eprintln!();
            eprintln!("{} query error(s)", errors.len());
        }
    }

    fn print_json(&self, errors: &[FileErr]) {
        let output = serde_json::json!({ "errors": errors });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).expect("diagnostics serialize")
        );
    }
}
