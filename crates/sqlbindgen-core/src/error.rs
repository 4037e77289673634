//! Error and diagnostic types

use miette::SourceSpan;
use serde::{Deserialize, Serialize};

/// Source location span
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset from start of source (optional, for miette compatibility)
    pub offset: usize,
    /// Length in bytes
    pub length: usize,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

impl Span {
    /// Create a span with line and column information
    pub fn at(line: usize, column: usize) -> Self {
        Self {
            offset: 0,
            length: 1,
            line,
            column,
        }
    }

    /// Create a span from sqlparser's token span
    pub fn from_sqlparser(span: &sqlparser::tokenizer::Span) -> Self {
        let start = span.start;
        let end = span.end;
        let length = if end.column > start.column {
            end.column as usize - start.column as usize
        } else {
            1
        };
        Self {
            offset: 0,
            length,
            line: start.line as usize,
            column: start.column as usize,
        }
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new(span.offset.into(), span.length)
    }
}

/// Kinds of analysis errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// E0001: two CREATE TABLE statements define the same table
    DuplicateTable,
    /// E0002: a table defines the same column twice
    DuplicateColumn,
    /// E0003: schema DDL that the parser cannot understand
    UnparseableDdl,
    /// E0101: malformed `name: Ident :cmd` annotation
    BadAnnotation,
    /// E0201: table or alias not in the catalog or query scope
    UnknownTable,
    /// E0202: column not found in any table in scope
    UnknownColumn,
    /// E0203: unqualified column matches more than one table in scope
    AmbiguousColumn,
    /// E0301: no use-site hint to infer a parameter's type from
    UnknownParamType,
    /// E0401: the normalizer cannot faithfully emit a construct
    Unnormalizable,
    /// E1000: query SQL that the parser cannot understand
    UnparseableSql,
    /// E1001: statement kind outside {SELECT, INSERT, UPDATE, DELETE}
    UnsupportedStatement,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::DuplicateTable => "E0001",
            ErrorKind::DuplicateColumn => "E0002",
            ErrorKind::UnparseableDdl => "E0003",
            ErrorKind::BadAnnotation => "E0101",
            ErrorKind::UnknownTable => "E0201",
            ErrorKind::UnknownColumn => "E0202",
            ErrorKind::AmbiguousColumn => "E0203",
            ErrorKind::UnknownParamType => "E0301",
            ErrorKind::Unnormalizable => "E0401",
            ErrorKind::UnparseableSql => "E1000",
            ErrorKind::UnsupportedStatement => "E1001",
        }
    }

    /// The error family this kind belongs to
    pub fn category(&self) -> &'static str {
        match self {
            ErrorKind::DuplicateTable | ErrorKind::DuplicateColumn | ErrorKind::UnparseableDdl => {
                "schema"
            }
            ErrorKind::BadAnnotation => "annotation",
            ErrorKind::UnknownTable | ErrorKind::UnknownColumn | ErrorKind::AmbiguousColumn => {
                "resolution"
            }
            ErrorKind::UnknownParamType => "inference",
            ErrorKind::Unnormalizable => "normalization",
            ErrorKind::UnparseableSql | ErrorKind::UnsupportedStatement => "parse",
        }
    }
}

/// An error produced while analyzing a schema or a single query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
    pub help: Option<String>,
}

impl AnalyzeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            help: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Convert to a driver-facing record. Spans inside a statement are
    /// relative to the statement text; `base_line` re-anchors them in the
    /// source file.
    pub fn into_file_err(self, filename: &str, base_line: usize) -> FileErr {
        let (line, column) = match self.span {
            Some(span) if span.line > 0 => (base_line + span.line - 1, span.column),
            _ => (base_line, 1),
        };
        let message = match self.help {
            Some(help) => format!("{} ({})", self.message, help),
            None => self.message,
        };
        FileErr {
            filename: filename.to_string(),
            line,
            column,
            message,
        }
    }
}

impl std::fmt::Display for AnalyzeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for AnalyzeError {}

/// A per-query failure attached to its source location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileErr {
    pub filename: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl std::fmt::Display for FileErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.filename, self.line, self.column, self.message
        )
    }
}
