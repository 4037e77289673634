//! sqlbindgen-core: typed data-access code generation from SQL
//!
//! This library turns hand-written SQL (a schema plus a set of annotated
//! queries) into a language-neutral IR: for every query it determines the
//! ordered, typed, nullability-aware parameters and output columns, plus a
//! normalized SQL text to embed in generated code. It runs entirely offline
//! and never connects to a database.

pub mod analyzer;
pub mod dialect;
pub mod error;
pub mod ir;
pub mod schema;
pub mod source;
pub mod types;

pub use analyzer::{Analyzer, FileAnalysis, QueryFile};
pub use dialect::SqlDialect;
pub use error::{AnalyzeError, ErrorKind, FileErr, Span};
pub use ir::{
    CmdKind, Column, GenerateSettings, Generateable, Override, Param, Query, QueryEntry, StmtRange,
};
pub use schema::{Catalog, ColumnDef, SchemaBuilder, TableSchema};
pub use source::CommentSyntax;
pub use types::SqlType;
