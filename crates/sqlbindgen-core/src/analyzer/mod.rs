//! Query analyzer: from annotated SQL text to the generateable IR.
//!
//! Each query moves through an explicit pipeline:
//! `Parsed -> ScopeBuilt -> ProjectionResolved -> ParamsResolved ->
//! Normalized -> Done`; any stage may fail, and a failure is recorded
//! against the query's source location without affecting other queries.

mod annotation;
mod infer;
mod normalize;
mod params;
mod projection;
mod scope;

use rayon::prelude::*;
use sqlparser::ast::{Insert, ObjectName, SetExpr, Statement, TableObject};
use sqlparser::parser::Parser;

use crate::dialect::SqlDialect;
use crate::error::{AnalyzeError, ErrorKind, FileErr};
use crate::ir::{CmdKind, Query, QueryEntry, StmtRange};
use crate::schema::Catalog;
use crate::source::{split_statements, CommentSyntax};

use scope::Scope;

/// The target table name of an INSERT. Table functions (ClickHouse) are
/// not part of the supported construct set.
pub(crate) fn insert_table_name(insert: &Insert) -> Result<&ObjectName, AnalyzeError> {
    match &insert.table {
        TableObject::TableName(name) => Ok(name),
        TableObject::TableFunction(_) => Err(AnalyzeError::new(
            ErrorKind::Unnormalizable,
            "INSERT INTO TABLE FUNCTION is not supported",
        )),
    }
}

/// Analysis pipeline stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Parsed,
    ScopeBuilt,
    ProjectionResolved,
    ParamsResolved,
    Normalized,
    Done,
}

/// A trailing `LIMIT` split off an UPDATE statement before parsing.
/// The parser front-end rejects `UPDATE ... LIMIT n`, so the analyzer
/// carries the clause itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UpdateLimit {
    Count(String),
    Placeholder,
}

/// One query file as handed over by the driver
#[derive(Debug, Clone)]
pub struct QueryFile {
    pub filename: String,
    pub sql: String,
    pub syntax: CommentSyntax,
}

/// Everything analysis produced for one file (or one package)
#[derive(Debug, Clone, Default)]
pub struct FileAnalysis {
    pub entries: Vec<QueryEntry>,
    pub errors: Vec<FileErr>,
}

/// SQL query analyzer over an immutable catalog
pub struct Analyzer<'a> {
    catalog: &'a Catalog,
    dialect: SqlDialect,
}

impl<'a> Analyzer<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self::with_dialect(catalog, SqlDialect::default())
    }

    pub fn with_dialect(catalog: &'a Catalog, dialect: SqlDialect) -> Self {
        Self { catalog, dialect }
    }

    /// Analyze every annotated statement in a file. Statements with no
    /// `name:` comment are skipped; everything else either yields a query
    /// or a diagnostic.
    pub fn analyze_file(&self, filename: &str, sql: &str, syntax: CommentSyntax) -> FileAnalysis {
        let mut analysis = FileAnalysis::default();

        for raw in split_statements(sql) {
            let annotated = raw
                .leading
                .iter()
                .filter(|c| c.syntax == syntax && annotation::has_name_marker(&c.text, syntax))
                .next_back();
            let Some(comment) = annotated else {
                tracing::debug!(filename, line = raw.start_line, "skipping unannotated statement");
                continue;
            };

            let (name, cmd) = match annotation::parse(&comment.text, syntax, comment.line) {
                Ok(parsed) => parsed,
                Err(err) => {
                    analysis.errors.push(err.into_file_err(filename, 1));
                    continue;
                }
            };

            match self.analyze_statement(&name, cmd, raw.text, filename, raw.start_line) {
                Ok(query) => analysis.entries.push(QueryEntry {
                    file: filename.to_string(),
                    range: StmtRange {
                        start: raw.start_line,
                        end: raw.end_line,
                    },
                    query,
                }),
                Err(err) => analysis
                    .errors
                    .push(err.into_file_err(filename, raw.start_line)),
            }
        }

        analysis
    }

    /// Analyze a whole package's files. Queries are independent and the
    /// catalog is immutable, so files fan out over the thread pool.
    pub fn analyze_package(&self, files: &[QueryFile]) -> FileAnalysis {
        let per_file: Vec<FileAnalysis> = files
            .par_iter()
            .map(|file| self.analyze_file(&file.filename, &file.sql, file.syntax))
            .collect();

        let mut merged = FileAnalysis::default();
        for analysis in per_file {
            merged.entries.extend(analysis.entries);
            merged.errors.extend(analysis.errors);
        }
        merged
    }

    fn analyze_statement(
        &self,
        name: &str,
        cmd: CmdKind,
        text: &str,
        filename: &str,
        line: usize,
    ) -> Result<Query, AnalyzeError> {
        let (text, update_limit) = split_update_limit(text);

        let dialect = self.dialect.parser_dialect();
        let statements = Parser::parse_sql(dialect.as_ref(), text).map_err(|e| {
            AnalyzeError::new(ErrorKind::UnparseableSql, format!("failed to parse query: {e}"))
        })?;
        let stmt = match statements.as_slice() {
            [stmt] => stmt,
            _ => {
                return Err(AnalyzeError::new(
                    ErrorKind::UnparseableSql,
                    "expected exactly one statement per annotated query",
                ));
            }
        };
        if !matches!(
            stmt,
            Statement::Query(_) | Statement::Insert(_) | Statement::Update { .. } | Statement::Delete(_)
        ) {
            return Err(scope::unsupported_statement(stmt));
        }
        let mut stage = Stage::Parsed;
        tracing::trace!(query = name, ?stage);

        let scope = Scope::for_statement(stmt, self.catalog)?;
        stage = Stage::ScopeBuilt;
        tracing::trace!(query = name, ?stage);

        let columns = if cmd.returns_rows() {
            let Statement::Query(query) = stmt else {
                return Err(AnalyzeError::new(
                    ErrorKind::BadAnnotation,
                    format!(
                        "':{cmd}' requires a SELECT statement; use ':exec' or ':execrows' here"
                    ),
                ));
            };
            let SetExpr::Select(select) = &*query.body else {
                return Err(AnalyzeError::new(
                    ErrorKind::Unnormalizable,
                    "set operations (UNION, INTERSECT, EXCEPT) are not supported",
                ));
            };
            projection::resolve_select(select, &scope, self.catalog)?
        } else {
            Vec::new()
        };
        stage = Stage::ProjectionResolved;
        tracing::trace!(query = name, ?stage);

        let params = params::infer(stmt, &scope, self.catalog, update_limit.as_ref())?;
        stage = Stage::ParamsResolved;
        tracing::trace!(query = name, ?stage);

        let sql = normalize::statement_to_sql(stmt, self.catalog, update_limit.as_ref())?;
        stage = Stage::Normalized;
        tracing::trace!(query = name, ?stage);

        stage = Stage::Done;
        tracing::trace!(query = name, ?stage);
        Ok(Query {
            name: name.to_string(),
            cmd,
            sql,
            params,
            columns,
            default_table: scope.default_table,
            filename: filename.to_string(),
            line,
        })
    }
}

/// Split a trailing `LIMIT <count|placeholder>` off an UPDATE statement.
/// Returns the remaining text and the captured clause, if any.
fn split_update_limit(text: &str) -> (&str, Option<UpdateLimit>) {
    let head = text.trim_start();
    let is_update = head.len() > 6
        && head[..6].eq_ignore_ascii_case("update")
        && head.as_bytes()[6].is_ascii_whitespace();
    if !is_update {
        return (text, None);
    }

    let mut body = text.trim_end();
    body = body.strip_suffix(';').unwrap_or(body).trim_end();

    let (rest, count) = split_last_token(body);
    let limit = if count == "?" {
        Some(UpdateLimit::Placeholder)
    } else if !count.is_empty() && count.chars().all(|c| c.is_ascii_digit()) {
        Some(UpdateLimit::Count(count.to_string()))
    } else if count.len() > 1
        && count.starts_with('$')
        && count[1..].chars().all(|c| c.is_ascii_digit())
    {
        Some(UpdateLimit::Placeholder)
    } else {
        None
    };
    let Some(limit) = limit else {
        return (text, None);
    };

    let rest = rest.trim_end();
    let (before, keyword) = split_last_token(rest);
    if !keyword.eq_ignore_ascii_case("limit") || before.trim_end().is_empty() {
        return (text, None);
    }

    (&text[..before.trim_end().len()], Some(limit))
}

fn split_last_token(s: &str) -> (&str, &str) {
    let is_token_char =
        |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '?' || c == '$';
    let start = s
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_token_char(*c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    (&s[..start], &s[start..])
}
