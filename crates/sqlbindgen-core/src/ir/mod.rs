//! Language-neutral IR consumed by the code emitter

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{AnalyzeError, ErrorKind};
use crate::schema::Catalog;
use crate::types::SqlType;

/// Command kind: selects the call shape of the generated function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CmdKind {
    /// Single row
    One,
    /// Iterator / list of rows
    Many,
    /// No rows, error only
    Exec,
    /// No rows, affected row count
    ExecRows,
}

impl CmdKind {
    /// Whether the generated function returns projected rows
    pub fn returns_rows(&self) -> bool {
        matches!(self, CmdKind::One | CmdKind::Many)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CmdKind::One => "one",
            CmdKind::Many => "many",
            CmdKind::Exec => "exec",
            CmdKind::ExecRows => "execrows",
        }
    }
}

impl FromStr for CmdKind {
    type Err = AnalyzeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one" => Ok(CmdKind::One),
            "many" => Ok(CmdKind::Many),
            "exec" => Ok(CmdKind::Exec),
            "execrows" => Ok(CmdKind::ExecRows),
            other => Err(AnalyzeError::new(
                ErrorKind::BadAnnotation,
                format!("unknown command ':{other}' (expected one, many, exec, or execrows)"),
            )),
        }
    }
}

impl std::fmt::Display for CmdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, nullability-aware query parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// 1-based position of the placeholder in the normalized SQL
    pub ordinal: usize,
    /// Best human identifier inferable from the use site; `arg{ordinal}`
    /// when nothing better is available. Duplicates are preserved.
    pub name: String,
    pub sql_type: SqlType,
    pub not_null: bool,
}

/// A typed, nullability-aware output column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Base table the column came from; empty for computed columns
    pub source_table: String,
    pub sql_type: SqlType,
    pub not_null: bool,
}

/// A fully analyzed query, ready for code emission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Identifier for the generated function
    pub name: String,
    pub cmd: CmdKind,
    /// Normalized SQL with positional placeholders in source order
    pub sql: String,
    pub params: Vec<Param>,
    /// Empty for `exec` / `execrows`
    pub columns: Vec<Column>,
    /// Primary table of the statement; resolves unqualified references when
    /// exactly one table is in scope
    pub default_table: String,
    pub filename: String,
    pub line: usize,
}

impl Query {
    /// Parameter identifiers with colliding names disambiguated by suffixing
    /// `_2`, `_3`, ... in ordinal order. `params` itself keeps raw names.
    pub fn param_idents(&self) -> Vec<String> {
        let mut seen: Vec<(String, usize)> = Vec::new();
        let mut idents = Vec::with_capacity(self.params.len());
        for param in &self.params {
            match seen.iter_mut().find(|(name, _)| *name == param.name) {
                Some((_, count)) => {
                    *count += 1;
                    idents.push(format!("{}_{}", param.name, count));
                }
                None => {
                    seen.push((param.name.clone(), 1));
                    idents.push(param.name.clone());
                }
            }
        }
        idents
    }
}

/// 1-indexed line range of a statement in its source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StmtRange {
    pub start: usize,
    pub end: usize,
}

/// One successfully analyzed query and where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEntry {
    pub file: String,
    pub range: StmtRange,
    pub query: Query,
}

/// A type override rule, applied downstream by the emitter.
/// The analyzer records raw SQL types so these can match on them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Override {
    pub db_type: String,
    pub host_type: String,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub column_name: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
}

/// Per-package generation settings, provided by the driver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateSettings {
    pub package: String,
    #[serde(default)]
    pub emit_json_tags: bool,
    #[serde(default)]
    pub emit_prepared_queries: bool,
    #[serde(default)]
    pub overrides: Vec<Override>,
}

/// The package-level bundle handed to the external emitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generateable {
    pub catalog: Catalog,
    pub queries: Vec<QueryEntry>,
    pub settings: GenerateSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmd_kind_round_trips() {
        for s in ["one", "many", "exec", "execrows"] {
            assert_eq!(s.parse::<CmdKind>().unwrap().as_str(), s);
        }
        assert!("execlots".parse::<CmdKind>().is_err());
    }

    #[test]
    fn param_idents_disambiguate_collisions() {
        let query = Query {
            name: "UpdateUserAt".into(),
            cmd: CmdKind::Exec,
            sql: String::new(),
            params: ["first_name", "last_name", "id", "first_name"]
                .iter()
                .enumerate()
                .map(|(i, name)| Param {
                    ordinal: i + 1,
                    name: (*name).into(),
                    sql_type: SqlType::Int,
                    not_null: true,
                })
                .collect(),
            columns: vec![],
            default_table: "users".into(),
            filename: String::new(),
            line: 1,
        };
        assert_eq!(
            query.param_idents(),
            ["first_name", "last_name", "id", "first_name_2"]
        );
    }
}
