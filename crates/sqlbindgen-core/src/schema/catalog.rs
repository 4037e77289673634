//! Schema catalog - the indexed view of tables built from DDL

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyzeError, ErrorKind};
use crate::types::SqlType;

/// All tables visible to query analysis.
///
/// Built once per generation run and immutable afterwards; queries take it
/// by shared reference. Table names are unqualified; lookups are
/// case-insensitive but names keep their declared casing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub tables: IndexMap<String, TableSchema>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table. Redefining an existing table is an error.
    pub fn add_table(&mut self, table: TableSchema) -> Result<(), AnalyzeError> {
        if self.get_table(&table.name).is_some() {
            return Err(AnalyzeError::new(
                ErrorKind::DuplicateTable,
                format!("table '{}' is defined more than once", table.name),
            ));
        }
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    /// Case-insensitive table lookup
    pub fn get_table(&self, name: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut TableSchema> {
        self.tables
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.get_table(name).is_some()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|s| s.as_str()).collect()
    }
}

/// A table: an ordered sequence of column definitions.
///
/// Insertion order is declaration order; `SELECT *` expands in this order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: IndexMap<String, ColumnDef>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: IndexMap::new(),
        }
    }

    /// Append a column. Redefining an existing column is an error.
    pub fn push_column(&mut self, col: ColumnDef) -> Result<(), AnalyzeError> {
        if self.get_column(&col.name).is_some() {
            return Err(AnalyzeError::new(
                ErrorKind::DuplicateColumn,
                format!(
                    "column '{}' is defined more than once in table '{}'",
                    col.name, self.name
                ),
            ));
        }
        self.columns.insert(col.name.clone(), col);
        Ok(())
    }

    /// Case-insensitive column lookup
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Remove a column, preserving the order of the rest
    pub fn drop_column(&mut self, name: &str) -> Option<ColumnDef> {
        let key = self
            .columns
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned()?;
        self.columns.shift_remove(&key)
    }

    pub fn column_exists(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
    pub not_null: bool,
    pub auto_increment: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            not_null: false,
            auto_increment: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Declared ENUM values in declaration order, if this is an ENUM column
    pub fn enum_values(&self) -> Option<&[String]> {
        match &self.sql_type {
            SqlType::Enum(values) => Some(values),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut catalog = Catalog::new();
        let mut table = TableSchema::new("Users");
        table
            .push_column(ColumnDef::new("Id", SqlType::Int).not_null())
            .unwrap();
        catalog.add_table(table).unwrap();

        let table = catalog.get_table("users").unwrap();
        assert_eq!(table.name, "Users");
        assert_eq!(table.get_column("ID").unwrap().name, "Id");
    }

    #[test]
    fn duplicate_table_is_an_error() {
        let mut catalog = Catalog::new();
        catalog.add_table(TableSchema::new("users")).unwrap();
        let err = catalog.add_table(TableSchema::new("USERS")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateTable);
    }

    #[test]
    fn duplicate_column_is_an_error() {
        let mut table = TableSchema::new("users");
        table
            .push_column(ColumnDef::new("id", SqlType::Int))
            .unwrap();
        let err = table
            .push_column(ColumnDef::new("ID", SqlType::Int))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateColumn);
    }

    #[test]
    fn drop_column_preserves_order() {
        let mut table = TableSchema::new("users");
        for name in ["a", "b", "c"] {
            table
                .push_column(ColumnDef::new(name, SqlType::Int))
                .unwrap();
        }
        table.drop_column("B").unwrap();
        let names: Vec<_> = table.columns.keys().collect();
        assert_eq!(names, ["a", "c"]);
    }
}
