//! Schema builder - walks CREATE TABLE / ALTER TABLE ASTs into a Catalog

use sqlparser::ast::{
    AlterTableOperation, ColumnOption, ObjectName, Statement, TableConstraint,
};
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use crate::dialect::SqlDialect;
use crate::error::{AnalyzeError, ErrorKind, Span};
use crate::schema::{Catalog, ColumnDef, TableSchema};
use crate::source::split_statements;
use crate::types::SqlType;

/// Builder for constructing a Catalog from SQL schema files.
///
/// Schema may be spread across files; `parse` is called once per file and
/// statements apply in file order. Any schema error is fatal: no query can
/// be analyzed against a malformed catalog.
pub struct SchemaBuilder {
    dialect: SqlDialect,
    catalog: Catalog,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::with_dialect(SqlDialect::default())
    }

    pub fn with_dialect(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            catalog: Catalog::new(),
        }
    }

    /// Parse one schema file's worth of DDL into the catalog
    pub fn parse(&mut self, sql: &str) -> Result<(), AnalyzeError> {
        let dialect = self.dialect.parser_dialect();

        for raw in split_statements(sql) {
            let statements =
                Parser::parse_sql(dialect.as_ref(), raw.text).map_err(|e| {
                    AnalyzeError::new(
                        ErrorKind::UnparseableDdl,
                        format!("failed to parse schema statement: {e}"),
                    )
                    .with_span(Span::at(raw.start_line, 1))
                })?;
            for stmt in &statements {
                self.process_statement(stmt)
                    .map_err(|e| match e.span {
                        Some(_) => e,
                        None => e.with_span(Span::at(raw.start_line, 1)),
                    })?;
            }
        }
        Ok(())
    }

    fn process_statement(&mut self, stmt: &Statement) -> Result<(), AnalyzeError> {
        match stmt {
            Statement::CreateTable(create) => self.process_create_table(create),
            Statement::AlterTable {
                name, operations, ..
            } => self.process_alter_table(name, operations),
            // Indexes, SET statements, grants and the like carry no column
            // information the analyzer needs.
            _ => Ok(()),
        }
    }

    fn process_create_table(
        &mut self,
        create: &sqlparser::ast::CreateTable,
    ) -> Result<(), AnalyzeError> {
        let name = table_name(&create.name);
        let mut table = TableSchema::new(name);

        for column in &create.columns {
            table.push_column(convert_column(column))?;
        }

        // PRIMARY KEY declared as a table constraint implies NOT NULL
        for constraint in &create.constraints {
            if let TableConstraint::PrimaryKey { columns, .. } = constraint {
                for key_col in columns {
                    if let Some(col) = table
                        .columns
                        .values_mut()
                        .find(|c| c.name.eq_ignore_ascii_case(&key_col.value))
                    {
                        col.not_null = true;
                    }
                }
            }
        }

        self.catalog.add_table(table)
    }

    fn process_alter_table(
        &mut self,
        name: &ObjectName,
        operations: &[AlterTableOperation],
    ) -> Result<(), AnalyzeError> {
        let table_name = table_name(name);
        let table = self.catalog.get_table_mut(&table_name).ok_or_else(|| {
            AnalyzeError::new(
                ErrorKind::UnknownTable,
                format!("ALTER TABLE references unknown table '{table_name}'"),
            )
            .with_help("the CREATE TABLE statement must appear earlier in the schema")
        })?;

        for operation in operations {
            match operation {
                AlterTableOperation::AddColumn { column_def, .. } => {
                    table.push_column(convert_column(column_def))?;
                }
                AlterTableOperation::DropColumn { column_name, .. } => {
                    if table.drop_column(&column_name.value).is_none() {
                        return Err(AnalyzeError::new(
                            ErrorKind::UnknownColumn,
                            format!(
                                "ALTER TABLE '{}' drops unknown column '{}'",
                                table_name, column_name.value
                            ),
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Consume the builder and return the finished catalog
    pub fn build(self) -> Catalog {
        self.catalog
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a parsed column definition, folding in its options
fn convert_column(column: &sqlparser::ast::ColumnDef) -> ColumnDef {
    let mut col = ColumnDef::new(&column.name.value, SqlType::from_ast(&column.data_type));

    for option in &column.options {
        match &option.option {
            ColumnOption::Null => col.not_null = false,
            ColumnOption::NotNull => col.not_null = true,
            ColumnOption::Unique { is_primary, .. } => {
                if *is_primary {
                    col.not_null = true;
                }
            }
            ColumnOption::DialectSpecific(tokens) => {
                if tokens.iter().any(|t| {
                    matches!(t, Token::Word(w) if w.value.eq_ignore_ascii_case("auto_increment"))
                }) {
                    col.auto_increment = true;
                }
            }
            _ => {}
        }
    }

    col
}

/// Drop any schema qualifier; the catalog indexes by unqualified table name
fn table_name(name: &ObjectName) -> String {
    name.0
        .last()
        .map(|ident| ident.value.clone())
        .unwrap_or_else(|| name.to_string())
}
