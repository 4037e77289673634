//! Query scope: the set of tables visible inside a single statement,
//! with the nullability context each contributes.

use sqlparser::ast::{
    Delete, FromTable, Ident, Insert, JoinOperator, Query as AstQuery, Select, SetExpr, Statement,
    TableFactor, TableWithJoins,
};

use crate::error::{AnalyzeError, ErrorKind, Span};
use crate::ir::Column;
use crate::schema::Catalog;
use crate::types::SqlType;

use super::projection;

/// What a scope entry is backed by
#[derive(Debug, Clone)]
pub(crate) enum TableSource {
    /// A base table in the catalog
    Base(String),
    /// A derived table (subquery in FROM) with its projected columns
    Derived(Vec<Column>),
}

/// One visible table: its alias, backing source, and whether an outer join
/// makes its rows optional
#[derive(Debug, Clone)]
pub(crate) struct ScopeEntry {
    pub alias: String,
    pub source: TableSource,
    pub outer_nullable: bool,
}

/// A column reference resolved against a scope
#[derive(Debug, Clone)]
pub(crate) struct ResolvedColumn {
    pub name: String,
    pub source_table: String,
    pub sql_type: SqlType,
    pub not_null: bool,
}

/// The tables visible inside one statement, in FROM order
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    pub entries: Vec<ScopeEntry>,
    pub default_table: String,
}

impl Scope {
    pub fn for_statement(stmt: &Statement, catalog: &Catalog) -> Result<Scope, AnalyzeError> {
        match stmt {
            Statement::Query(query) => Self::for_query(query, catalog),
            Statement::Insert(insert) => Self::for_insert(insert, catalog),
            Statement::Update { table, .. } => {
                Self::from_table_list(std::slice::from_ref(table), catalog)
            }
            Statement::Delete(delete) => Self::for_delete(delete, catalog),
            other => Err(unsupported_statement(other)),
        }
    }

    pub fn for_query(query: &AstQuery, catalog: &Catalog) -> Result<Scope, AnalyzeError> {
        match &*query.body {
            SetExpr::Select(select) => Self::for_select(select, catalog),
            _ => Err(AnalyzeError::new(
                ErrorKind::Unnormalizable,
                "set operations (UNION, INTERSECT, EXCEPT) are not supported",
            )),
        }
    }

    pub fn for_select(select: &Select, catalog: &Catalog) -> Result<Scope, AnalyzeError> {
        Self::from_table_list(&select.from, catalog)
    }

    fn for_insert(insert: &Insert, catalog: &Catalog) -> Result<Scope, AnalyzeError> {
        let mut scope = Scope::default();
        scope.add_base_table(&super::insert_table_name(insert)?.0, None, catalog, false)?;
        Ok(scope)
    }

    fn for_delete(delete: &Delete, catalog: &Catalog) -> Result<Scope, AnalyzeError> {
        let from = match &delete.from {
            FromTable::WithFromKeyword(tables) => tables,
            FromTable::WithoutKeyword(tables) => tables,
        };
        Self::from_table_list(from, catalog)
    }

    fn from_table_list(
        from: &[TableWithJoins],
        catalog: &Catalog,
    ) -> Result<Scope, AnalyzeError> {
        let mut scope = Scope::default();
        for table_with_joins in from {
            scope.add_factor(&table_with_joins.relation, catalog, false)?;
            for join in &table_with_joins.joins {
                match &join.join_operator {
                    JoinOperator::Inner(_) | JoinOperator::CrossJoin => {
                        scope.add_factor(&join.relation, catalog, false)?;
                    }
                    JoinOperator::LeftOuter(_) => {
                        scope.add_factor(&join.relation, catalog, true)?;
                    }
                    JoinOperator::RightOuter(_) => {
                        for entry in &mut scope.entries {
                            entry.outer_nullable = true;
                        }
                        scope.add_factor(&join.relation, catalog, false)?;
                    }
                    JoinOperator::FullOuter(_) => {
                        for entry in &mut scope.entries {
                            entry.outer_nullable = true;
                        }
                        scope.add_factor(&join.relation, catalog, true)?;
                    }
                    _ => {
                        return Err(AnalyzeError::new(
                            ErrorKind::UnsupportedStatement,
                            "unsupported join type",
                        ));
                    }
                }
            }
        }
        Ok(scope)
    }

    fn add_factor(
        &mut self,
        factor: &TableFactor,
        catalog: &Catalog,
        outer_nullable: bool,
    ) -> Result<(), AnalyzeError> {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let alias = alias.as_ref().map(|a| a.name.value.clone());
                self.add_base_table(&name.0, alias, catalog, outer_nullable)
            }
            TableFactor::Derived {
                lateral,
                subquery,
                alias,
            } => {
                if *lateral {
                    return Err(AnalyzeError::new(
                        ErrorKind::UnsupportedStatement,
                        "LATERAL derived tables are not supported",
                    ));
                }
                let alias = alias.as_ref().map(|a| a.name.value.clone()).ok_or_else(|| {
                    AnalyzeError::new(
                        ErrorKind::UnsupportedStatement,
                        "derived tables require an alias",
                    )
                })?;
                let columns = projection::resolve_query(subquery, catalog)?;
                if self.default_table.is_empty() {
                    self.default_table = alias.clone();
                }
                self.entries.push(ScopeEntry {
                    alias,
                    source: TableSource::Derived(columns),
                    outer_nullable,
                });
                Ok(())
            }
            _ => Err(AnalyzeError::new(
                ErrorKind::UnsupportedStatement,
                "unsupported table reference in FROM clause",
            )),
        }
    }

    fn add_base_table(
        &mut self,
        name: &[Ident],
        alias: Option<String>,
        catalog: &Catalog,
        outer_nullable: bool,
    ) -> Result<(), AnalyzeError> {
        let ident = name.last().ok_or_else(|| {
            AnalyzeError::new(ErrorKind::UnknownTable, "empty table name")
        })?;
        let table = catalog.get_table(&ident.value).ok_or_else(|| {
            AnalyzeError::new(
                ErrorKind::UnknownTable,
                format!("table '{}' not found in the schema", ident.value),
            )
            .with_span(Span::from_sqlparser(&ident.span))
        })?;
        let table_name = table.name.clone();
        if self.default_table.is_empty() {
            self.default_table = table_name.clone();
        }
        self.entries.push(ScopeEntry {
            alias: alias.unwrap_or_else(|| ident.value.clone()),
            source: TableSource::Base(table_name),
            outer_nullable,
        });
        Ok(())
    }

    pub fn entry(&self, alias: &str) -> Option<&ScopeEntry> {
        self.entries
            .iter()
            .find(|e| e.alias.eq_ignore_ascii_case(alias))
    }

    /// Resolve a possibly-qualified column reference per the scope rules:
    /// qualified references bind through their alias; unqualified references
    /// must match exactly one entry.
    pub fn resolve_idents(
        &self,
        idents: &[Ident],
        catalog: &Catalog,
    ) -> Result<ResolvedColumn, AnalyzeError> {
        match idents {
            [column] => self.resolve_unqualified(column, catalog),
            [table, column] => self.resolve_qualified(table, column, catalog),
            [_schema, table, column] => self.resolve_qualified(table, column, catalog),
            _ => Err(AnalyzeError::new(
                ErrorKind::UnknownColumn,
                format!(
                    "cannot resolve column reference '{}'",
                    idents
                        .iter()
                        .map(|i| i.value.as_str())
                        .collect::<Vec<_>>()
                        .join(".")
                ),
            )),
        }
    }

    fn resolve_qualified(
        &self,
        table: &Ident,
        column: &Ident,
        catalog: &Catalog,
    ) -> Result<ResolvedColumn, AnalyzeError> {
        let entry = self.entry(&table.value).ok_or_else(|| {
            AnalyzeError::new(
                ErrorKind::UnknownTable,
                format!("table or alias '{}' not found in query scope", table.value),
            )
            .with_span(Span::from_sqlparser(&table.span))
        })?;
        resolve_in_entry(entry, column, catalog)?.ok_or_else(|| {
            let mut err = AnalyzeError::new(
                ErrorKind::UnknownColumn,
                format!(
                    "column '{}' not found in '{}'",
                    column.value, entry.alias
                ),
            )
            .with_span(Span::from_sqlparser(&column.span));
            if let Some(suggestion) = find_similar(entry_column_names(entry, catalog), &column.value)
            {
                err = err.with_help(format!("did you mean '{suggestion}'?"));
            }
            err
        })
    }

    fn resolve_unqualified(
        &self,
        column: &Ident,
        catalog: &Catalog,
    ) -> Result<ResolvedColumn, AnalyzeError> {
        let mut matches: Vec<(&str, ResolvedColumn)> = Vec::new();
        for entry in &self.entries {
            if let Some(resolved) = resolve_in_entry(entry, column, catalog)? {
                matches.push((entry.alias.as_str(), resolved));
            }
        }
        match matches.len() {
            1 => Ok(matches.remove(0).1),
            0 => {
                let mut err = AnalyzeError::new(
                    ErrorKind::UnknownColumn,
                    format!("column '{}' not found in any table in scope", column.value),
                )
                .with_span(Span::from_sqlparser(&column.span));
                let candidates = self
                    .entries
                    .iter()
                    .flat_map(|e| entry_column_names(e, catalog));
                if let Some(suggestion) = find_similar(candidates, &column.value) {
                    err = err.with_help(format!("did you mean '{suggestion}'?"));
                }
                Err(err)
            }
            _ => {
                let tables: Vec<&str> = matches.iter().map(|(alias, _)| *alias).collect();
                Err(AnalyzeError::new(
                    ErrorKind::AmbiguousColumn,
                    format!(
                        "column '{}' is ambiguous (found in: {})",
                        column.value,
                        tables.join(", ")
                    ),
                )
                .with_span(Span::from_sqlparser(&column.span))
                .with_help(format!(
                    "qualify the column: {}.{}",
                    tables[0], column.value
                )))
            }
        }
    }

    /// All columns an entry contributes, in declaration order, with
    /// nullability already adjusted for the entry's join position.
    pub fn entry_columns(
        entry: &ScopeEntry,
        catalog: &Catalog,
    ) -> Result<Vec<Column>, AnalyzeError> {
        match &entry.source {
            TableSource::Base(table_name) => {
                let table = catalog.get_table(table_name).ok_or_else(|| {
                    AnalyzeError::new(
                        ErrorKind::UnknownTable,
                        format!("table '{table_name}' not found in the schema"),
                    )
                })?;
                Ok(table
                    .columns
                    .values()
                    .map(|def| Column {
                        name: def.name.clone(),
                        source_table: table.name.clone(),
                        sql_type: def.sql_type.clone(),
                        not_null: def.not_null && !entry.outer_nullable,
                    })
                    .collect())
            }
            TableSource::Derived(columns) => Ok(columns
                .iter()
                .map(|col| Column {
                    not_null: col.not_null && !entry.outer_nullable,
                    ..col.clone()
                })
                .collect()),
        }
    }
}

fn resolve_in_entry(
    entry: &ScopeEntry,
    column: &Ident,
    catalog: &Catalog,
) -> Result<Option<ResolvedColumn>, AnalyzeError> {
    match &entry.source {
        TableSource::Base(table_name) => {
            let table = catalog.get_table(table_name).ok_or_else(|| {
                AnalyzeError::new(
                    ErrorKind::UnknownTable,
                    format!("table '{table_name}' not found in the schema"),
                )
            })?;
            Ok(table.get_column(&column.value).map(|def| ResolvedColumn {
                name: def.name.clone(),
                source_table: table.name.clone(),
                sql_type: def.sql_type.clone(),
                not_null: def.not_null && !entry.outer_nullable,
            }))
        }
        TableSource::Derived(columns) => Ok(columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(&column.value))
            .map(|c| ResolvedColumn {
                name: c.name.clone(),
                source_table: c.source_table.clone(),
                sql_type: c.sql_type.clone(),
                not_null: c.not_null && !entry.outer_nullable,
            })),
    }
}

fn entry_column_names<'a>(
    entry: &'a ScopeEntry,
    catalog: &'a Catalog,
) -> Box<dyn Iterator<Item = &'a str> + 'a> {
    match &entry.source {
        TableSource::Base(table_name) => match catalog.get_table(table_name) {
            Some(table) => Box::new(table.columns.keys().map(|s| s.as_str())),
            None => Box::new(std::iter::empty()),
        },
        TableSource::Derived(columns) => Box::new(columns.iter().map(|c| c.name.as_str())),
    }
}

pub(crate) fn unsupported_statement(stmt: &Statement) -> AnalyzeError {
    let keyword = stmt
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or("statement")
        .to_uppercase();
    AnalyzeError::new(
        ErrorKind::UnsupportedStatement,
        format!("{keyword} statements are not supported; expected SELECT, INSERT, UPDATE, or DELETE"),
    )
}

/// Pick a close column name for "did you mean" help
fn find_similar<'a>(candidates: impl Iterator<Item = &'a str>, name: &str) -> Option<String> {
    let name_lower = name.to_lowercase();
    let mut best: Option<(usize, &str)> = None;

    for candidate in candidates {
        let distance = levenshtein(&name_lower, &candidate.to_lowercase());
        if distance <= 3 && best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, candidate));
        }
    }

    best.map(|(_, name)| name.to_string())
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut dp = vec![vec![0; n + 1]; m + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=n {
        dp[0][j] = j;
    }

    for i in 1..=m {
        for j in 1..=n {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            dp[i][j] = (dp[i - 1][j] + 1)
                .min(dp[i][j - 1] + 1)
                .min(dp[i - 1][j - 1] + cost);
        }
    }

    dp[m][n]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;

    fn catalog() -> Catalog {
        let mut builder = SchemaBuilder::new();
        builder
            .parse(
                r#"
                CREATE TABLE users (id int NOT NULL, first_name varchar NOT NULL);
                CREATE TABLE orders (id int NOT NULL, user_id int NOT NULL);
                "#,
            )
            .unwrap();
        builder.build()
    }

    fn scope_for(sql: &str, catalog: &Catalog) -> Result<Scope, AnalyzeError> {
        let dialect = crate::dialect::SqlDialect::MySql.parser_dialect();
        let statements = sqlparser::parser::Parser::parse_sql(dialect.as_ref(), sql).unwrap();
        Scope::for_statement(&statements[0], catalog)
    }

    #[test]
    fn left_join_marks_right_side_nullable() {
        let catalog = catalog();
        let scope = scope_for(
            "SELECT * FROM orders o LEFT JOIN users u ON u.id = o.user_id",
            &catalog,
        )
        .unwrap();
        assert_eq!(scope.default_table, "orders");
        assert!(!scope.entry("o").unwrap().outer_nullable);
        assert!(scope.entry("u").unwrap().outer_nullable);
    }

    #[test]
    fn right_join_marks_left_side_nullable() {
        let catalog = catalog();
        let scope = scope_for(
            "SELECT * FROM orders o RIGHT JOIN users u ON u.id = o.user_id",
            &catalog,
        )
        .unwrap();
        assert!(scope.entry("o").unwrap().outer_nullable);
        assert!(!scope.entry("u").unwrap().outer_nullable);
    }

    #[test]
    fn inner_join_marks_neither() {
        let catalog = catalog();
        let scope = scope_for(
            "SELECT * FROM orders o JOIN users u ON u.id = o.user_id",
            &catalog,
        )
        .unwrap();
        assert!(!scope.entry("o").unwrap().outer_nullable);
        assert!(!scope.entry("u").unwrap().outer_nullable);
    }

    #[test]
    fn unknown_table_in_from() {
        let catalog = catalog();
        let err = scope_for("SELECT * FROM ghosts", &catalog).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownTable);
    }

    #[test]
    fn ambiguous_unqualified_reference() {
        let catalog = catalog();
        let scope = scope_for("SELECT 1 FROM users, orders", &catalog).unwrap();
        let ident = [Ident::new("id")];
        let err = scope.resolve_idents(&ident, &catalog).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AmbiguousColumn);
    }

    #[test]
    fn suggestion_for_misspelled_column() {
        let catalog = catalog();
        let scope = scope_for("SELECT 1 FROM users", &catalog).unwrap();
        let ident = [Ident::new("frist_name")];
        let err = scope.resolve_idents(&ident, &catalog).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownColumn);
        assert!(err.help.unwrap().contains("first_name"));
    }
}
