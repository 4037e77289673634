//! Projection analysis: the ordered, typed, nullability-aware output
//! columns a query projects.

use sqlparser::ast::{Expr, Query as AstQuery, Select, SelectItem, SetExpr};

use crate::error::{AnalyzeError, ErrorKind};
use crate::ir::Column;
use crate::schema::Catalog;
use crate::types::SqlType;

use super::infer::infer_expr;
use super::normalize;
use super::scope::Scope;

/// Resolve the projected columns of a whole query (used for derived tables).
pub(crate) fn resolve_query(
    query: &AstQuery,
    catalog: &Catalog,
) -> Result<Vec<Column>, AnalyzeError> {
    let SetExpr::Select(select) = &*query.body else {
        return Err(AnalyzeError::new(
            ErrorKind::Unnormalizable,
            "set operations (UNION, INTERSECT, EXCEPT) are not supported",
        ));
    };
    let scope = Scope::for_select(select, catalog)?;
    resolve_select(select, &scope, catalog)
}

/// Resolve the projected columns of a SELECT against its scope.
pub(crate) fn resolve_select(
    select: &Select,
    scope: &Scope,
    catalog: &Catalog,
) -> Result<Vec<Column>, AnalyzeError> {
    let mut columns = Vec::new();

    for item in &select.projection {
        match item {
            SelectItem::Wildcard(_) => {
                if scope.entries.is_empty() {
                    return Err(AnalyzeError::new(
                        ErrorKind::UnknownTable,
                        "SELECT * requires at least one table in the FROM clause",
                    ));
                }
                for entry in &scope.entries {
                    columns.extend(Scope::entry_columns(entry, catalog)?);
                }
            }
            SelectItem::QualifiedWildcard(name, _) => {
                let alias = name.0.last().map(|i| i.value.clone()).unwrap_or_default();
                let entry = scope.entry(&alias).ok_or_else(|| {
                    AnalyzeError::new(
                        ErrorKind::UnknownTable,
                        format!("table or alias '{alias}' not found in query scope"),
                    )
                })?;
                columns.extend(Scope::entry_columns(entry, catalog)?);
            }
            SelectItem::UnnamedExpr(expr) => {
                let name = match expr {
                    Expr::Identifier(ident) => ident.value.clone(),
                    Expr::CompoundIdentifier(idents) => idents
                        .last()
                        .map(|i| i.value.clone())
                        .unwrap_or_default(),
                    other => normalize::expr_to_sql(other, catalog)?,
                };
                columns.push(column_from_expr(expr, name, scope, catalog)?);
            }
            SelectItem::ExprWithAlias { expr, alias } => {
                columns.push(column_from_expr(expr, alias.value.clone(), scope, catalog)?);
            }
        }
    }

    Ok(columns)
}

fn column_from_expr(
    expr: &Expr,
    name: String,
    scope: &Scope,
    catalog: &Catalog,
) -> Result<Column, AnalyzeError> {
    let info = infer_expr(expr, scope, catalog)?;
    Ok(Column {
        name,
        source_table: info.table.unwrap_or_default(),
        sql_type: info.sql_type.unwrap_or(SqlType::Unknown),
        not_null: info.not_null.unwrap_or(false),
    })
}
