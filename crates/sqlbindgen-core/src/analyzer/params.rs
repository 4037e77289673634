//! Parameter inference: turn every placeholder into a typed, named,
//! nullability-aware parameter descriptor.
//!
//! The walk visits placeholders in the exact order the normalizer emits
//! them, so ordinals line up with the normalized SQL. Numbered (`$N`)
//! placeholders keep their source positions; nothing is reordered or
//! deduplicated.

use sqlparser::ast::{
    Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, Insert, Join,
    JoinOperator, Query as AstQuery, Select, SetExpr, Statement, TableFactor, Value,
};

use crate::error::{AnalyzeError, ErrorKind};
use crate::ir::Param;
use crate::schema::Catalog;
use crate::types::SqlType;

use super::infer::{self, infer_expr};
use super::scope::Scope;
use super::UpdateLimit;

/// Infer the ordered parameter list for a statement.
pub(crate) fn infer(
    stmt: &Statement,
    scope: &Scope,
    catalog: &Catalog,
    update_limit: Option<&UpdateLimit>,
) -> Result<Vec<Param>, AnalyzeError> {
    let mut walker = Walker {
        catalog,
        sites: Vec::new(),
    };

    match stmt {
        Statement::Query(query) => walker.query(query)?,
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => {
            for join in &table.joins {
                walker.join(join, scope)?;
            }
            for assignment in assignments {
                let target = match &assignment.target {
                    sqlparser::ast::AssignmentTarget::ColumnName(name) => name,
                    sqlparser::ast::AssignmentTarget::Tuple(_) => {
                        return Err(AnalyzeError::new(
                            ErrorKind::Unnormalizable,
                            "cannot normalize tuple assignment in SET",
                        ));
                    }
                };
                // the target must resolve even when the value is a literal
                let resolved = scope.resolve_idents(&target.0, catalog)?;
                if placeholder(&assignment.value) {
                    walker.sites.push(Site {
                        name: Some(resolved.name),
                        sql_type: Some(resolved.sql_type),
                        not_null: Some(resolved.not_null),
                    });
                } else {
                    walker.expr(&assignment.value, scope)?;
                }
            }
            if let Some(selection) = selection {
                walker.expr(selection, scope)?;
            }
            if let Some(UpdateLimit::Placeholder) = update_limit {
                walker.sites.push(Site::limit("limit"));
            }
        }
        Statement::Delete(delete) => {
            if let Some(selection) = &delete.selection {
                walker.expr(selection, scope)?;
            }
            for order in &delete.order_by {
                walker.expr(&order.expr, scope)?;
            }
            if let Some(limit) = &delete.limit {
                walker.limit_site(limit, "limit");
            }
        }
        Statement::Insert(insert) => walker.insert(insert, scope)?,
        other => return Err(super::scope::unsupported_statement(other)),
    }

    walker.into_params()
}

/// One placeholder occurrence and what its use site taught us
#[derive(Debug, Clone, Default)]
struct Site {
    name: Option<String>,
    sql_type: Option<SqlType>,
    not_null: Option<bool>,
}

impl Site {
    fn limit(name: &str) -> Self {
        Site {
            name: Some(name.to_string()),
            sql_type: Some(SqlType::Int),
            not_null: Some(true),
        }
    }
}

struct Walker<'a> {
    catalog: &'a Catalog,
    sites: Vec<Site>,
}

impl Walker<'_> {
    fn into_params(self) -> Result<Vec<Param>, AnalyzeError> {
        let mut params = Vec::with_capacity(self.sites.len());
        for (i, site) in self.sites.into_iter().enumerate() {
            let ordinal = i + 1;
            let sql_type = site.sql_type.ok_or_else(|| {
                AnalyzeError::new(
                    ErrorKind::UnknownParamType,
                    format!("cannot infer a type for parameter {ordinal}"),
                )
                .with_help("compare the placeholder against a typed column or literal")
            })?;
            params.push(Param {
                ordinal,
                name: site
                    .name
                    .unwrap_or_else(|| format!("arg{ordinal}")),
                sql_type,
                not_null: site.not_null.unwrap_or(true),
            });
        }
        Ok(params)
    }

    /// Walk a SELECT query in normalizer emission order: projection, FROM
    /// (derived subqueries and join conditions), WHERE, GROUP BY, HAVING,
    /// ORDER BY, LIMIT, OFFSET.
    fn query(&mut self, query: &AstQuery) -> Result<(), AnalyzeError> {
        let SetExpr::Select(select) = &*query.body else {
            return Err(AnalyzeError::new(
                ErrorKind::Unnormalizable,
                "set operations (UNION, INTERSECT, EXCEPT) are not supported",
            ));
        };
        let scope = Scope::for_select(select, self.catalog)?;
        self.select(select, &scope)?;

        if let Some(order_by) = &query.order_by {
            for order in &order_by.exprs {
                self.expr(&order.expr, &scope)?;
            }
        }
        if let Some(limit) = &query.limit {
            self.limit_site(limit, "limit");
        }
        if let Some(offset) = &query.offset {
            self.limit_site(&offset.value, "offset");
        }
        Ok(())
    }

    fn select(&mut self, select: &Select, scope: &Scope) -> Result<(), AnalyzeError> {
        for item in &select.projection {
            match item {
                sqlparser::ast::SelectItem::UnnamedExpr(expr)
                | sqlparser::ast::SelectItem::ExprWithAlias { expr, .. } => {
                    self.expr(expr, scope)?;
                }
                _ => {}
            }
        }
        for table in &select.from {
            self.table_factor(&table.relation)?;
            for join in &table.joins {
                self.join(join, scope)?;
            }
        }
        if let Some(selection) = &select.selection {
            self.expr(selection, scope)?;
        }
        if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
            for expr in exprs {
                self.expr(expr, scope)?;
            }
        }
        if let Some(having) = &select.having {
            self.expr(having, scope)?;
        }
        Ok(())
    }

    fn join(&mut self, join: &Join, scope: &Scope) -> Result<(), AnalyzeError> {
        self.table_factor(&join.relation)?;
        let constraint = match &join.join_operator {
            JoinOperator::Inner(c)
            | JoinOperator::LeftOuter(c)
            | JoinOperator::RightOuter(c)
            | JoinOperator::FullOuter(c) => c,
            _ => return Ok(()),
        };
        if let sqlparser::ast::JoinConstraint::On(expr) = constraint {
            self.expr(expr, scope)?;
        }
        Ok(())
    }

    fn table_factor(&mut self, factor: &TableFactor) -> Result<(), AnalyzeError> {
        if let TableFactor::Derived { subquery, .. } = factor {
            self.query(subquery)?;
        }
        Ok(())
    }

    fn insert(&mut self, insert: &Insert, scope: &Scope) -> Result<(), AnalyzeError> {
        let table_name = super::insert_table_name(insert)?
            .0
            .last()
            .map(|i| i.value.as_str())
            .unwrap_or_default();
        let table = self.catalog.get_table(table_name).ok_or_else(|| {
            AnalyzeError::new(
                ErrorKind::UnknownTable,
                format!("table '{table_name}' not found in the schema"),
            )
        })?;

        // positional targets: the explicit column list, or every table
        // column in declaration order
        let targets: Vec<(String, SqlType, bool)> = if insert.columns.is_empty() {
            table
                .columns
                .values()
                .map(|def| (def.name.clone(), def.sql_type.clone(), def.not_null))
                .collect()
        } else {
            insert
                .columns
                .iter()
                .map(|ident| {
                    table
                        .get_column(&ident.value)
                        .map(|def| (def.name.clone(), def.sql_type.clone(), def.not_null))
                        .ok_or_else(|| {
                            AnalyzeError::new(
                                ErrorKind::UnknownColumn,
                                format!(
                                    "column '{}' not found in table '{}'",
                                    ident.value, table.name
                                ),
                            )
                        })
                })
                .collect::<Result<_, _>>()?
        };

        let Some(source) = &insert.source else {
            return Ok(());
        };
        match &*source.body {
            SetExpr::Values(values) => {
                for row in &values.rows {
                    for (i, expr) in row.iter().enumerate() {
                        if placeholder(expr) {
                            let (name, sql_type, not_null) =
                                targets.get(i).cloned().ok_or_else(|| {
                                    AnalyzeError::new(
                                        ErrorKind::UnknownParamType,
                                        format!(
                                            "VALUES position {} has no matching insert column",
                                            i + 1
                                        ),
                                    )
                                })?;
                            self.sites.push(Site {
                                name: Some(name),
                                sql_type: Some(sql_type),
                                not_null: Some(not_null),
                            });
                        } else {
                            self.expr(expr, scope)?;
                        }
                    }
                }
                Ok(())
            }
            // INSERT ... SELECT: the source runs against its own scope
            _ => self.query(source),
        }
    }

    fn expr(&mut self, expr: &Expr, scope: &Scope) -> Result<(), AnalyzeError> {
        match expr {
            Expr::Value(Value::Placeholder(_)) => {
                // no use-site hint at all; fails later unless a type exists
                self.sites.push(Site::default());
                Ok(())
            }
            Expr::Value(_) => Ok(()),
            Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
                // resolve so bad references surface even without placeholders
                infer_expr(expr, scope, self.catalog)?;
                Ok(())
            }
            Expr::BinaryOp { left, op, right } => {
                let comparison = infer::is_comparison(op);
                self.operand(left, right, scope, comparison)?;
                self.operand(right, left, scope, comparison)
            }
            Expr::InList {
                expr: needle,
                list,
                ..
            } => {
                let hint = self.hint(needle, scope, true)?;
                for item in list {
                    if placeholder(item) {
                        self.sites.push(hint.clone());
                    } else {
                        self.expr(item, scope)?;
                    }
                }
                Ok(())
            }
            Expr::Between {
                expr: needle,
                low,
                high,
                ..
            } => {
                let hint = self.hint(needle, scope, true)?;
                for bound in [low, high] {
                    if placeholder(bound) {
                        self.sites.push(hint.clone());
                    } else {
                        self.expr(bound, scope)?;
                    }
                }
                Ok(())
            }
            Expr::Like {
                expr: subject,
                pattern,
                ..
            }
            | Expr::ILike {
                expr: subject,
                pattern,
                ..
            } => {
                if placeholder(pattern) {
                    let hint = self.hint(subject, scope, true)?;
                    self.sites.push(hint);
                } else {
                    self.expr(subject, scope)?;
                    self.expr(pattern, scope)?;
                }
                Ok(())
            }
            Expr::UnaryOp { expr, .. } | Expr::Nested(expr) => self.expr(expr, scope),
            Expr::IsNull(expr) | Expr::IsNotNull(expr) => self.expr(expr, scope),
            Expr::Function(func) => {
                match &func.args {
                    FunctionArguments::List(list) => {
                        for arg in &list.args {
                            if let FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) = arg {
                                self.expr(expr, scope)?;
                            }
                        }
                    }
                    FunctionArguments::Subquery(query) => self.query(query)?,
                    FunctionArguments::None => {}
                }
                Ok(())
            }
            Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => {
                if let Some(operand) = operand {
                    self.expr(operand, scope)?;
                }
                for (condition, result) in conditions.iter().zip(results) {
                    self.expr(condition, scope)?;
                    self.expr(result, scope)?;
                }
                if let Some(else_result) = else_result {
                    self.expr(else_result, scope)?;
                }
                Ok(())
            }
            Expr::InSubquery {
                expr: needle,
                subquery,
                ..
            } => {
                if placeholder(needle) {
                    self.sites.push(Site::default());
                } else {
                    self.expr(needle, scope)?;
                }
                self.query(subquery)
            }
            Expr::Subquery(query) | Expr::Exists { subquery: query, .. } => self.query(query),
            Expr::Cast { expr, .. } => self.expr(expr, scope),
            Expr::Tuple(exprs) => {
                for item in exprs {
                    self.expr(item, scope)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Handle one side of a binary operation: a placeholder takes its hint
    /// from the opposite operand, anything else is walked normally.
    fn operand(
        &mut self,
        side: &Expr,
        other: &Expr,
        scope: &Scope,
        comparison: bool,
    ) -> Result<(), AnalyzeError> {
        if placeholder(side) {
            let hint = self.hint(other, scope, comparison)?;
            self.sites.push(hint);
            Ok(())
        } else {
            self.expr(side, scope)
        }
    }

    /// A hint from the opposite operand: its type and nullability always,
    /// its column name only at comparison-shaped sites.
    fn hint(&self, other: &Expr, scope: &Scope, comparison: bool) -> Result<Site, AnalyzeError> {
        if placeholder(other) {
            return Ok(Site::default());
        }
        let info = infer_expr(other, scope, self.catalog)?;
        Ok(Site {
            name: if comparison { info.column } else { None },
            sql_type: info.sql_type,
            not_null: info.not_null,
        })
    }

    fn limit_site(&mut self, expr: &Expr, name: &str) {
        if placeholder(expr) {
            self.sites.push(Site::limit(name));
        }
    }
}

fn placeholder(expr: &Expr) -> bool {
    matches!(expr, Expr::Value(Value::Placeholder(_)))
}
