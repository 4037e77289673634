//! Query normalizer: re-serializes an analyzed AST into the canonical
//! textual form embedded in generated code.
//!
//! Canonical form: keywords and function names lowercased, identifiers
//! preserved, single spaces between tokens, explicit `as` before aliases,
//! all placeholders rendered as positional `?` in source order, wildcards
//! expanded to their resolved column lists, no trailing semicolon.
//!
//! The supported construct set is closed; anything outside it fails the
//! query rather than emitting text that does not round-trip.

use sqlparser::ast::{
    Delete, Distinct, Expr, FromTable, FunctionArg, FunctionArgExpr, FunctionArguments,
    GroupByExpr, Ident, Insert, Join, JoinConstraint, JoinOperator, ObjectName, OrderByExpr,
    Query as AstQuery, Select, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins,
    Value,
};

use crate::error::{AnalyzeError, ErrorKind};
use crate::schema::Catalog;

use super::scope::Scope;
use super::UpdateLimit;

/// Serialize a statement to its normalized form.
pub(crate) fn statement_to_sql(
    stmt: &Statement,
    catalog: &Catalog,
    update_limit: Option<&UpdateLimit>,
) -> Result<String, AnalyzeError> {
    let mut sql = Sql {
        out: String::new(),
        catalog,
    };
    sql.statement(stmt, update_limit)?;
    Ok(sql.out)
}

/// Serialize a single expression (used to name unaliased projections).
pub(crate) fn expr_to_sql(expr: &Expr, catalog: &Catalog) -> Result<String, AnalyzeError> {
    let mut sql = Sql {
        out: String::new(),
        catalog,
    };
    sql.expr(expr)?;
    Ok(sql.out)
}

fn cannot(what: impl std::fmt::Display) -> AnalyzeError {
    AnalyzeError::new(
        ErrorKind::Unnormalizable,
        format!("cannot normalize {what}"),
    )
}

struct Sql<'a> {
    out: String,
    catalog: &'a Catalog,
}

impl Sql<'_> {
    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn statement(
        &mut self,
        stmt: &Statement,
        update_limit: Option<&UpdateLimit>,
    ) -> Result<(), AnalyzeError> {
        match stmt {
            Statement::Query(query) => self.query(query),
            Statement::Insert(insert) => self.insert(insert),
            Statement::Update {
                table,
                assignments,
                from,
                selection,
                returning,
                ..
            } => {
                if from.is_some() {
                    return Err(cannot("UPDATE ... FROM"));
                }
                if returning.is_some() {
                    return Err(cannot("UPDATE ... RETURNING"));
                }
                self.push("update ");
                self.table_with_joins(table)?;
                self.push(" set ");
                for (i, assignment) in assignments.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    match &assignment.target {
                        sqlparser::ast::AssignmentTarget::ColumnName(name) => {
                            self.object_name(name);
                        }
                        sqlparser::ast::AssignmentTarget::Tuple(_) => {
                            return Err(cannot("tuple assignment in SET"));
                        }
                    }
                    self.push(" = ");
                    self.expr(&assignment.value)?;
                }
                if let Some(selection) = selection {
                    self.push(" where ");
                    self.expr(selection)?;
                }
                match update_limit {
                    Some(UpdateLimit::Count(count)) => {
                        self.push(" limit ");
                        self.push(count);
                    }
                    Some(UpdateLimit::Placeholder) => self.push(" limit ?"),
                    None => {}
                }
                Ok(())
            }
            Statement::Delete(delete) => self.delete(delete),
            other => Err(super::scope::unsupported_statement(other)),
        }
    }

    fn query(&mut self, query: &AstQuery) -> Result<(), AnalyzeError> {
        if query.with.is_some() {
            return Err(cannot("common table expressions (WITH)"));
        }
        match &*query.body {
            SetExpr::Select(select) => self.select(select)?,
            SetExpr::Query(inner) => self.query(inner)?,
            SetExpr::SetOperation { .. } => {
                return Err(cannot("set operations (UNION, INTERSECT, EXCEPT)"));
            }
            other => return Err(cannot(format_args!("query body: {other}"))),
        }
        if let Some(order_by) = &query.order_by {
            if !order_by.exprs.is_empty() {
                self.push(" order by ");
                for (i, expr) in order_by.exprs.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.order_by_expr(expr)?;
                }
            }
        }
        if let Some(limit) = &query.limit {
            self.push(" limit ");
            self.expr(limit)?;
        }
        if let Some(offset) = &query.offset {
            self.push(" offset ");
            self.expr(&offset.value)?;
        }
        Ok(())
    }

    fn order_by_expr(&mut self, order: &OrderByExpr) -> Result<(), AnalyzeError> {
        self.expr(&order.expr)?;
        match order.asc {
            Some(true) => self.push(" asc"),
            Some(false) => self.push(" desc"),
            None => {}
        }
        Ok(())
    }

    fn select(&mut self, select: &Select) -> Result<(), AnalyzeError> {
        if select.into.is_some() {
            return Err(cannot("SELECT INTO"));
        }
        let scope = Scope::for_select(select, self.catalog)?;

        self.push("select ");
        match &select.distinct {
            None => {}
            Some(Distinct::Distinct) => self.push("distinct "),
            Some(Distinct::On(_)) => return Err(cannot("DISTINCT ON")),
        }
        for (i, item) in select.projection.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.select_item(item, &scope)?;
        }

        if !select.from.is_empty() {
            self.push(" from ");
            for (i, table) in select.from.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.table_with_joins(table)?;
            }
        }

        if let Some(selection) = &select.selection {
            self.push(" where ");
            self.expr(selection)?;
        }

        match &select.group_by {
            GroupByExpr::Expressions(exprs, modifiers) => {
                if !modifiers.is_empty() {
                    return Err(cannot("GROUP BY modifiers"));
                }
                if !exprs.is_empty() {
                    self.push(" group by ");
                    for (i, expr) in exprs.iter().enumerate() {
                        if i > 0 {
                            self.push(", ");
                        }
                        self.expr(expr)?;
                    }
                }
            }
            GroupByExpr::All(_) => return Err(cannot("GROUP BY ALL")),
        }

        if let Some(having) = &select.having {
            self.push(" having ");
            self.expr(having)?;
        }

        Ok(())
    }

    fn select_item(&mut self, item: &SelectItem, scope: &Scope) -> Result<(), AnalyzeError> {
        match item {
            SelectItem::UnnamedExpr(expr) => self.expr(expr),
            SelectItem::ExprWithAlias { expr, alias } => {
                self.expr(expr)?;
                self.push(" as ");
                self.ident(alias);
                Ok(())
            }
            SelectItem::Wildcard(_) => {
                if scope.entries.is_empty() {
                    return Err(AnalyzeError::new(
                        ErrorKind::UnknownTable,
                        "SELECT * requires at least one table in the FROM clause",
                    ));
                }
                // expand in scope order; qualify when several tables are visible
                let qualify = scope.entries.len() > 1;
                let mut first = true;
                for entry in &scope.entries {
                    for column in Scope::entry_columns(entry, self.catalog)? {
                        if !first {
                            self.push(", ");
                        }
                        first = false;
                        if qualify {
                            self.push(&entry.alias);
                            self.push(".");
                        }
                        self.push(&column.name);
                    }
                }
                Ok(())
            }
            SelectItem::QualifiedWildcard(name, _) => {
                let alias = name
                    .0
                    .last()
                    .map(|i| i.value.clone())
                    .unwrap_or_default();
                let entry = scope.entry(&alias).ok_or_else(|| {
                    AnalyzeError::new(
                        ErrorKind::UnknownTable,
                        format!("table or alias '{alias}' not found in query scope"),
                    )
                })?;
                let mut first = true;
                for column in Scope::entry_columns(entry, self.catalog)? {
                    if !first {
                        self.push(", ");
                    }
                    first = false;
                    self.push(&entry.alias);
                    self.push(".");
                    self.push(&column.name);
                }
                Ok(())
            }
        }
    }

    fn table_with_joins(&mut self, table: &TableWithJoins) -> Result<(), AnalyzeError> {
        self.table_factor(&table.relation)?;
        for join in &table.joins {
            self.join(join)?;
        }
        Ok(())
    }

    fn join(&mut self, join: &Join) -> Result<(), AnalyzeError> {
        let constraint = match &join.join_operator {
            JoinOperator::Inner(c) => {
                self.push(" join ");
                c
            }
            JoinOperator::LeftOuter(c) => {
                self.push(" left join ");
                c
            }
            JoinOperator::RightOuter(c) => {
                self.push(" right join ");
                c
            }
            JoinOperator::FullOuter(c) => {
                self.push(" full join ");
                c
            }
            JoinOperator::CrossJoin => {
                self.push(" cross join ");
                self.table_factor(&join.relation)?;
                return Ok(());
            }
            _ => return Err(cannot("this join type")),
        };
        self.table_factor(&join.relation)?;
        match constraint {
            JoinConstraint::On(expr) => {
                self.push(" on ");
                self.expr(expr)
            }
            JoinConstraint::None => Ok(()),
            JoinConstraint::Using(_) => Err(cannot("JOIN ... USING")),
            JoinConstraint::Natural => Err(cannot("NATURAL JOIN")),
        }
    }

    fn table_factor(&mut self, factor: &TableFactor) -> Result<(), AnalyzeError> {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                self.object_name(name);
                if let Some(alias) = alias {
                    if !alias.columns.is_empty() {
                        return Err(cannot("table alias column lists"));
                    }
                    self.push(" as ");
                    self.ident(&alias.name);
                }
                Ok(())
            }
            TableFactor::Derived {
                lateral,
                subquery,
                alias,
            } => {
                if *lateral {
                    return Err(cannot("LATERAL derived tables"));
                }
                self.push("(");
                self.query(subquery)?;
                self.push(")");
                if let Some(alias) = alias {
                    self.push(" as ");
                    self.ident(&alias.name);
                }
                Ok(())
            }
            _ => Err(cannot("this table reference")),
        }
    }

    fn insert(&mut self, insert: &Insert) -> Result<(), AnalyzeError> {
        if insert.on.is_some() {
            return Err(cannot("INSERT ... ON CONFLICT / ON DUPLICATE KEY"));
        }
        if insert.returning.is_some() {
            return Err(cannot("INSERT ... RETURNING"));
        }
        self.push("insert into ");
        self.object_name(super::insert_table_name(insert)?);
        if !insert.columns.is_empty() {
            self.push(" (");
            for (i, column) in insert.columns.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.ident(column);
            }
            self.push(")");
        }
        let source = insert
            .source
            .as_ref()
            .ok_or_else(|| cannot("INSERT without VALUES or SELECT"))?;
        match &*source.body {
            SetExpr::Values(values) => {
                self.push(" values ");
                for (i, row) in values.rows.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.push("(");
                    for (j, expr) in row.iter().enumerate() {
                        if j > 0 {
                            self.push(", ");
                        }
                        self.expr(expr)?;
                    }
                    self.push(")");
                }
                Ok(())
            }
            _ => {
                self.push(" ");
                self.query(source)
            }
        }
    }

    fn delete(&mut self, delete: &Delete) -> Result<(), AnalyzeError> {
        if !delete.tables.is_empty() {
            return Err(cannot("multi-table DELETE"));
        }
        if delete.using.is_some() {
            return Err(cannot("DELETE ... USING"));
        }
        if delete.returning.is_some() {
            return Err(cannot("DELETE ... RETURNING"));
        }
        let from = match &delete.from {
            FromTable::WithFromKeyword(tables) => tables,
            FromTable::WithoutKeyword(tables) => tables,
        };
        let [table] = from.as_slice() else {
            return Err(cannot("DELETE over multiple tables"));
        };
        self.push("delete from ");
        self.table_with_joins(table)?;
        if let Some(selection) = &delete.selection {
            self.push(" where ");
            self.expr(selection)?;
        }
        if !delete.order_by.is_empty() {
            self.push(" order by ");
            for (i, order) in delete.order_by.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.order_by_expr(order)?;
            }
        }
        if let Some(limit) = &delete.limit {
            self.push(" limit ");
            self.expr(limit)?;
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), AnalyzeError> {
        match expr {
            Expr::Identifier(ident) => {
                self.ident(ident);
                Ok(())
            }
            Expr::CompoundIdentifier(idents) => {
                for (i, ident) in idents.iter().enumerate() {
                    if i > 0 {
                        self.push(".");
                    }
                    self.ident(ident);
                }
                Ok(())
            }
            Expr::Value(value) => {
                self.value(value);
                Ok(())
            }
            Expr::BinaryOp { left, op, right } => {
                self.expr(left)?;
                self.push(" ");
                self.push(&op.to_string().to_lowercase());
                self.push(" ");
                self.expr(right)
            }
            Expr::UnaryOp { op, expr } => {
                match op {
                    sqlparser::ast::UnaryOperator::Not => self.push("not "),
                    sqlparser::ast::UnaryOperator::Minus => self.push("-"),
                    sqlparser::ast::UnaryOperator::Plus => self.push("+"),
                    _ => return Err(cannot("this unary operator")),
                }
                self.expr(expr)
            }
            Expr::Nested(inner) => {
                self.push("(");
                self.expr(inner)?;
                self.push(")");
                Ok(())
            }
            Expr::Function(func) => self.function(func),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                self.expr(expr)?;
                self.push(if *negated { " not in (" } else { " in (" });
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(item)?;
                }
                self.push(")");
                Ok(())
            }
            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                self.expr(expr)?;
                self.push(if *negated { " not in (" } else { " in (" });
                self.query(subquery)?;
                self.push(")");
                Ok(())
            }
            Expr::Between {
                expr,
                negated,
                low,
                high,
            } => {
                self.expr(expr)?;
                self.push(if *negated { " not between " } else { " between " });
                self.expr(low)?;
                self.push(" and ");
                self.expr(high)
            }
            Expr::Like {
                negated,
                expr,
                pattern,
                ..
            } => {
                self.expr(expr)?;
                self.push(if *negated { " not like " } else { " like " });
                self.expr(pattern)
            }
            Expr::ILike {
                negated,
                expr,
                pattern,
                ..
            } => {
                self.expr(expr)?;
                self.push(if *negated { " not ilike " } else { " ilike " });
                self.expr(pattern)
            }
            Expr::IsNull(inner) => {
                self.expr(inner)?;
                self.push(" is null");
                Ok(())
            }
            Expr::IsNotNull(inner) => {
                self.expr(inner)?;
                self.push(" is not null");
                Ok(())
            }
            Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => {
                self.push("case");
                if let Some(operand) = operand {
                    self.push(" ");
                    self.expr(operand)?;
                }
                for (condition, result) in conditions.iter().zip(results) {
                    self.push(" when ");
                    self.expr(condition)?;
                    self.push(" then ");
                    self.expr(result)?;
                }
                if let Some(else_result) = else_result {
                    self.push(" else ");
                    self.expr(else_result)?;
                }
                self.push(" end");
                Ok(())
            }
            Expr::Cast {
                expr, data_type, ..
            } => {
                self.push("cast(");
                self.expr(expr)?;
                self.push(" as ");
                self.push(&data_type.to_string().to_lowercase());
                self.push(")");
                Ok(())
            }
            Expr::Exists { subquery, negated } => {
                if *negated {
                    self.push("not ");
                }
                self.push("exists (");
                self.query(subquery)?;
                self.push(")");
                Ok(())
            }
            Expr::Subquery(query) => {
                self.push("(");
                self.query(query)?;
                self.push(")");
                Ok(())
            }
            Expr::Tuple(exprs) => {
                self.push("(");
                for (i, item) in exprs.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(item)?;
                }
                self.push(")");
                Ok(())
            }
            other => Err(cannot(format_args!("expression: {other}"))),
        }
    }

    fn function(&mut self, func: &sqlparser::ast::Function) -> Result<(), AnalyzeError> {
        if func.over.is_some() {
            return Err(cannot("window functions"));
        }
        let name = func
            .name
            .0
            .iter()
            .map(|i| i.value.to_lowercase())
            .collect::<Vec<_>>()
            .join(".");
        self.push(&name);
        match &func.args {
            FunctionArguments::None => Ok(()),
            FunctionArguments::Subquery(query) => {
                self.push("(");
                self.query(query)?;
                self.push(")");
                Ok(())
            }
            FunctionArguments::List(list) => {
                if !list.clauses.is_empty() {
                    return Err(cannot("function argument clauses"));
                }
                self.push("(");
                if let Some(sqlparser::ast::DuplicateTreatment::Distinct) =
                    list.duplicate_treatment
                {
                    self.push("distinct ");
                }
                for (i, arg) in list.args.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    match arg {
                        FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => self.expr(expr)?,
                        FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => self.push("*"),
                        FunctionArg::Unnamed(FunctionArgExpr::QualifiedWildcard(name)) => {
                            self.object_name(name);
                            self.push(".*");
                        }
                        _ => return Err(cannot("named function arguments")),
                    }
                }
                self.push(")");
                Ok(())
            }
        }
    }

    fn value(&mut self, value: &Value) {
        match value {
            Value::Placeholder(_) => self.push("?"),
            Value::Null => self.push("null"),
            Value::Boolean(true) => self.push("true"),
            Value::Boolean(false) => self.push("false"),
            Value::Number(text, _) => self.push(text),
            other => self.push(&other.to_string()),
        }
    }

    fn ident(&mut self, ident: &Ident) {
        self.push(&ident.to_string());
    }

    fn object_name(&mut self, name: &ObjectName) {
        for (i, ident) in name.0.iter().enumerate() {
            if i > 0 {
                self.push(".");
            }
            self.ident(ident);
        }
    }
}
