//! Expression type and nullability inference.
//!
//! Shared by projection analysis (column shapes) and parameter inference
//! (use-site hints). Coarse by design: comparisons are `bool`, arithmetic
//! takes the widest operand type, aggregates follow the usual SQL rules.

use sqlparser::ast::{
    BinaryOperator, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, Value,
};

use crate::error::AnalyzeError;
use crate::schema::Catalog;
use crate::types::SqlType;

use super::scope::Scope;

/// What analysis could learn about an expression
#[derive(Debug, Clone, Default)]
pub(crate) struct ExprInfo {
    pub sql_type: Option<SqlType>,
    pub not_null: Option<bool>,
    /// The referenced column's name, qualifier dropped, when the expression
    /// is a plain column reference
    pub column: Option<String>,
    /// The base table the column came from, when known
    pub table: Option<String>,
}

impl ExprInfo {
    fn unknown() -> Self {
        Self::default()
    }

    fn typed(sql_type: SqlType, not_null: bool) -> Self {
        Self {
            sql_type: Some(sql_type),
            not_null: Some(not_null),
            column: None,
            table: None,
        }
    }
}

pub(crate) fn infer_expr(
    expr: &Expr,
    scope: &Scope,
    catalog: &Catalog,
) -> Result<ExprInfo, AnalyzeError> {
    match expr {
        Expr::Identifier(ident) => {
            let resolved = scope.resolve_idents(std::slice::from_ref(ident), catalog)?;
            Ok(ExprInfo {
                sql_type: Some(resolved.sql_type),
                not_null: Some(resolved.not_null),
                column: Some(resolved.name),
                table: Some(resolved.source_table),
            })
        }
        Expr::CompoundIdentifier(idents) => {
            let resolved = scope.resolve_idents(idents, catalog)?;
            Ok(ExprInfo {
                sql_type: Some(resolved.sql_type),
                not_null: Some(resolved.not_null),
                column: Some(resolved.name),
                table: Some(resolved.source_table),
            })
        }
        Expr::Value(value) => Ok(literal_info(value)),
        Expr::Nested(inner) => infer_expr(inner, scope, catalog),
        Expr::UnaryOp { op, expr } => {
            let inner = infer_expr(expr, scope, catalog)?;
            match op {
                sqlparser::ast::UnaryOperator::Not => {
                    Ok(ExprInfo::typed(SqlType::Bool, inner.not_null.unwrap_or(false)))
                }
                _ => Ok(ExprInfo {
                    column: None,
                    table: None,
                    ..inner
                }),
            }
        }
        Expr::BinaryOp { left, op, right } => {
            let lhs = infer_expr(left, scope, catalog)?;
            let rhs = infer_expr(right, scope, catalog)?;
            let not_null = combine_not_null(lhs.not_null, rhs.not_null);
            if is_comparison(op) || matches!(op, BinaryOperator::And | BinaryOperator::Or) {
                Ok(ExprInfo {
                    sql_type: Some(SqlType::Bool),
                    not_null,
                    column: None,
                    table: None,
                })
            } else if is_arithmetic(op) {
                let sql_type = match (&lhs.sql_type, &rhs.sql_type) {
                    (Some(l), Some(r)) => Some(SqlType::widest(l, r)),
                    (Some(l), None) => Some(l.clone()),
                    (None, Some(r)) => Some(r.clone()),
                    (None, None) => None,
                };
                Ok(ExprInfo {
                    sql_type,
                    not_null,
                    column: None,
                    table: None,
                })
            } else {
                Ok(ExprInfo::unknown())
            }
        }
        Expr::Function(func) => infer_function(func, scope, catalog),
        Expr::Cast {
            expr, data_type, ..
        } => {
            let inner = infer_expr(expr, scope, catalog)?;
            Ok(ExprInfo {
                sql_type: Some(SqlType::from_ast(data_type)),
                not_null: inner.not_null,
                column: None,
                table: None,
            })
        }
        Expr::IsNull(_) | Expr::IsNotNull(_) => Ok(ExprInfo::typed(SqlType::Bool, true)),
        Expr::InList { .. }
        | Expr::InSubquery { .. }
        | Expr::Between { .. }
        | Expr::Like { .. }
        | Expr::ILike { .. }
        | Expr::Exists { .. } => Ok(ExprInfo {
            sql_type: Some(SqlType::Bool),
            not_null: None,
            column: None,
            table: None,
        }),
        Expr::Case {
            results,
            else_result,
            ..
        } => {
            for result in results.iter().chain(else_result.as_deref()) {
                let info = infer_expr(result, scope, catalog)?;
                if info.sql_type.is_some() {
                    return Ok(ExprInfo {
                        sql_type: info.sql_type,
                        not_null: Some(false),
                        column: None,
                        table: None,
                    });
                }
            }
            Ok(ExprInfo::unknown())
        }
        _ => Ok(ExprInfo::unknown()),
    }
}

fn infer_function(
    func: &Function,
    scope: &Scope,
    catalog: &Catalog,
) -> Result<ExprInfo, AnalyzeError> {
    let name = func
        .name
        .0
        .last()
        .map(|i| i.value.to_lowercase())
        .unwrap_or_default();

    match name.as_str() {
        // COUNT never returns NULL, whatever its argument
        "count" => Ok(ExprInfo::typed(SqlType::Int, true)),
        // These return NULL on an empty group, so they are always nullable
        "sum" | "avg" | "min" | "max" => {
            let sql_type = match first_arg(func) {
                Some(arg) => infer_expr(arg, scope, catalog)?.sql_type,
                None => None,
            };
            Ok(ExprInfo {
                sql_type,
                not_null: Some(false),
                column: None,
                table: None,
            })
        }
        _ => {
            // Still resolve the arguments so bad references surface
            if let FunctionArguments::List(list) = &func.args {
                for arg in &list.args {
                    if let FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) = arg {
                        infer_expr(expr, scope, catalog)?;
                    }
                }
            }
            Ok(ExprInfo::unknown())
        }
    }
}

fn first_arg(func: &Function) -> Option<&Expr> {
    if let FunctionArguments::List(list) = &func.args {
        for arg in &list.args {
            if let FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) = arg {
                return Some(expr);
            }
        }
    }
    None
}

/// Literal-derived type information
pub(crate) fn literal_info(value: &Value) -> ExprInfo {
    match value {
        Value::Number(text, _) => {
            if text.contains('.') || text.contains('e') || text.contains('E') {
                ExprInfo::typed(
                    SqlType::Decimal {
                        precision: None,
                        scale: None,
                    },
                    true,
                )
            } else {
                ExprInfo::typed(SqlType::Int, true)
            }
        }
        Value::SingleQuotedString(_)
        | Value::DoubleQuotedString(_)
        | Value::NationalStringLiteral(_)
        | Value::HexStringLiteral(_) => ExprInfo::typed(SqlType::Varchar { length: None }, true),
        Value::Boolean(_) => ExprInfo::typed(SqlType::Bool, true),
        Value::Null => ExprInfo {
            sql_type: None,
            not_null: Some(false),
            column: None,
            table: None,
        },
        // Placeholders learn their type from their use site, not vice versa
        Value::Placeholder(_) => ExprInfo::unknown(),
        _ => ExprInfo::unknown(),
    }
}

pub(crate) fn is_comparison(op: &BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::Eq
            | BinaryOperator::NotEq
            | BinaryOperator::Lt
            | BinaryOperator::LtEq
            | BinaryOperator::Gt
            | BinaryOperator::GtEq
            | BinaryOperator::Spaceship
    )
}

pub(crate) fn is_arithmetic(op: &BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::Plus
            | BinaryOperator::Minus
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Modulo
    )
}

fn combine_not_null(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a && b),
        _ => None,
    }
}
