//! SQL dialect support

use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect};
use std::str::FromStr;

/// Supported SQL dialects.
///
/// The dialect decides the parser front-end and the placeholder syntax:
/// MySQL uses positional `?`, PostgreSQL uses numbered `$N`. Both normalize
/// to positional `?` in the generated SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    #[default]
    MySql,
    PostgreSql,
}

impl SqlDialect {
    /// Get the sqlparser dialect
    pub fn parser_dialect(&self) -> Box<dyn Dialect> {
        match self {
            SqlDialect::MySql => Box::new(MySqlDialect {}),
            SqlDialect::PostgreSql => Box::new(PostgreSqlDialect {}),
        }
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" => Ok(SqlDialect::MySql),
            "postgresql" | "postgres" | "pg" => Ok(SqlDialect::PostgreSql),
            _ => Err(format!("Unknown dialect: {}", s)),
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::MySql => write!(f, "mysql"),
            SqlDialect::PostgreSql => write!(f, "postgresql"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dialect_names() {
        assert_eq!("mysql".parse::<SqlDialect>().unwrap(), SqlDialect::MySql);
        assert_eq!("pg".parse::<SqlDialect>().unwrap(), SqlDialect::PostgreSql);
        assert!("oracle".parse::<SqlDialect>().is_err());
    }
}
