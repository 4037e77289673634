//! SQL column type representation

use serde::{Deserialize, Serialize};
use sqlparser::ast::DataType;

/// Internal representation of SQL column types.
///
/// The analyzer stores the parsed, normalized form of whatever the schema
/// declared; mapping to host-language types (and applying overrides) is the
/// emitter's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    // Numeric types
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    Decimal {
        precision: Option<u64>,
        scale: Option<u64>,
    },
    Float,
    Double,

    // Character types
    Char {
        length: Option<u64>,
    },
    Varchar {
        length: Option<u64>,
    },
    Text,

    // Binary
    Blob,

    // Date/Time types
    Date,
    Time,
    Datetime,
    Timestamp,

    // Boolean
    Bool,

    // JSON
    Json,

    /// ENUM with its value list in declaration order
    Enum(Vec<String>),

    /// User-defined or otherwise unrecognized named type
    Custom(String),

    /// The parser produced a type we do not model
    Unknown,
}

impl SqlType {
    /// Convert from sqlparser's DataType to our internal SqlType
    pub fn from_ast(data_type: &DataType) -> Self {
        match data_type {
            DataType::TinyInt(_) | DataType::UnsignedTinyInt(_) => SqlType::TinyInt,
            DataType::SmallInt(_) | DataType::UnsignedSmallInt(_) | DataType::Int2(_) => {
                SqlType::SmallInt
            }
            DataType::MediumInt(_) | DataType::UnsignedMediumInt(_) => SqlType::MediumInt,
            DataType::Int(_) | DataType::UnsignedInt(_) => SqlType::Int,
            DataType::Integer(_) | DataType::UnsignedInteger(_) | DataType::Int4(_) => SqlType::Int,
            DataType::BigInt(_) | DataType::UnsignedBigInt(_) | DataType::Int8(_) => {
                SqlType::BigInt
            }

            DataType::Decimal(info) | DataType::Numeric(info) | DataType::Dec(info) => {
                let (precision, scale) = match info {
                    sqlparser::ast::ExactNumberInfo::None => (None, None),
                    sqlparser::ast::ExactNumberInfo::Precision(p) => (Some(*p), None),
                    sqlparser::ast::ExactNumberInfo::PrecisionAndScale(p, s) => {
                        (Some(*p), Some(*s))
                    }
                };
                SqlType::Decimal { precision, scale }
            }

            DataType::Real | DataType::Float4 | DataType::Float { .. } => SqlType::Float,
            DataType::Double { .. } | DataType::DoublePrecision | DataType::Float8 => {
                SqlType::Double
            }

            DataType::Char(info) | DataType::Character(info) => SqlType::Char {
                length: extract_char_length(info.as_ref()),
            },
            DataType::Varchar(info) | DataType::CharacterVarying(info) => SqlType::Varchar {
                length: extract_char_length(info.as_ref()),
            },

            DataType::Text | DataType::String(_) => SqlType::Text,

            DataType::Bytea | DataType::Binary(_) | DataType::Varbinary(_) | DataType::Blob(_) => {
                SqlType::Blob
            }

            DataType::Date => SqlType::Date,
            DataType::Time(_, _) => SqlType::Time,
            DataType::Datetime(_) => SqlType::Datetime,
            DataType::Timestamp(_, _) => SqlType::Timestamp,

            DataType::Boolean | DataType::Bool => SqlType::Bool,

            DataType::JSON => SqlType::Json,

            DataType::Enum(members, _) => SqlType::Enum(
                members
                    .iter()
                    .map(|m| match m {
                        sqlparser::ast::EnumMember::Name(name) => name.clone(),
                        sqlparser::ast::EnumMember::NamedValue(name, _) => name.clone(),
                    })
                    .collect(),
            ),

            DataType::Custom(name, _) => {
                let type_name = name
                    .0
                    .iter()
                    .map(|i| i.value.clone())
                    .collect::<Vec<_>>()
                    .join(".");
                SqlType::Custom(type_name)
            }

            _ => SqlType::Unknown,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt
                | SqlType::SmallInt
                | SqlType::MediumInt
                | SqlType::Int
                | SqlType::BigInt
                | SqlType::Decimal { .. }
                | SqlType::Float
                | SqlType::Double
        )
    }

    /// Position in the numeric widening order; wider types compare greater.
    fn numeric_rank(&self) -> Option<u8> {
        match self {
            SqlType::TinyInt => Some(0),
            SqlType::SmallInt => Some(1),
            SqlType::MediumInt => Some(2),
            SqlType::Int => Some(3),
            SqlType::BigInt => Some(4),
            SqlType::Decimal { .. } => Some(5),
            SqlType::Float => Some(6),
            SqlType::Double => Some(7),
            _ => None,
        }
    }

    /// The wider of two numeric operand types, e.g. for `a + b`.
    /// Non-numeric operands fall back to the left type.
    pub fn widest(a: &SqlType, b: &SqlType) -> SqlType {
        match (a.numeric_rank(), b.numeric_rank()) {
            (Some(ra), Some(rb)) if rb > ra => b.clone(),
            _ => a.clone(),
        }
    }

    /// The normalized textual form, as stored in the catalog and the IR
    pub fn display_name(&self) -> String {
        match self {
            SqlType::TinyInt => "tinyint".to_string(),
            SqlType::SmallInt => "smallint".to_string(),
            SqlType::MediumInt => "mediumint".to_string(),
            SqlType::Int => "int".to_string(),
            SqlType::BigInt => "bigint".to_string(),
            SqlType::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => format!("decimal({p},{s})"),
                (Some(p), None) => format!("decimal({p})"),
                _ => "decimal".to_string(),
            },
            SqlType::Float => "float".to_string(),
            SqlType::Double => "double".to_string(),
            SqlType::Char { length } => match length {
                Some(l) => format!("char({l})"),
                None => "char".to_string(),
            },
            SqlType::Varchar { length } => match length {
                Some(l) => format!("varchar({l})"),
                None => "varchar".to_string(),
            },
            SqlType::Text => "text".to_string(),
            SqlType::Blob => "blob".to_string(),
            SqlType::Date => "date".to_string(),
            SqlType::Time => "time".to_string(),
            SqlType::Datetime => "datetime".to_string(),
            SqlType::Timestamp => "timestamp".to_string(),
            SqlType::Bool => "bool".to_string(),
            SqlType::Json => "json".to_string(),
            SqlType::Enum(values) => {
                let quoted: Vec<String> = values.iter().map(|v| format!("'{v}'")).collect();
                format!("enum({})", quoted.join(","))
            }
            SqlType::Custom(name) => name.clone(),
            SqlType::Unknown => "unknown".to_string(),
        }
    }
}

/// Extract character length from CharacterLength if present
fn extract_char_length(info: Option<&sqlparser::ast::CharacterLength>) -> Option<u64> {
    info.map(|i| match i {
        sqlparser::ast::CharacterLength::IntegerLength { length, .. } => *length,
        sqlparser::ast::CharacterLength::Max => u64::MAX,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widest_prefers_wider_operand() {
        assert_eq!(SqlType::widest(&SqlType::Int, &SqlType::BigInt), SqlType::BigInt);
        assert_eq!(SqlType::widest(&SqlType::BigInt, &SqlType::Int), SqlType::BigInt);
        assert_eq!(
            SqlType::widest(
                &SqlType::Int,
                &SqlType::Decimal {
                    precision: Some(13),
                    scale: Some(4)
                }
            ),
            SqlType::Decimal {
                precision: Some(13),
                scale: Some(4)
            }
        );
    }

    #[test]
    fn widest_ignores_non_numeric() {
        assert_eq!(SqlType::widest(&SqlType::Text, &SqlType::Int), SqlType::Text);
    }

    #[test]
    fn display_names() {
        assert_eq!(SqlType::Int.display_name(), "int");
        assert_eq!(
            SqlType::Decimal {
                precision: Some(13),
                scale: Some(4)
            }
            .display_name(),
            "decimal(13,4)"
        );
        assert_eq!(
            SqlType::Enum(vec!["a".into(), "b".into()]).display_name(),
            "enum('a','b')"
        );
    }
}
