use std::cmp::Ordering;

/// Declared type of a column, as carried in a table's schema.
///
/// `Varchar` additionally carries a maximum length in bytes; a missing size
/// in source SQL defaults to 255 before it ever reaches this type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ColumnType {
    Integer,
    Text,
    Varchar(u32),
    Boolean,
}

impl ColumnType {
    /// Human-readable name used in error messages, matching Postgres phrasing.
    pub fn display_name(&self) -> String {
        match self {
            ColumnType::Integer => "integer".to_string(),
            ColumnType::Text => "text".to_string(),
            ColumnType::Varchar(n) => format!("character varying({n})"),
            ColumnType::Boolean => "boolean".to_string(),
        }
    }

    /// Whether a runtime `Value` belongs to this column's type category.
    /// `text` and `varchar` share the `Text` value category; varchar's
    /// length bound is checked separately by the caller.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ColumnType::Integer, Value::Int(_))
                | (ColumnType::Text, Value::Text(_))
                | (ColumnType::Varchar(_), Value::Text(_))
                | (ColumnType::Boolean, Value::Bool(_))
        )
    }
}

/// A column's declared name and type, as carried in a table's schema and
/// in `CREATE TABLE` column lists. Varchar's size lives inside `ty` rather
/// than as a separate field.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i64),
    Text(String),
    Bool(bool),
    Null,
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Category name used in `TypeMismatch` messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Text(_) => "text",
            Value::Bool(_) => "boolean",
            Value::Null => "null",
        }
    }

    pub fn cmp_same_type(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn eq_same_type(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.eq(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.eq(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.eq(b)),
            _ => None,
        }
    }
}
