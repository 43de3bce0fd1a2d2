use std::fmt::Display;

use chrono::{DateTime, Utc};

/// The database-facing type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    I32,
    I64,
    F64,
    Text,
    Timestamp,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Bool => "bool",
                Self::I32 => "i32",
                Self::I64 => "i64",
                Self::F64 => "f64",
                Self::Text => "text",
                Self::Timestamp => "timestamp",
            }
        )
    }
}

/// A single column value, either read from an entity to be bound as a query parameter, or
/// decoded from a result row to be written back onto an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A typed `NULL`. The kind is kept so the driver can bind it with the right type.
    Null(ValueKind),
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null(kind) => *kind,
            Self::Bool(_) => ValueKind::Bool,
            Self::I32(_) => ValueKind::I32,
            Self::I64(_) => ValueKind::I64,
            Self::F64(_) => ValueKind::F64,
            Self::Text(_) => ValueKind::Text,
            Self::Timestamp(_) => ValueKind::Timestamp,
        }
    }

    /// Whether this is the zero value of its type, i.e. what a freshly defaulted field holds.
    ///
    /// Insert inference treats a defaulted column holding its zero value as "not set by the
    /// caller" and leaves it to the database.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Null(_) => true,
            Self::Bool(v) => !v,
            Self::I32(v) => *v == 0,
            Self::I64(v) => *v == 0,
            Self::F64(v) => *v == 0.0,
            Self::Text(v) => v.is_empty(),
            Self::Timestamp(v) => *v == DateTime::<Utc>::default(),
        }
    }
}

/// Returned when a [`Value`] cannot be converted into the rust type of a field.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueError {
    pub expected: ValueKind,
    pub found: Value,
}

impl Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.found {
            Value::Null(_) => write!(f, "expected {}, found NULL", self.expected),
            found => write!(f, "expected {}, found {}", self.expected, found.kind()),
        }
    }
}

impl std::error::Error for ValueError {}

/// A rust type that can be stored in a column.
pub trait ColumnValue: Sized {
    const KIND: ValueKind;

    fn to_value(&self) -> Value;

    /// # Errors
    ///
    /// If the value is of a different kind, or `NULL` for a non-optional type.
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

macro_rules! impl_column_value {
    ($ty:ty, $variant:ident) => {
        impl ColumnValue for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }

            fn from_value(value: Value) -> Result<Self, ValueError> {
                match value {
                    Value::$variant(v) => Ok(v),
                    found => Err(ValueError {
                        expected: Self::KIND,
                        found,
                    }),
                }
            }
        }
    };
}

impl_column_value!(bool, Bool);
impl_column_value!(i32, I32);
impl_column_value!(i64, I64);
impl_column_value!(f64, F64);
impl_column_value!(String, Text);
impl_column_value!(DateTime<Utc>, Timestamp);

impl<T> ColumnValue for Option<T>
where
    T: ColumnValue,
{
    const KIND: ValueKind = T::KIND;

    fn to_value(&self) -> Value {
        self.as_ref()
            .map_or(Value::Null(T::KIND), ColumnValue::to_value)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null(_) => Ok(None),
            value => T::from_value(value).map(Some),
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::{DateTime, Utc};

    use super::{ColumnValue, Value, ValueKind};

    #[test]
    fn test_zero_values() {
        assert!(0_i32.to_value().is_zero());
        assert!(String::new().to_value().is_zero());
        assert!(None::<i64>.to_value().is_zero());
        assert!(DateTime::<Utc>::default().to_value().is_zero());

        assert!(!7_i32.to_value().is_zero());
        assert!(!"x".to_string().to_value().is_zero());
        assert!(!Value::Bool(true).is_zero());
    }

    #[test]
    fn test_optional_roundtrip_through_null() {
        assert_eq!(None::<String>.to_value(), Value::Null(ValueKind::Text));
        assert_eq!(
            Option::<String>::from_value(Value::Null(ValueKind::Text)),
            Ok(None)
        );

        let err = i32::from_value(Value::Null(ValueKind::I32)).unwrap_err();
        assert_eq!(err.expected, ValueKind::I32);
        assert_eq!(err.to_string(), "expected i32, found NULL");
    }

    #[test]
    fn test_kind_mismatch() {
        let err = String::from_value(Value::I64(3)).unwrap_err();
        assert_eq!(err.to_string(), "expected text, found i64");
    }
}
