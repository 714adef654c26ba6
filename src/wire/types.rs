//! Wire type codes and the scalar values that travel under them.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::decimal::Decimal;
use crate::error_handling::types::WireError;

/// Type tag written in front of parameters and in table headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireType {
    Array,
    Null,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    String,
    Timestamp,
    Decimal,
    Varbinary,
}

impl WireType {
    pub fn code(self) -> i8 {
        match self {
            WireType::Array => -99,
            WireType::Null => 1,
            WireType::TinyInt => 3,
            WireType::SmallInt => 4,
            WireType::Integer => 5,
            WireType::BigInt => 6,
            WireType::Float => 8,
            WireType::String => 9,
            WireType::Timestamp => 11,
            WireType::Decimal => 22,
            WireType::Varbinary => 25,
        }
    }

    pub fn from_code(code: i8) -> Result<Self, WireError> {
        Ok(match code {
            -99 => WireType::Array,
            1 => WireType::Null,
            3 => WireType::TinyInt,
            4 => WireType::SmallInt,
            5 => WireType::Integer,
            6 => WireType::BigInt,
            8 => WireType::Float,
            9 => WireType::String,
            11 => WireType::Timestamp,
            22 => WireType::Decimal,
            25 => WireType::Varbinary,
            other => return Err(WireError::UnknownWireType(other)),
        })
    }

    /// Encoded width of a value of this type, `None` for length-prefixed types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            WireType::TinyInt => Some(1),
            WireType::SmallInt => Some(2),
            WireType::Integer => Some(4),
            WireType::BigInt | WireType::Float | WireType::Timestamp => Some(8),
            WireType::Decimal => Some(16),
            WireType::Null => Some(0),
            WireType::String | WireType::Varbinary | WireType::Array => None,
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Array => "ARRAY",
            WireType::Null => "NULL",
            WireType::TinyInt => "TINYINT",
            WireType::SmallInt => "SMALLINT",
            WireType::Integer => "INTEGER",
            WireType::BigInt => "BIGINT",
            WireType::Float => "FLOAT",
            WireType::String => "STRING",
            WireType::Timestamp => "TIMESTAMP",
            WireType::Decimal => "DECIMAL",
            WireType::Varbinary => "VARBINARY",
        };
        f.write_str(name)
    }
}

/// A single scalar value. Timestamps are microseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f64),
    String(String),
    Timestamp(i64),
    Decimal(Decimal),
    Varbinary(Vec<u8>),
}

impl Value {
    pub fn wire_type(&self) -> WireType {
        match self {
            Value::Null => WireType::Null,
            Value::TinyInt(_) => WireType::TinyInt,
            Value::SmallInt(_) => WireType::SmallInt,
            Value::Integer(_) => WireType::Integer,
            Value::BigInt(_) => WireType::BigInt,
            Value::Float(_) => WireType::Float,
            Value::String(_) => WireType::String,
            Value::Timestamp(_) => WireType::Timestamp,
            Value::Decimal(_) => WireType::Decimal,
            Value::Varbinary(_) => WireType::Varbinary,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        for t in [
            WireType::Array,
            WireType::Null,
            WireType::TinyInt,
            WireType::SmallInt,
            WireType::Integer,
            WireType::BigInt,
            WireType::Float,
            WireType::String,
            WireType::Timestamp,
            WireType::Decimal,
            WireType::Varbinary,
        ] {
            assert_eq!(WireType::from_code(t.code()).unwrap(), t);
        }
        assert_eq!(WireType::from_code(2), Err(WireError::UnknownWireType(2)));
    }
}
