use std::collections::BTreeMap;

use uuid::Uuid;

/// A decoded (or to-be-encoded) query argument or result value.
///
/// This is the universal currency the codec tree speaks: scalar codecs
/// produce and consume the leaf variants, composite codecs recurse into
/// `Tuple`/`Object`/`Array`/`Set` and build or flatten the fields inside.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    BigInt(String),
    Decimal(String),
    DateTime(i64),
    LocalDateTime(i64),
    LocalDate(i32),
    LocalTime(i64),
    Duration(i64),
    Json(String),
    Tuple(Vec<Value>),
    NamedTuple(Vec<(String, Value)>),
    Array(Vec<Value>),
    Set(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Enum(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
