/// Value Model Module
///
/// `SqlValue` is the closed set of kinds a SQLite cell can hold. The same
/// union carries result cells out to the host and bound arguments in from it,
/// so the kind tag survives the trip through the wire format.

use crate::core::{BridgeError, Result};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::de::{self, Deserialize, Deserializer, SeqAccess, Visitor};
use serde::ser::{Serialize, Serializer};
use std::fmt;

/// A dynamically typed SQLite value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit IEEE floating point
    Real(f64),
    /// UTF-8 text
    Text(String),
    /// Opaque byte sequence
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Short name of the value's kind, used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Blob(_) => "blob",
        }
    }

    /// Converts the value to the textual form used for string binding.
    ///
    /// Nulls stay null. Reals keep their decimal point (`2.0`, not `2`) so
    /// they do not read back as integers. Blobs have no textual form and are
    /// rejected.
    pub fn to_text(&self) -> Result<SqlValue> {
        match self {
            SqlValue::Null => Ok(SqlValue::Null),
            SqlValue::Integer(i) => Ok(SqlValue::Text(i.to_string())),
            SqlValue::Real(f) => Ok(SqlValue::Text(format!("{:?}", f))),
            SqlValue::Text(s) => Ok(SqlValue::Text(s.clone())),
            SqlValue::Blob(b) => Err(BridgeError::InvalidArguments(format!(
                "blob argument ({} bytes) cannot be bound as text",
                b.len()
            ))),
        }
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            SqlValue::Null => ValueRef::Null,
            SqlValue::Integer(i) => ValueRef::Integer(*i),
            SqlValue::Real(f) => ValueRef::Real(*f),
            SqlValue::Text(s) => ValueRef::Text(s.as_bytes()),
            SqlValue::Blob(b) => ValueRef::Blob(b),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

/// Log form of a value: SQL-like literals, blobs summarized by length.
impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{:?}", r),
            SqlValue::Text(s) => write!(f, "{:?}", s),
            SqlValue::Blob(b) => write!(f, "<BLOB: {} bytes>", b.len()),
        }
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_unit(),
            SqlValue::Integer(i) => serializer.serialize_i64(*i),
            SqlValue::Real(f) => serializer.serialize_f64(*f),
            SqlValue::Text(s) => serializer.serialize_str(s),
            SqlValue::Blob(b) => serializer.serialize_bytes(b),
        }
    }
}

struct SqlValueVisitor;

impl<'de> Visitor<'de> for SqlValueVisitor {
    type Value = SqlValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("null, a boolean, a number, a string or an array of bytes")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<SqlValue, E> {
        Ok(SqlValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<SqlValue, E> {
        Ok(SqlValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<SqlValue, D::Error> {
        deserializer.deserialize_any(SqlValueVisitor)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<SqlValue, E> {
        Ok(SqlValue::Integer(i64::from(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<SqlValue, E> {
        Ok(SqlValue::Integer(v))
    }

    // Beyond i64::MAX SQLite has no integer kind for it; keep the digits as text
    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<SqlValue, E> {
        Ok(i64::try_from(v).map_or_else(|_| SqlValue::Text(v.to_string()), SqlValue::Integer))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<SqlValue, E> {
        Ok(SqlValue::Real(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<SqlValue, E> {
        Ok(SqlValue::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<SqlValue, E> {
        Ok(SqlValue::Text(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<SqlValue, E> {
        Ok(SqlValue::Blob(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<SqlValue, E> {
        Ok(SqlValue::Blob(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<SqlValue, A::Error> {
        let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(byte) = seq.next_element::<u8>()? {
            bytes.push(byte);
        }
        Ok(SqlValue::Blob(bytes))
    }
}

impl<'de> Deserialize<'de> for SqlValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(SqlValueVisitor)
    }
}

/// How incoming SQL arguments are bound to statement parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentBinding {
    /// Every non-null argument is converted to text before binding
    #[default]
    Text,
    /// Arguments are bound with their own kind
    Typed,
}

impl ArgumentBinding {
    /// Prepares raw command arguments for binding.
    pub fn prepare(self, arguments: &[SqlValue]) -> Result<Vec<SqlValue>> {
        match self {
            ArgumentBinding::Text => arguments.iter().map(SqlValue::to_text).collect(),
            ArgumentBinding::Typed => Ok(arguments.to_vec()),
        }
    }
}
