/// Value Module
///
/// Bind parameters and row values, plus the typecasting rules that turn
/// SQLite storage classes into Rust-side values.
use crate::core::{DoError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use std::fmt;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A single SQL value, either bound as a parameter or read from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// Declared Rust-side type of a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Float,
    Text,
    Blob,
    Boolean,
    Date,
    DateTime,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Renders the value as a SQL literal for log output.
    ///
    /// Text-like values are single-quoted with embedded quotes doubled.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            // SQLite stores NaN as NULL and has no infinity literal
            Value::Float(f) if !f.is_finite() => "NULL".to_string(),
            Value::Float(f) => format!("{:?}", f),
            Value::Text(s) => quote(s),
            Value::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
            Value::Boolean(b) => i64::from(*b).to_string(),
            Value::Date(d) => quote(&d.format(DATE_FORMAT).to_string()),
            Value::DateTime(dt) => quote(&dt.format(DATETIME_FORMAT).to_string()),
        }
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Blob(b) => write!(f, "<BLOB: {} bytes>", b.len()),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Boolean(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
            Value::Date(d) => {
                ToSqlOutput::Owned(rusqlite::types::Value::Text(d.format(DATE_FORMAT).to_string()))
            }
            Value::DateTime(dt) => ToSqlOutput::Owned(rusqlite::types::Value::Text(
                dt.format(DATETIME_FORMAT).to_string(),
            )),
        })
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Converts a column value by its storage class.
pub(crate) fn native_typecast(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// Converts a column value to its declared field type. NULL stays NULL.
pub(crate) fn declared_typecast(value: ValueRef<'_>, field_type: FieldType) -> Result<Value> {
    if let ValueRef::Null = value {
        return Ok(Value::Null);
    }
    let native = native_typecast(value);
    let converted = match (field_type, &native) {
        (FieldType::Integer, Value::Integer(_)) => Some(native.clone()),
        (FieldType::Integer, Value::Float(f)) => Some(Value::Integer(*f as i64)),
        (FieldType::Integer, Value::Text(s)) => s.trim().parse().ok().map(Value::Integer),
        (FieldType::Float, Value::Float(_)) => Some(native.clone()),
        (FieldType::Float, Value::Integer(i)) => Some(Value::Float(*i as f64)),
        (FieldType::Float, Value::Text(s)) => s.trim().parse().ok().map(Value::Float),
        (FieldType::Text, Value::Blob(b)) => {
            Some(Value::Text(String::from_utf8_lossy(b).into_owned()))
        }
        (FieldType::Text, other) => Some(Value::Text(other.to_string())),
        (FieldType::Blob, Value::Blob(_)) => Some(native.clone()),
        (FieldType::Blob, Value::Text(s)) => Some(Value::Blob(s.clone().into_bytes())),
        (FieldType::Boolean, Value::Integer(i)) => Some(Value::Boolean(*i != 0)),
        (FieldType::Boolean, Value::Text(s)) => parse_boolean(s).map(Value::Boolean),
        (FieldType::Date, Value::Text(s)) => parse_date(s).map(Value::Date),
        (FieldType::DateTime, Value::Text(s)) => parse_datetime(s).map(Value::DateTime),
        _ => None,
    };
    converted.ok_or_else(|| {
        DoError::Typecast(format!("cannot convert {native:?} to {field_type:?}"))
    })
}

fn parse_boolean(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .or_else(|| parse_datetime(text).map(|dt| dt.date()))
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
