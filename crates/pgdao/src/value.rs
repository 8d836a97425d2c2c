//! Scalar values exchanged with the database.
//!
//! [`Value`] is the single parameter/cell type used by every builder: bound
//! parameters are `Value`s, and decoded rows are [`RowMap`]s of `Value`s.

use crate::error::{OrmError, OrmResult};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use tokio_postgres::types::{IsNull, ToSql, Type};

/// A decoded row (or any column/field keyed mapping of values).
pub type RowMap = BTreeMap<String, Value>;

/// A scalar SQL value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// Semantic type of a mapped field, used to type-check row values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Bool,
    Int,
    Float,
    Timestamp,
}

impl Value {
    /// Whether this is SQL `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
        }
    }

    /// Borrow the text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer payload; numeric text (e.g. a `count` returned as text) is parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Coerce this value to `kind`, returning `None` on a type mismatch.
    ///
    /// `Null` is returned unchanged; nullability is the caller's concern.
    pub fn coerce(&self, kind: FieldKind) -> Option<Value> {
        match (kind, self) {
            (_, Value::Null) => Some(Value::Null),
            (FieldKind::Text, Value::Text(_))
            | (FieldKind::Bool, Value::Bool(_))
            | (FieldKind::Int, Value::Int(_))
            | (FieldKind::Float, Value::Float(_))
            | (FieldKind::Timestamp, Value::Timestamp(_)) => Some(self.clone()),
            (FieldKind::Float, Value::Int(v)) => Some(Value::Float(*v as f64)),
            (FieldKind::Timestamp, Value::Text(s)) => parse_timestamp(s).map(Value::Timestamp),
            _ => None,
        }
    }

    /// Convert a JSON scalar into a value. Arrays and objects have no scalar form.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float)),
            serde_json::Value::String(s) => Some(Value::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }
}

/// Parse RFC 3339 or `YYYY-MM-DD HH:MM:SS[.fff]` (assumed UTC) timestamps.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

macro_rules! impl_value_from {
    ($($ty:ty => |$v:ident| $conv:expr),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $conv
                }
            }
        )*
    };
}

impl_value_from! {
    bool => |v| Value::Bool(v),
    i16 => |v| Value::Int(v.into()),
    i32 => |v| Value::Int(v.into()),
    i64 => |v| Value::Int(v),
    f32 => |v| Value::Float(v.into()),
    f64 => |v| Value::Float(v),
    String => |v| Value::Text(v),
    &str => |v| Value::Text(v.to_string()),
    &String => |v| Value::Text(v.clone()),
    DateTime<Utc> => |v| Value::Timestamp(v),
    uuid::Uuid => |v| Value::Text(v.to_string()),
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

// Every arm goes through the inner type's checked conversion, so a value bound
// to a column of an incompatible type fails with `WrongType` instead of
// writing bytes the server would misread.
impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql_checked(ty, out),
            Value::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql_checked(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql_checked(ty, out),
                Type::FLOAT4 => (*v as f32).to_sql_checked(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql_checked(ty, out),
                Type::TEXT | Type::VARCHAR | Type::BPCHAR => {
                    v.to_string().to_sql_checked(ty, out)
                }
                _ => v.to_sql_checked(ty, out),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql_checked(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
            // Ids are opaque strings on the Rust side; adapt them to the column type.
            Value::Text(v) => match *ty {
                Type::UUID => uuid::Uuid::parse_str(v)?.to_sql_checked(ty, out),
                Type::INT2 => v.parse::<i16>()?.to_sql_checked(ty, out),
                Type::INT4 => v.parse::<i32>()?.to_sql_checked(ty, out),
                Type::INT8 => v.parse::<i64>()?.to_sql_checked(ty, out),
                _ => v.as_str().to_sql_checked(ty, out),
            },
            Value::Timestamp(v) => match *ty {
                Type::TIMESTAMP => v.naive_utc().to_sql_checked(ty, out),
                Type::DATE => v.date_naive().to_sql_checked(ty, out),
                _ => v.to_sql_checked(ty, out),
            },
        }
    }

    // `Null` binds to any column; the variant arms check the rest.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// Decode a `tokio_postgres` row into a [`RowMap`].
///
/// Columns of types without a scalar mapping are left out of the map (the
/// corresponding record fields keep their previous value) and logged.
pub fn row_to_map(row: &tokio_postgres::Row) -> RowMap {
    let mut map = RowMap::new();
    for (idx, column) in row.columns().iter().enumerate() {
        match decode_column(row, idx, column.type_()) {
            Ok(value) => {
                map.insert(column.name().to_string(), value);
            }
            Err(err) => tracing::warn!(
                target: "pgdao.record",
                pg_type = %column.type_(),
                error = %err,
                "unsupported column type; column skipped"
            ),
        }
    }
    map
}

fn decode_column(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> OrmResult<Value> {
    decode_raw(row, idx, ty)
        .map_err(|e| OrmError::decode(row.columns()[idx].name(), e.to_string()))
}

fn decode_raw(
    row: &tokio_postgres::Row,
    idx: usize,
    ty: &Type,
) -> Result<Value, tokio_postgres::Error> {
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::Int),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(Value::from),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::Float),
        Type::UUID => row.try_get::<_, Option<uuid::Uuid>>(idx)?.map(Value::from),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(Value::Timestamp),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|v| Value::Timestamp(v.and_utc())),
        Type::DATE => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|v| Value::Timestamp(v.and_utc())),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(|v| Value::Text(v.to_string())),
        _ => row.try_get::<_, Option<String>>(idx)?.map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}
