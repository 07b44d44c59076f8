//! MySQL row to JSON conversion.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map, Number, Value};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use common::models::ColumnInfo;

/// How a column's values are rendered, derived from the server type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Signed,
    Unsigned,
    Float,
    Double,
    Bool,
    Date,
    DateTime,
    Time,
    Json,
    Text,
}

impl ValueKind {
    pub fn of(type_name: &str) -> Self {
        let upper = type_name.to_ascii_uppercase();
        let base = upper.split_whitespace().next().unwrap_or("");
        match base {
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" => {
                if upper.contains("UNSIGNED") {
                    ValueKind::Unsigned
                } else {
                    ValueKind::Signed
                }
            }
            "FLOAT" => ValueKind::Float,
            "DOUBLE" | "REAL" => ValueKind::Double,
            "BOOLEAN" | "BOOL" => ValueKind::Bool,
            "DATE" => ValueKind::Date,
            "DATETIME" | "TIMESTAMP" => ValueKind::DateTime,
            "TIME" => ValueKind::Time,
            "JSON" => ValueKind::Json,
            _ => ValueKind::Text,
        }
    }
}

/// Column names and server types of a result row.
pub fn columns(row: &MySqlRow) -> Vec<ColumnInfo> {
    row.columns()
        .iter()
        .map(|c| ColumnInfo {
            name: c.name().to_string(),
            data_type: c.type_info().name().to_string(),
        })
        .collect()
}

/// Converts one row into a JSON object keyed by column name.
pub fn row_to_json(row: &MySqlRow) -> Value {
    let mut object = Map::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        let kind = ValueKind::of(column.type_info().name());
        object.insert(column.name().to_string(), cell(row, idx, kind));
    }
    Value::Object(object)
}

fn cell(row: &MySqlRow, idx: usize, kind: ValueKind) -> Value {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }

    let typed = match kind {
        ValueKind::Signed => row.try_get::<i64, _>(idx).ok().map(Value::from),
        ValueKind::Unsigned => row.try_get::<u64, _>(idx).ok().map(Value::from),
        ValueKind::Float => row
            .try_get::<f32, _>(idx)
            .ok()
            .and_then(|v| Number::from_f64(f64::from(v)))
            .map(Value::Number),
        ValueKind::Double => row
            .try_get::<f64, _>(idx)
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        ValueKind::Bool => row.try_get::<bool, _>(idx).ok().map(Value::Bool),
        // Zero dates do not decode and render as null.
        ValueKind::Date => Some(
            row.try_get::<NaiveDate, _>(idx)
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
        ),
        ValueKind::DateTime => Some(
            row.try_get::<NaiveDateTime, _>(idx)
                .map(|d| Value::String(d.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or(Value::Null),
        ),
        ValueKind::Time => row
            .try_get::<NaiveTime, _>(idx)
            .ok()
            .map(|t| Value::String(t.format("%H:%M:%S").to_string())),
        ValueKind::Json => row.try_get::<Value, _>(idx).ok(),
        ValueKind::Text => row.try_get::<String, _>(idx).ok().map(Value::String),
    };

    typed.unwrap_or_else(|| text_fallback(row, idx))
}

/// Raw column bytes rendered as (lossy) UTF-8.
fn text_fallback(row: &MySqlRow, idx: usize) -> Value {
    match row.try_get_unchecked::<Vec<u8>, _>(idx) {
        Ok(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        Err(_) => Value::Null,
    }
}
