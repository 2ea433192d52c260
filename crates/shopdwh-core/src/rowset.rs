//! Conversions between polars frames and the plain typed values collaborator
//! clients read from and write to storage.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde_json::{Map, Value};
use thiserror::Error;

const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Debug, Error)]
pub enum RowSetError {
    #[error("column {column} has unsupported type {dtype}")]
    UnsupportedType { column: String, dtype: String },

    #[error("column {column} row {row}: {value} is not a valid {kind} value")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
        kind: ColumnKind,
    },

    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}

/// Storage-level value type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
    Text,
}

impl ColumnKind {
    /// Maps an `information_schema.columns.data_type` name.
    pub fn from_sql_type(data_type: &str) -> Self {
        match data_type.trim().to_ascii_lowercase().as_str() {
            "smallint" | "integer" | "bigint" => ColumnKind::Integer,
            "real" | "double precision" | "numeric" | "decimal" => ColumnKind::Float,
            "boolean" => ColumnKind::Boolean,
            "date" => ColumnKind::Date,
            other if other.starts_with("timestamp") => ColumnKind::Timestamp,
            _ => ColumnKind::Text,
        }
    }

    pub fn from_dtype(dtype: &DataType) -> Option<Self> {
        match dtype {
            dtype if dtype.is_integer() => Some(ColumnKind::Integer),
            dtype if dtype.is_float() => Some(ColumnKind::Float),
            DataType::Boolean => Some(ColumnKind::Boolean),
            DataType::Date => Some(ColumnKind::Date),
            DataType::Datetime(_, _) => Some(ColumnKind::Timestamp),
            DataType::String | DataType::Null => Some(ColumnKind::Text),
            _ => None,
        }
    }

    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Integer => "BIGINT",
            ColumnKind::Float => "DOUBLE PRECISION",
            ColumnKind::Boolean => "BOOLEAN",
            ColumnKind::Date => "DATE",
            ColumnKind::Timestamp => "TIMESTAMP",
            ColumnKind::Text => "TEXT",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Date => "date",
            ColumnKind::Timestamp => "timestamp",
            ColumnKind::Text => "text",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One column's values, decoded out of a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Date(Vec<Option<NaiveDate>>),
    Timestamp(Vec<Option<NaiveDateTime>>),
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnValues::Integer(_) => ColumnKind::Integer,
            ColumnValues::Float(_) => ColumnKind::Float,
            ColumnValues::Boolean(_) => ColumnKind::Boolean,
            ColumnValues::Date(_) => ColumnKind::Date,
            ColumnValues::Timestamp(_) => ColumnKind::Timestamp,
            ColumnValues::Text(_) => ColumnKind::Text,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Integer(values) => values.len(),
            ColumnValues::Float(values) => values.len(),
            ColumnValues::Boolean(values) => values.len(),
            ColumnValues::Date(values) => values.len(),
            ColumnValues::Timestamp(values) => values.len(),
            ColumnValues::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decodes a frame column into storage values.
pub fn column_values(column: &Column) -> Result<ColumnValues, RowSetError> {
    let dtype = column.dtype();
    let kind = ColumnKind::from_dtype(dtype).ok_or_else(|| RowSetError::UnsupportedType {
        column: column.name().to_string(),
        dtype: dtype.to_string(),
    })?;

    let values = match kind {
        ColumnKind::Integer => {
            ColumnValues::Integer(column.cast(&DataType::Int64)?.i64()?.into_iter().collect())
        }
        ColumnKind::Float => {
            ColumnValues::Float(column.cast(&DataType::Float64)?.f64()?.into_iter().collect())
        }
        ColumnKind::Boolean => ColumnValues::Boolean(column.bool()?.into_iter().collect()),
        ColumnKind::Date => ColumnValues::Date(
            column
                .cast(&DataType::Int32)?
                .i32()?
                .into_iter()
                .map(|days| days.and_then(date_from_epoch_days))
                .collect(),
        ),
        ColumnKind::Timestamp => {
            let scale = match dtype {
                DataType::Datetime(TimeUnit::Nanoseconds, _) => MicrosScale::Divide(1_000),
                DataType::Datetime(TimeUnit::Milliseconds, _) => MicrosScale::Multiply(1_000),
                _ => MicrosScale::Multiply(1),
            };
            ColumnValues::Timestamp(
                column
                    .cast(&DataType::Int64)?
                    .i64()?
                    .into_iter()
                    .map(|raw| raw.and_then(|raw| timestamp_from_micros(scale.apply(raw))))
                    .collect(),
            )
        }
        ColumnKind::Text => ColumnValues::Text(
            column
                .cast(&DataType::String)?
                .str()?
                .into_iter()
                .map(|value| value.map(str::to_string))
                .collect(),
        ),
    };

    Ok(values)
}

#[derive(Debug, Clone, Copy)]
enum MicrosScale {
    Multiply(i64),
    Divide(i64),
}

impl MicrosScale {
    fn apply(self, raw: i64) -> i64 {
        match self {
            MicrosScale::Multiply(factor) => raw.saturating_mul(factor),
            MicrosScale::Divide(divisor) => raw.div_euclid(divisor),
        }
    }
}

/// Builds a frame from JSON records, one column per `layout` entry in that order.
///
/// A key missing from a record reads as null.
pub fn frame_from_json_rows(
    layout: &[(String, ColumnKind)],
    rows: &[Map<String, Value>],
) -> Result<DataFrame, RowSetError> {
    let mut columns: Vec<Column> = Vec::with_capacity(layout.len());

    for (name, kind) in layout {
        let series = match kind {
            ColumnKind::Integer => {
                Series::new(name.as_str().into(), decode(name, *kind, rows, Value::as_i64)?)
            }
            ColumnKind::Float => Series::new(name.as_str().into(), decode(name, *kind, rows, json_float)?),
            ColumnKind::Boolean => {
                Series::new(name.as_str().into(), decode(name, *kind, rows, Value::as_bool)?)
            }
            ColumnKind::Date => {
                let days: Vec<Option<i32>> = decode(name, *kind, rows, |value| {
                    value.as_str().and_then(parse_date_text).map(epoch_days)
                })?;
                Series::new(name.as_str().into(), days).cast(&DataType::Date)?
            }
            ColumnKind::Timestamp => {
                let micros: Vec<Option<i64>> = decode(name, *kind, rows, |value| {
                    value
                        .as_str()
                        .and_then(parse_timestamp_text)
                        .map(|ts| ts.and_utc().timestamp_micros())
                })?;
                Series::new(name.as_str().into(), micros)
                    .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
            }
            ColumnKind::Text => Series::new(name.as_str().into(), decode(name, *kind, rows, json_text)?),
        };
        columns.push(series.into());
    }

    Ok(DataFrame::new(columns)?)
}

fn decode<T>(
    name: &str,
    kind: ColumnKind,
    rows: &[Map<String, Value>],
    parse: impl Fn(&Value) -> Option<T>,
) -> Result<Vec<Option<T>>, RowSetError> {
    rows.iter()
        .enumerate()
        .map(|(row, record)| match record.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => parse(value)
                .map(Some)
                .ok_or_else(|| RowSetError::InvalidValue {
                    column: name.to_string(),
                    row,
                    value: value.to_string(),
                    kind,
                }),
        })
        .collect()
}

fn json_float(value: &Value) -> Option<f64> {
    match value {
        Value::String(text) => text.parse().ok(),
        other => other.as_f64(),
    }
}

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
pub(crate) fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp_text(text).map(|ts| ts.date()))
}

pub(crate) fn parse_timestamp_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

pub(crate) fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub(crate) fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

fn timestamp_from_micros(micros: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}
