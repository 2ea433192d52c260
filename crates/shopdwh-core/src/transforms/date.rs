use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

use super::common::{coerce, require};
use super::TransformError;
use crate::rowset::{date_from_epoch_days, epoch_days, parse_date_text};

pub const ORDER_DATE: &str = "orderDate";

pub const DATE_COLUMNS: [&str; 8] = [
    "Date_Key", "Date", "Day", "Month", "Quarter", "Year", "Weekday", "Holiday",
];

/// Builds `Dim_Date`: one row per calendar day between the earliest and the
/// latest `orderDate` of the extract, inclusive.
///
/// Only `orderDate` is read; everything else in the extract is ignored.
pub fn transform_dim_date(df: &DataFrame) -> Result<DataFrame, TransformError> {
    if df.height() == 0 {
        return Err(TransformError::EmptyDateRange);
    }

    let dates = order_dates(require(df, ORDER_DATE)?)?;
    let mut bounds: Option<(NaiveDate, NaiveDate)> = None;
    for date in dates.into_iter().flatten() {
        bounds = Some(match bounds {
            None => (date, date),
            Some((start, end)) => (start.min(date), end.max(date)),
        });
    }

    let (start, end) = bounds.ok_or(TransformError::EmptyDateRange)?;
    build_date_axis(start, end)
}

/// Enumerates `[start, end]` at daily frequency with a chronological `Date_Key`.
pub fn build_date_axis(start: NaiveDate, end: NaiveDate) -> Result<DataFrame, TransformError> {
    let days: Vec<NaiveDate> = start.iter_days().take_while(|day| *day <= end).collect();
    let len = days.len();

    let mut keys = Vec::with_capacity(len);
    let mut epoch = Vec::with_capacity(len);
    let mut day_of_month = Vec::with_capacity(len);
    let mut month = Vec::with_capacity(len);
    let mut quarter = Vec::with_capacity(len);
    let mut year = Vec::with_capacity(len);
    let mut weekday = Vec::with_capacity(len);

    for (idx, day) in days.iter().enumerate() {
        keys.push(idx as i64 + 1);
        epoch.push(epoch_days(*day));
        day_of_month.push(day.day() as i32);
        month.push(day.month() as i32);
        quarter.push(((day.month() - 1) / 3 + 1) as i32);
        year.push(day.year());
        weekday.push(day.weekday().num_days_from_monday() < 5);
    }

    let dates = Series::new("Date".into(), epoch).cast(&DataType::Date)?;

    let df = DataFrame::new(vec![
        Series::new("Date_Key".into(), keys).into(),
        dates.into(),
        Series::new("Day".into(), day_of_month).into(),
        Series::new("Month".into(), month).into(),
        Series::new("Quarter".into(), quarter).into(),
        Series::new("Year".into(), year).into(),
        Series::new("Weekday".into(), weekday).into(),
        Series::new("Holiday".into(), vec![false; len]).into(),
    ])?;

    Ok(df)
}

/// Reads `orderDate` as calendar days. Dates, timestamps and ISO text are
/// accepted; any other column type is rejected at its first non-null value.
fn order_dates(column: &Column) -> Result<Vec<Option<NaiveDate>>, TransformError> {
    match column.dtype() {
        DataType::String => {
            let values = column.str()?;
            values
                .into_iter()
                .enumerate()
                .map(|(row, value)| match value {
                    None => Ok(None),
                    Some(text) => parse_date_text(text)
                        .map(Some)
                        .ok_or_else(|| not_a_date(column, row, text.to_string())),
                })
                .collect()
        }
        DataType::Date | DataType::Datetime(_, _) => {
            let days = coerce(column, &DataType::Date, "date")?.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .into_iter()
                .map(|value| value.and_then(date_from_epoch_days))
                .collect())
        }
        // An all-null column of any type carries no dates.
        _ if column.null_count() == column.len() => Ok(vec![None; column.len()]),
        _ => {
            for row in 0..column.len() {
                let value = column.get(row)?;
                if !value.is_null() {
                    return Err(not_a_date(column, row, value.to_string()));
                }
            }
            Ok(vec![None; column.len()])
        }
    }
}

fn not_a_date(column: &Column, row: usize, value: String) -> TransformError {
    TransformError::TypeCoercion {
        column: column.name().to_string(),
        row,
        value,
        target: "date",
    }
}
