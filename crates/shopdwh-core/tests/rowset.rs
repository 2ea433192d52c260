use anyhow::Result;
use chrono::NaiveDate;
use polars::prelude::*;
use serde_json::{json, Map, Value};
use shopdwh_core::rowset::{column_values, frame_from_json_rows, ColumnKind, ColumnValues, RowSetError};

fn record(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("json object")
}

fn orders_layout() -> Vec<(String, ColumnKind)> {
    vec![
        ("orderNumber".to_string(), ColumnKind::Integer),
        ("orderDate".to_string(), ColumnKind::Date),
        ("shippedDate".to_string(), ColumnKind::Timestamp),
        ("status".to_string(), ColumnKind::Text),
        ("comments".to_string(), ColumnKind::Text),
        ("amount".to_string(), ColumnKind::Float),
        ("paid".to_string(), ColumnKind::Boolean),
    ]
}

#[test]
fn json_rows_become_typed_columns() -> Result<()> {
    let rows = vec![
        record(json!({
            "orderNumber": 10100,
            "orderDate": "2003-01-06",
            "shippedDate": "2003-01-10T00:00:00",
            "status": "Shipped",
            "comments": null,
            "amount": "10223.83",
            "paid": true
        })),
        record(json!({
            "orderNumber": 10101,
            "orderDate": "2003-01-09",
            "status": "Shipped",
            "comments": "Check on availability.",
            "amount": 4711.5,
            "paid": false
        })),
    ];

    let df = frame_from_json_rows(&orders_layout(), &rows)?;

    let names: Vec<&str> = df.get_column_names().into_iter().map(|n| n.as_str()).collect();
    assert_eq!(
        names,
        vec!["orderNumber", "orderDate", "shippedDate", "status", "comments", "amount", "paid"]
    );
    assert_eq!(df.column("orderNumber")?.dtype(), &DataType::Int64);
    assert_eq!(df.column("orderDate")?.dtype(), &DataType::Date);
    assert_eq!(
        df.column("shippedDate")?.dtype(),
        &DataType::Datetime(TimeUnit::Microseconds, None)
    );
    assert_eq!(df.column("shippedDate")?.null_count(), 1);
    assert_eq!(df.column("comments")?.null_count(), 1);
    let amounts: Vec<f64> = df.column("amount")?.f64()?.into_no_null_iter().collect();
    assert_eq!(amounts, vec![10223.83, 4711.5]);
    Ok(())
}

#[test]
fn empty_result_keeps_the_layout() -> Result<()> {
    let df = frame_from_json_rows(&orders_layout(), &[])?;
    assert_eq!(df.height(), 0);
    assert_eq!(df.width(), 7);
    assert_eq!(df.column("orderDate")?.dtype(), &DataType::Date);
    Ok(())
}

#[test]
fn undecodable_value_reports_row() {
    let rows = vec![
        record(json!({ "orderNumber": 10100 })),
        record(json!({ "orderNumber": "ten thousand" })),
    ];
    let layout = vec![("orderNumber".to_string(), ColumnKind::Integer)];

    let err = frame_from_json_rows(&layout, &rows).expect_err("text in an integer column");
    assert!(matches!(
        err,
        RowSetError::InvalidValue { row: 1, kind: ColumnKind::Integer, .. }
    ));
}

#[test]
fn column_values_decode_dates_and_nulls() -> Result<()> {
    let rows = vec![
        record(json!({ "orderDate": "2003-01-06" })),
        record(json!({ "orderDate": null })),
    ];
    let layout = vec![("orderDate".to_string(), ColumnKind::Date)];
    let df = frame_from_json_rows(&layout, &rows)?;

    let values = column_values(df.column("orderDate")?)?;
    assert_eq!(values.kind(), ColumnKind::Date);
    assert_eq!(
        values,
        ColumnValues::Date(vec![NaiveDate::from_ymd_opt(2003, 1, 6), None])
    );
    Ok(())
}

#[test]
fn column_values_widen_integers_and_floats() -> Result<()> {
    let small = Column::from(Series::new("Day".into(), [1i32, 31]));
    assert_eq!(
        column_values(&small)?,
        ColumnValues::Integer(vec![Some(1), Some(31)])
    );

    let narrow = Column::from(Series::new("price".into(), [1.5f32]));
    assert_eq!(column_values(&narrow)?, ColumnValues::Float(vec![Some(1.5)]));
    Ok(())
}

#[test]
fn sql_type_names_map_to_kinds() {
    assert_eq!(ColumnKind::from_sql_type("integer"), ColumnKind::Integer);
    assert_eq!(ColumnKind::from_sql_type("numeric"), ColumnKind::Float);
    assert_eq!(
        ColumnKind::from_sql_type("timestamp without time zone"),
        ColumnKind::Timestamp
    );
    assert_eq!(ColumnKind::from_sql_type("character varying"), ColumnKind::Text);
    assert_eq!(ColumnKind::from_sql_type("DATE"), ColumnKind::Date);
    assert_eq!(ColumnKind::Float.sql_type(), "DOUBLE PRECISION");
}
