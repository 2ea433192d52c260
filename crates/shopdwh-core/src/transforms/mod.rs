//! One reshaping rule per warehouse destination table.
//!
//! Every rule takes the extracted frame by reference and builds a new one;
//! the input is never modified.

use polars::prelude::PolarsError;
use thiserror::Error;

mod common;
pub mod customer;
pub mod date;
pub mod employee;
pub mod fact_sales;
pub mod office;
pub mod product;

pub use customer::transform_dim_customer;
pub use date::{build_date_axis, transform_dim_date};
pub use employee::transform_dim_employee;
pub use fact_sales::transform_fact_sales;
pub use office::transform_dim_office;
pub use product::transform_dim_product;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("cannot build a date axis: extract contains no order dates")]
    EmptyDateRange,

    #[error("column {column} is null at row {row}")]
    NullField { column: String, row: usize },

    #[error("column {column} row {row}: cannot coerce {value} to {target}")]
    TypeCoercion {
        column: String,
        row: usize,
        value: String,
        target: &'static str,
    },

    #[error("required column {column} is missing")]
    MissingColumn { column: String },

    #[error("renaming {from} to {to} would duplicate an existing column")]
    DuplicateColumn { from: String, to: String },

    #[error("surrogate key column {column} is already present in the input")]
    KeyColumnExists { column: String },

    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}
