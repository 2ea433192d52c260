use polars::prelude::*;

use super::common::{coerce, full_name, require, select_declared};
use super::TransformError;

pub const CUSTOMER_COLUMNS: [&str; 10] = [
    "customerNumber",
    "customerName",
    "contactFullName",
    "phone",
    "addressLine1",
    "city",
    "state",
    "postalCode",
    "country",
    "creditLimit",
];

/// Builds `Dim_Customer`.
///
/// Joins the contact name parts into `contactFullName`, drops the name parts,
/// `addressLine2` and `salesRepEmployeeNumber`, and fixes the column order to
/// [`CUSTOMER_COLUMNS`]. `customerNumber` leaves as text and `creditLimit` as
/// a float.
pub fn transform_dim_customer(df: &DataFrame) -> Result<DataFrame, TransformError> {
    let contact = full_name(df, "contactFirstName", "contactLastName", "contactFullName")?;
    let customer_number = require(df, "customerNumber")?.cast(&DataType::String)?;
    let credit_limit = coerce(require(df, "creditLimit")?, &DataType::Float64, "float")?;

    let mut output = df.clone();
    output.with_column(contact)?;
    output.with_column(customer_number)?;
    output.with_column(credit_limit)?;

    select_declared(&output, &CUSTOMER_COLUMNS)
}
