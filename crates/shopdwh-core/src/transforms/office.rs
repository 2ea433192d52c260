use polars::prelude::*;

use super::common::{prepend_surrogate_key, rename_columns};
use super::TransformError;

pub const OFFICE_RENAMES: [(&str, &str); 9] = [
    ("officeCode", "Office_Code"),
    ("city", "City"),
    ("phone", "Phone"),
    ("addressLine1", "AddressLine1"),
    ("addressLine2", "AddressLine2"),
    ("state", "State"),
    ("country", "Country"),
    ("postalCode", "PostalCode"),
    ("territory", "Territory"),
];

/// Builds `Dim_Office`: renames only, then `Office_Key` up front.
pub fn transform_dim_office(df: &DataFrame) -> Result<DataFrame, TransformError> {
    let mut output = df.clone();
    rename_columns(&mut output, &OFFICE_RENAMES)?;
    prepend_surrogate_key(&mut output, "Office_Key")?;
    Ok(output)
}
