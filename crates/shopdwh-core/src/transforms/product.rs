use polars::prelude::*;

use super::common::{prepend_surrogate_key, rename_columns};
use super::TransformError;

// MSRP keeps its name.
pub const PRODUCT_RENAMES: [(&str, &str); 9] = [
    ("productCode", "Product_Code"),
    ("productName", "Product_Name"),
    ("productLine", "Product_Line"),
    ("productScale", "Product_Scale"),
    ("productVendor", "Product_Vendor"),
    ("productDescription", "Product_Description"),
    ("quantityInStock", "Quantity_In_Stock"),
    ("buyPrice", "Buy_Price"),
    ("MSRP", "MSRP"),
];

/// Builds `Dim_Product`: renames only, then `Product_Key` up front.
pub fn transform_dim_product(df: &DataFrame) -> Result<DataFrame, TransformError> {
    let mut output = df.clone();
    rename_columns(&mut output, &PRODUCT_RENAMES)?;
    prepend_surrogate_key(&mut output, "Product_Key")?;
    Ok(output)
}
