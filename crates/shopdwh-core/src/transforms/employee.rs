use polars::prelude::*;

use super::common::{full_name, rename_columns, select_declared, surrogate_key};
use super::TransformError;

/// `officeCode` lands in `Office_Key` as-is. It is the natural office code,
/// not the `Dim_Office` surrogate key.
pub const EMPLOYEE_RENAMES: [(&str, &str); 4] = [
    ("employeeNumber", "Employee_Number"),
    ("email", "Email"),
    ("jobTitle", "Job_Title"),
    ("officeCode", "Office_Key"),
];

pub const EMPLOYEE_COLUMNS: [&str; 6] = [
    "Employee_Key",
    "Employee_Number",
    "Employee_Name",
    "Email",
    "Job_Title",
    "Office_Key",
];

/// Builds `Dim_Employee` with an `Employee_Key` in input row order.
pub fn transform_dim_employee(df: &DataFrame) -> Result<DataFrame, TransformError> {
    let name = full_name(df, "firstName", "lastName", "Employee_Name")?;

    let mut output = df.clone();
    output.with_column(surrogate_key("Employee_Key", df.height()))?;
    output.with_column(name)?;
    rename_columns(&mut output, &EMPLOYEE_RENAMES)?;

    select_declared(&output, &EMPLOYEE_COLUMNS)
}
