use polars::prelude::*;

use super::TransformError;

pub(crate) fn require<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, TransformError> {
    df.column(name).map_err(|_| TransformError::MissingColumn {
        column: name.to_string(),
    })
}

/// Projects `df` onto `columns`, in that order.
pub(crate) fn select_declared(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, TransformError> {
    for name in columns {
        require(df, name)?;
    }
    Ok(df.select(columns.iter().copied())?)
}

/// `first + " " + last`, row by row. A null on either side fails the rule.
pub(crate) fn full_name(
    df: &DataFrame,
    first: &str,
    last: &str,
    output: &str,
) -> Result<Column, TransformError> {
    let first_col = require(df, first)?.cast(&DataType::String)?;
    let last_col = require(df, last)?.cast(&DataType::String)?;
    let firsts = first_col.str()?;
    let lasts = last_col.str()?;

    let mut names = Vec::with_capacity(df.height());
    for (row, (first_name, last_name)) in firsts.into_iter().zip(lasts.into_iter()).enumerate() {
        let first_name = first_name.ok_or_else(|| TransformError::NullField {
            column: first.to_string(),
            row,
        })?;
        let last_name = last_name.ok_or_else(|| TransformError::NullField {
            column: last.to_string(),
            row,
        })?;
        names.push(format!("{first_name} {last_name}"));
    }

    Ok(Series::new(output.into(), names).into())
}

/// Dense 1-based key, one value per row.
pub(crate) fn surrogate_key(name: &str, len: usize) -> Column {
    let keys: Vec<i64> = (1..=len as i64).collect();
    Series::new(name.into(), keys).into()
}

/// Inserts a dense 1-based key named `name` as the first column.
pub(crate) fn prepend_surrogate_key(df: &mut DataFrame, name: &str) -> Result<(), TransformError> {
    if df.column(name).is_ok() {
        return Err(TransformError::KeyColumnExists {
            column: name.to_string(),
        });
    }
    df.insert_column(0, surrogate_key(name, df.height()))?;
    Ok(())
}

/// Casts `column` to `target`, failing on the first value the cast turns into a null.
pub(crate) fn coerce(
    column: &Column,
    target: &DataType,
    label: &'static str,
) -> Result<Column, TransformError> {
    // Text is trimmed before the cast.
    let coerced: Column = if column.dtype() == &DataType::String && target != &DataType::String {
        let trimmed: StringChunked = column
            .str()?
            .into_iter()
            .map(|value| value.map(str::trim))
            .collect();
        trimmed
            .with_name(column.name().clone())
            .into_series()
            .cast(target)?
            .into()
    } else {
        column.cast(target)?
    };
    if coerced.null_count() == column.null_count() {
        return Ok(coerced);
    }

    for row in 0..column.len() {
        let original = column.get(row)?;
        if !original.is_null() && coerced.get(row)?.is_null() {
            let value = match original {
                AnyValue::String(text) => text.to_string(),
                other => other.to_string(),
            };
            return Err(TransformError::TypeCoercion {
                column: column.name().to_string(),
                row,
                value,
                target: label,
            });
        }
    }

    Ok(coerced)
}

/// Renames each `(from, to)` pair in place. Every `from` column must exist.
pub(crate) fn rename_columns(
    df: &mut DataFrame,
    renames: &[(&str, &str)],
) -> Result<(), TransformError> {
    for (from, to) in renames {
        require(df, from)?;
        if from == to {
            continue;
        }
        if df.column(to).is_ok() {
            return Err(TransformError::DuplicateColumn {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        df.rename(from, (*to).into())?;
    }
    Ok(())
}
