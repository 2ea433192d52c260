use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// A `schema.table` identifier naming either side of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    schema: String,
    table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Result<Self, PipelineError> {
        let schema = schema.into();
        let table = table.into();
        if !is_valid_segment(&schema) || !is_valid_segment(&table) {
            return Err(PipelineError::InvalidTableRef {
                value: format!("{schema}.{table}"),
            });
        }
        Ok(Self { schema, table })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Second name segment; for destinations this is the transform registry key.
    pub fn table(&self) -> &str {
        &self.table
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains('.') && segment.trim() == segment
}

impl FromStr for TableRef {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || PipelineError::InvalidTableRef {
            value: value.to_string(),
        };
        let (schema, table) = value.split_once('.').ok_or_else(invalid)?;
        TableRef::new(schema, table).map_err(|_| invalid())
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_segment_names() {
        let table: TableRef = "shop_dwh.Dim_Date".parse().expect("valid table ref");
        assert_eq!(table.schema(), "shop_dwh");
        assert_eq!(table.table(), "Dim_Date");
        assert_eq!(table.to_string(), "shop_dwh.Dim_Date");
    }

    #[test]
    fn rejects_malformed_names() {
        for value in ["orders", "shop.", ".orders", "a.b.c", "", " shop.orders"] {
            let err = value.parse::<TableRef>().expect_err(value);
            assert!(
                matches!(err, PipelineError::InvalidTableRef { value: ref v } if v == value),
                "unexpected error for {value:?}: {err}"
            );
        }
    }
}
