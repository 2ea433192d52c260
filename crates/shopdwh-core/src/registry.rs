use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use polars::prelude::DataFrame;

use crate::error::{PipelineError, Result};
use crate::transforms::{self, TransformError};

pub type TransformRule = fn(&DataFrame) -> std::result::Result<DataFrame, TransformError>;

/// Warehouse tables that have a reshaping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationTable {
    DimCustomer,
    DimDate,
    DimEmployee,
    DimOffice,
    DimProduct,
    FactSales,
}

impl DestinationTable {
    pub const ALL: [DestinationTable; 6] = [
        DestinationTable::DimCustomer,
        DestinationTable::DimDate,
        DestinationTable::DimEmployee,
        DestinationTable::DimOffice,
        DestinationTable::DimProduct,
        DestinationTable::FactSales,
    ];

    /// Table name as it appears in the destination `schema.table`.
    pub fn code(self) -> &'static str {
        match self {
            DestinationTable::DimCustomer => "Dim_Customer",
            DestinationTable::DimDate => "Dim_Date",
            DestinationTable::DimEmployee => "Dim_Employee",
            DestinationTable::DimOffice => "Dim_Office",
            DestinationTable::DimProduct => "Dim_Product",
            DestinationTable::FactSales => "Fact_Sales",
        }
    }

    fn description(self) -> &'static str {
        match self {
            DestinationTable::DimCustomer => {
                "Combined contact name, address line 2 and sales rep dropped, typed keys"
            }
            DestinationTable::DimDate => "One row per day between the first and last order date",
            DestinationTable::DimEmployee => "Surrogate key, combined name, six renamed columns",
            DestinationTable::DimOffice => "Renamed office columns with a surrogate key",
            DestinationTable::DimProduct => "Renamed product columns with a surrogate key",
            DestinationTable::FactSales => "Loaded unchanged",
        }
    }

    fn rule(self) -> TransformRule {
        match self {
            DestinationTable::DimCustomer => transforms::transform_dim_customer,
            DestinationTable::DimDate => transforms::transform_dim_date,
            DestinationTable::DimEmployee => transforms::transform_dim_employee,
            DestinationTable::DimOffice => transforms::transform_dim_office,
            DestinationTable::DimProduct => transforms::transform_dim_product,
            DestinationTable::FactSales => transforms::transform_fact_sales,
        }
    }
}

impl FromStr for DestinationTable {
    type Err = PipelineError;

    fn from_str(name: &str) -> Result<Self> {
        DestinationTable::ALL
            .into_iter()
            .find(|destination| destination.code() == name)
            .ok_or_else(|| PipelineError::UnknownDestination {
                name: name.to_string(),
            })
    }
}

impl fmt::Display for DestinationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone)]
pub struct TransformDescriptor {
    pub destination: DestinationTable,
    pub code: &'static str,
    pub description: &'static str,
    pub rule: TransformRule,
}

/// Fixed table of reshaping rules, built once and shared read-only.
#[derive(Debug)]
pub struct TransformRegistry {
    descriptors: Vec<TransformDescriptor>,
}

static REGISTRY: Lazy<TransformRegistry> = Lazy::new(|| TransformRegistry {
    descriptors: DestinationTable::ALL
        .into_iter()
        .map(|destination| TransformDescriptor {
            destination,
            code: destination.code(),
            description: destination.description(),
            rule: destination.rule(),
        })
        .collect(),
});

pub fn registry() -> &'static TransformRegistry {
    &REGISTRY
}

impl TransformRegistry {
    pub fn descriptors(&self) -> &[TransformDescriptor] {
        self.descriptors.as_slice()
    }

    /// Case-sensitive, exact-match lookup by destination table name.
    pub fn lookup(&self, name: &str) -> Result<&TransformDescriptor> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.code == name)
            .ok_or_else(|| PipelineError::UnknownDestination {
                name: name.to_string(),
            })
    }

    pub fn get(&self, destination: DestinationTable) -> Result<&TransformDescriptor> {
        self.lookup(destination.code())
    }

    /// Looks up `name` and applies its rule to `rows`.
    pub fn apply(&self, name: &str, rows: &DataFrame) -> Result<DataFrame> {
        let descriptor = self.lookup(name)?;
        Ok((descriptor.rule)(rows)?)
    }

    pub fn apply_to(&self, destination: DestinationTable, rows: &DataFrame) -> Result<DataFrame> {
        let descriptor = self.get(destination)?;
        Ok((descriptor.rule)(rows)?)
    }
}
