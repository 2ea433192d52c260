use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::io::parquet::write::{ParquetCompression, ParquetWriter};
use polars::prelude::{DataFrame, ParquetReader, SerReader};

use super::{ClientError, DestinationClient, LoadAck, SourceClient};
use crate::credentials::Credentials;
use crate::table_ref::TableRef;

/// Tables stored as `<root>/<schema>/<table>.parquet`.
///
/// Credentials are ignored; file permissions govern access.
#[derive(Debug, Clone)]
pub struct ParquetDirectory {
    root: PathBuf,
}

impl ParquetDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn table_path(&self, table: &TableRef) -> PathBuf {
        self.root
            .join(table.schema())
            .join(format!("{}.parquet", table.table()))
    }
}

impl SourceClient for ParquetDirectory {
    fn execute_full_scan(
        &self,
        table: &TableRef,
        _credentials: &Credentials,
    ) -> Result<DataFrame, ClientError> {
        let path = self.table_path(table);
        if !path.is_file() {
            return Err(ClientError::TableNotFound(table.clone()));
        }
        let file = File::open(&path)?;
        Ok(ParquetReader::new(file).finish()?)
    }
}

impl DestinationClient for ParquetDirectory {
    fn replace_table(
        &self,
        table: &TableRef,
        rows: &DataFrame,
        _credentials: &Credentials,
    ) -> Result<LoadAck, ClientError> {
        let target = self.table_path(table);
        let dir = self.root.join(table.schema());
        fs::create_dir_all(&dir)?;

        // Written beside the target and renamed over it so readers never see a partial file.
        let staging = dir.join(format!(".{}.parquet.tmp", table.table()));
        if let Err(err) = write_and_swap(rows, &staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(err);
        }

        Ok(LoadAck {
            table: table.clone(),
            rows_written: rows.height(),
        })
    }
}

fn write_and_swap(rows: &DataFrame, staging: &Path, target: &Path) -> Result<(), ClientError> {
    {
        let file = File::create(staging)?;
        let mut frame = rows.clone();
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Zstd(None))
            .finish(&mut frame)?;
    }
    fs::rename(staging, target)?;
    Ok(())
}
