use std::time::Duration;

use polars::prelude::DataFrame;
use serde_json::{Map, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::query_builder::Separated;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, QueryBuilder};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use super::{ClientError, DestinationClient, LoadAck, SourceClient};
use crate::credentials::Credentials;
use crate::rowset::{column_values, frame_from_json_rows, ColumnKind, ColumnValues, RowSetError};
use crate::table_ref::TableRef;

pub type DbPool = Pool<Postgres>;

/// Postgres caps a statement at 65535 bind parameters.
const BIND_LIMIT: usize = 65_535;
const MAX_BATCH_ROWS: usize = 1_000;

/// Source and destination client for Postgres.
///
/// Calls block on a private current-thread runtime, so the pipeline stays
/// synchronous. The credentials handle is the connection URL.
#[derive(Debug)]
pub struct PostgresClient {
    runtime: Runtime,
    acquire_timeout: Duration,
}

impl PostgresClient {
    pub fn new() -> Result<Self, ClientError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime,
            acquire_timeout: Duration::from_secs(10),
        })
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    async fn connect(&self, credentials: &Credentials) -> Result<DbPool, ClientError> {
        PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(self.acquire_timeout)
            .connect(credentials.expose())
            .await
            .map_err(|err| ClientError::Connection(err.to_string()))
    }
}

impl SourceClient for PostgresClient {
    fn execute_full_scan(
        &self,
        table: &TableRef,
        credentials: &Credentials,
    ) -> Result<DataFrame, ClientError> {
        self.runtime.block_on(async {
            let pool = self.connect(credentials).await?;
            let result = fetch_table(&pool, table).await;
            pool.close().await;
            result
        })
    }
}

impl DestinationClient for PostgresClient {
    fn replace_table(
        &self,
        table: &TableRef,
        rows: &DataFrame,
        credentials: &Credentials,
    ) -> Result<LoadAck, ClientError> {
        let columns = rows
            .get_columns()
            .iter()
            .map(|column| {
                let values = column_values(column).map_err(|err| match err {
                    RowSetError::UnsupportedType { .. } => ClientError::SchemaConflict(err.to_string()),
                    other => ClientError::RowSet(other),
                })?;
                Ok((column.name().to_string(), values))
            })
            .collect::<Result<Vec<_>, ClientError>>()?;

        self.runtime.block_on(async {
            let pool = self.connect(credentials).await?;
            let result = replace_rows(&pool, table, &columns, rows.height()).await;
            pool.close().await;
            result
        })?;

        Ok(LoadAck {
            table: table.clone(),
            rows_written: rows.height(),
        })
    }
}

async fn fetch_table(pool: &DbPool, table: &TableRef) -> Result<DataFrame, ClientError> {
    let columns: Vec<(String, String)> = sqlx::query_as(
        r#"
            SELECT column_name::text, data_type::text
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#,
    )
    .bind(table.schema())
    .bind(table.table())
    .fetch_all(pool)
    .await
    .map_err(classify)?;

    if columns.is_empty() {
        return Err(ClientError::TableNotFound(table.clone()));
    }

    let layout: Vec<(String, ColumnKind)> = columns
        .into_iter()
        .map(|(name, data_type)| {
            let kind = ColumnKind::from_sql_type(&data_type);
            (name, kind)
        })
        .collect();

    let query = format!("SELECT row_to_json(t) FROM {} AS t", qualified_name(table));
    let records: Vec<Json<Map<String, Value>>> = sqlx::query_scalar(&query)
        .fetch_all(pool)
        .await
        .map_err(classify)?;
    debug!(table = %table, rows = records.len(), "Fetched source rows");

    let records: Vec<Map<String, Value>> = records.into_iter().map(|Json(record)| record).collect();
    Ok(frame_from_json_rows(&layout, &records)?)
}

async fn replace_rows(
    pool: &DbPool,
    table: &TableRef,
    columns: &[(String, ColumnValues)],
    height: usize,
) -> Result<(), ClientError> {
    let target = qualified_name(table);
    let mut tx = pool.begin().await.map_err(classify)?;

    sqlx::query(&format!(
        "CREATE SCHEMA IF NOT EXISTS {}",
        quote_ident(table.schema())
    ))
    .execute(&mut *tx)
    .await
    .map_err(classify)?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {target}"))
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

    let definitions = columns
        .iter()
        .map(|(name, values)| format!("{} {}", quote_ident(name), values.kind().sql_type()))
        .collect::<Vec<_>>()
        .join(", ");
    sqlx::query(&format!("CREATE TABLE {target} ({definitions})"))
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

    if !columns.is_empty() {
        let column_list = columns
            .iter()
            .map(|(name, _)| quote_ident(name))
            .collect::<Vec<_>>()
            .join(", ");
        let batch_rows = (BIND_LIMIT / columns.len()).clamp(1, MAX_BATCH_ROWS);

        let mut start = 0;
        while start < height {
            let end = (start + batch_rows).min(height);
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {target} ({column_list}) "));
            builder.push_values(start..end, |mut row, idx| {
                for (_, values) in columns {
                    push_value(&mut row, values, idx);
                }
            });
            builder.build().execute(&mut *tx).await.map_err(classify)?;
            start = end;
        }
    }

    tx.commit().await.map_err(classify)?;
    debug!(table = %table, rows = height, "Replaced destination table");
    Ok(())
}

fn push_value(row: &mut Separated<'_, '_, Postgres, &'static str>, values: &ColumnValues, idx: usize) {
    match values {
        ColumnValues::Integer(values) => {
            row.push_bind(values.get(idx).copied().flatten());
        }
        ColumnValues::Float(values) => {
            row.push_bind(values.get(idx).copied().flatten());
        }
        ColumnValues::Boolean(values) => {
            row.push_bind(values.get(idx).copied().flatten());
        }
        ColumnValues::Date(values) => {
            row.push_bind(values.get(idx).copied().flatten());
        }
        ColumnValues::Timestamp(values) => {
            row.push_bind(values.get(idx).copied().flatten());
        }
        ColumnValues::Text(values) => {
            row.push_bind(values.get(idx).cloned().flatten());
        }
    }
}

/// Shape errors (syntax/undefined object, data exception, integrity) are
/// schema conflicts; anything else is treated as the server being unavailable.
fn classify(err: sqlx::Error) -> ClientError {
    match &err {
        sqlx::Error::Database(db) => {
            let code = db.code().unwrap_or_default();
            if ["42", "22", "23"].iter().any(|class| code.starts_with(class)) {
                ClientError::SchemaConflict(db.message().to_string())
            } else {
                ClientError::Query(err.to_string())
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::Configuration(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => ClientError::Connection(err.to_string()),
        _ => ClientError::Query(err.to_string()),
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn qualified_name(table: &TableRef) -> String {
    format!("{}.{}", quote_ident(table.schema()), quote_ident(table.table()))
}
