//! SQLite database backend.

use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use super::database::{DatabaseBackend, Row};
use super::ServiceError;
use crate::config::DatabaseConfig;

pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open a pool for the configured URL, creating the database file if needed.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, ServiceError> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(backend_error)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(backend_error)?;

        tracing::info!(url = %config.url, "Database pool ready");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DatabaseBackend for SqliteBackend {
    fn backend_tag(&self) -> &'static str {
        "sqlite"
    }

    async fn query(&self, statement: String, params: Vec<Value>) -> Result<Vec<Row>, ServiceError> {
        let rows = bind_params(sqlx::query(&statement), params)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_error)?;
        rows.iter()
            .map(row_to_json)
            .collect::<Result<_, _>>()
            .map_err(backend_error)
    }

    async fn query_one(
        &self,
        statement: String,
        params: Vec<Value>,
    ) -> Result<Option<Row>, ServiceError> {
        let row = bind_params(sqlx::query(&statement), params)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_error)?;
        row.as_ref()
            .map(row_to_json)
            .transpose()
            .map_err(backend_error)
    }

    async fn execute(&self, statement: String, params: Vec<Value>) -> Result<(), ServiceError> {
        bind_params(sqlx::query(&statement), params)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn probe(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1 AS health_check")
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}

fn backend_error(e: sqlx::Error) -> ServiceError {
    ServiceError::backend("database", e.to_string())
}

fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: Vec<Value>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64()),
            },
            Value::String(s) => query.bind(s),
            // Arrays and objects are stored as JSON text.
            other => query.bind(other.to_string()),
        };
    }
    query
}

fn row_to_json(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    let mut object = Row::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "REAL" => Value::from(row.try_get::<f64, _>(idx)?),
                "TEXT" | "DATE" | "TIME" | "DATETIME" => Value::String(row.try_get(idx)?),
                "BLOB" => Value::from(row.try_get::<Vec<u8>, _>(idx)?),
                _ => Value::from(row.try_get::<i64, _>(idx)?),
            }
        };
        object.insert(column.name().to_string(), value);
    }
    Ok(object)
}
