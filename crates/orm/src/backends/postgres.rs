//! PostgreSQL backend
//!
//! Implements [`Database`] on top of a sqlx connection pool. Fetched rows
//! are converted to JSON maps so the rest of the engine stays driver
//! agnostic.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Column, Pool, Postgres, Row, TypeInfo};

use super::core::{Database, SqlRow};
use crate::error::{ModelError, ModelResult};

/// Pool construction errors
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Failed to create PostgreSQL pool: {0}")]
    Create(#[from] sqlx::Error),

    #[error("Invalid PostgreSQL URL scheme: {0}")]
    InvalidUrlScheme(String),
}

impl From<PoolError> for ModelError {
    fn from(err: PoolError) -> Self {
        ModelError::Configuration(err.to_string())
    }
}

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 30,
        }
    }
}

/// [`Database`] implementation backed by a sqlx PostgreSQL pool
pub struct PostgresDatabase {
    pool: Pool<Postgres>,
}

impl PostgresDatabase {
    /// Connect a new pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, PoolError> {
        if !config.url.starts_with("postgresql://") && !config.url.starts_with("postgres://") {
            return Err(PoolError::InvalidUrlScheme(config.url.clone()));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                config.acquire_timeout_seconds,
            ))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn execute(&self, sql: &str, params: &[Value]) -> ModelResult<u64> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_json_value(query, param);
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| ModelError::Database(format!("Statement failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> ModelResult<Vec<SqlRow>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_json_value(query, param);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ModelError::Database(format!("Query failed: {}", e)))?;

        rows.iter().map(row_to_json_map).collect()
    }

    async fn fetch_optional(&self, sql: &str, params: &[Value]) -> ModelResult<Option<SqlRow>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_json_value(query, param);
        }

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ModelError::Database(format!("Query failed: {}", e)))?;

        row.as_ref().map(row_to_json_map).transpose()
    }
}

/// Bind a JSON parameter to a sqlx query by value kind
fn bind_json_value<'a>(
    query: sqlx::query::Query<'a, Postgres, PgArguments>,
    value: &Value,
) -> sqlx::query::Query<'a, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => query.bind(s.clone()),
        // Arrays and objects go through the JSONB encoding
        other => query.bind(other.clone()),
    }
}

/// Convert a PostgreSQL row to a JSON map, keyed by column name
fn row_to_json_map(row: &PgRow) -> ModelResult<SqlRow> {
    let mut map = SqlRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), column_to_json(row, index)?);
    }
    Ok(map)
}

fn column_to_json(row: &PgRow, index: usize) -> ModelResult<Value> {
    let type_name = row.columns()[index].type_info().name().to_string();

    let value = match type_name.as_str() {
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .map(|v| v.map(Value::Bool)),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .map(|v| v.map(|i| Value::from(i as i64))),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .map(|v| v.map(|i| Value::from(i as i64))),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .map(|v| v.map(Value::from)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .map(|v| v.map(|f| Value::from(f as f64))),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)
            .map(|v| v.map(Value::from)),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)
            .map(|v| v.map(|u| Value::String(u.to_string()))),
        "TIMESTAMPTZ" | "TIMESTAMP" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map(|v| v.map(|dt| Value::String(dt.to_rfc3339()))),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .map(|v| v.map(|d| Value::String(d.to_string()))),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index),
        // TEXT, VARCHAR, NAME and anything else decodable as text
        _ => row
            .try_get::<Option<String>, _>(index)
            .map(|v| v.map(Value::String)),
    };

    value
        .map(|v| v.unwrap_or(Value::Null))
        .map_err(|e| {
            ModelError::Database(format!(
                "Failed to decode column {} ({}): {}",
                index, type_name, e
            ))
        })
}
