//! Core database abstraction
//!
//! The engine shapes SQL and folds result rows; execution happens behind a
//! narrow async trait so connection pools, open transactions, and test
//! doubles are interchangeable.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ModelResult;

/// A fetched row: column name to JSON value.
pub type SqlRow = serde_json::Map<String, Value>;

/// Abstract query-execution handle.
///
/// SQL uses `$n` placeholders; parameters are JSON values bound in order.
/// The engine holds no connections or locks of its own, so cancellation and
/// timeouts are entirely the implementation's concern.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute a statement and return the affected row count
    async fn execute(&self, sql: &str, params: &[Value]) -> ModelResult<u64>;

    /// Execute a query and return all result rows
    async fn fetch_all(&self, sql: &str, params: &[Value]) -> ModelResult<Vec<SqlRow>>;

    /// Execute a query and return the first result row, if any
    async fn fetch_optional(&self, sql: &str, params: &[Value]) -> ModelResult<Option<SqlRow>>;
}
