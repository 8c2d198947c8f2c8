//! In-memory database double
//!
//! Serves canned result sets keyed by table name and records every issued
//! statement, so tests can assert on generated SQL, bound parameters, and
//! query counts without a live server.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::core::{Database, SqlRow};
use crate::error::ModelResult;

/// One issued statement: SQL text plus bound parameters
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Default)]
struct Inner {
    results: HashMap<String, VecDeque<Vec<SqlRow>>>,
    log: Vec<Statement>,
    serials: HashMap<String, i64>,
}

/// [`Database`] double backed by canned per-table result queues.
///
/// SELECTs pop the next queued result set for their top-level table (an
/// empty set when nothing is queued). INSERTs echo the inserted columns
/// back as the returned row, synthesizing a serial `id` when the insert
/// does not provide one. UPDATE/DELETE report one affected row.
#[derive(Default)]
pub struct MemoryDatabase {
    inner: Mutex<Inner>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result set for the next SELECT against `table`
    pub fn queue_rows(&self, table: &str, rows: Vec<SqlRow>) {
        self.lock()
            .results
            .entry(table.to_string())
            .or_default()
            .push_back(rows);
    }

    /// Every statement issued so far, in order
    pub fn statements(&self) -> Vec<Statement> {
        self.lock().log.clone()
    }

    /// Issued statements filtered to SELECTs
    pub fn selects(&self) -> Vec<Statement> {
        self.statements()
            .into_iter()
            .filter(|s| s.sql.starts_with("SELECT"))
            .collect()
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.lock().log.push(Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }

    fn pop_rows(&self, table: &str) -> Vec<SqlRow> {
        self.lock()
            .results
            .get_mut(table)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_default()
    }

    fn next_serial(&self, table: &str) -> i64 {
        let mut inner = self.lock();
        let serial = inner.serials.entry(table.to_string()).or_insert(0);
        *serial += 1;
        *serial
    }

    fn answer_select(&self, sql: &str) -> Vec<SqlRow> {
        match top_level_from(sql) {
            Some(table) => self.pop_rows(&table),
            None => Vec::new(),
        }
    }

    fn answer_insert(&self, sql: &str, params: &[Value]) -> SqlRow {
        let table = table_after(sql, "INSERT INTO ").unwrap_or_default();
        let mut row = SqlRow::new();
        for (column, value) in insert_columns(sql).iter().zip(params.iter()) {
            row.insert(column.clone(), value.clone());
        }
        if !row.contains_key("id") {
            row.insert("id".to_string(), Value::from(self.next_serial(&table)));
        }
        row
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn execute(&self, sql: &str, params: &[Value]) -> ModelResult<u64> {
        self.record(sql, params);
        Ok(1)
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> ModelResult<Vec<SqlRow>> {
        self.record(sql, params);
        if sql.starts_with("INSERT") {
            return Ok(vec![self.answer_insert(sql, params)]);
        }
        Ok(self.answer_select(sql))
    }

    async fn fetch_optional(&self, sql: &str, params: &[Value]) -> ModelResult<Option<SqlRow>> {
        self.record(sql, params);
        if sql.starts_with("INSERT") {
            return Ok(Some(self.answer_insert(sql, params)));
        }
        Ok(self.answer_select(sql).into_iter().next())
    }
}

/// Table named by the first `FROM` outside any parentheses.
///
/// Count projections embed subqueries ahead of the outer `FROM`, so a plain
/// substring search would pick up the wrong table.
fn top_level_from(sql: &str) -> Option<String> {
    let bytes = sql.as_bytes();
    let mut depth = 0usize;
    for i in 0..bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ => {
                if depth == 0 && sql[i..].starts_with(" FROM ") {
                    return first_token(&sql[i + 6..]);
                }
            }
        }
    }
    None
}

fn table_after(sql: &str, keyword: &str) -> Option<String> {
    let pos = sql.find(keyword)? + keyword.len();
    first_token(&sql[pos..])
}

fn first_token(rest: &str) -> Option<String> {
    let rest = rest.trim_start();
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or(rest.len());
    let token = rest[..end].trim_matches('"');
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn insert_columns(sql: &str) -> Vec<String> {
    let Some(start) = sql.find('(') else {
        return Vec::new();
    };
    let Some(len) = sql[start + 1..].find(')') else {
        return Vec::new();
    };
    sql[start + 1..start + 1 + len]
        .split(',')
        .map(|column| column.trim().to_string())
        .collect()
}
