//! Query builder types

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equal => write!(f, "="),
            QueryOperator::NotEqual => write!(f, "!="),
            QueryOperator::GreaterThan => write!(f, ">"),
            QueryOperator::GreaterThanOrEqual => write!(f, ">="),
            QueryOperator::LessThan => write!(f, "<"),
            QueryOperator::LessThanOrEqual => write!(f, "<="),
            QueryOperator::In => write!(f, "IN"),
            QueryOperator::NotIn => write!(f, "NOT IN"),
            QueryOperator::IsNull => write!(f, "IS NULL"),
            QueryOperator::IsNotNull => write!(f, "IS NOT NULL"),
        }
    }
}

/// How a condition chains onto the previous one
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conjunction {
    And,
    Or,
}

impl fmt::Display for Conjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conjunction::And => write!(f, "AND"),
            Conjunction::Or => write!(f, "OR"),
        }
    }
}

/// One WHERE condition.
///
/// The `column` field doubles as a sentinel for raw and subquery
/// conditions: `RAW` renders `value` verbatim, `EXISTS`/`NOT EXISTS`
/// render `value` as an embedded subquery.
#[derive(Debug, Clone)]
pub struct WhereCondition {
    pub column: String,
    pub operator: QueryOperator,
    pub value: Option<Value>,
    pub values: Vec<Value>, // For IN / NOT IN
    pub conjunction: Conjunction,
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Caller-supplied query decoration, applied before the query runs
pub type ScopeFn = Arc<dyn Fn(crate::query::Query) -> crate::query::Query + Send + Sync>;

/// One requested eager load: a relation path (dotted for nesting) and an
/// optional scope applying to that path's own level only.
#[derive(Clone)]
pub struct EagerSpec {
    pub path: String,
    pub scope: Option<ScopeFn>,
}

impl EagerSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            scope: None,
        }
    }

    pub fn scoped(
        path: impl Into<String>,
        scope: impl Fn(crate::query::Query) -> crate::query::Query + Send + Sync + 'static,
    ) -> Self {
        Self {
            path: path.into(),
            scope: Some(Arc::new(scope)),
        }
    }
}

impl fmt::Debug for EagerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerSpec")
            .field("path", &self.path)
            .field("scoped", &self.scope.is_some())
            .finish()
    }
}
