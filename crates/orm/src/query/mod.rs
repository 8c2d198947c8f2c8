//! Query builder module

pub mod builder;
pub mod execution;
pub mod sql;
pub mod types;

pub use builder::Query;
pub use execution::Page;
pub use types::{Conjunction, EagerSpec, OrderDirection, QueryOperator, ScopeFn, WhereCondition};
