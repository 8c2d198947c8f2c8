//! Database backends
//!
//! The [`Database`](core::Database) trait is the only execution surface the
//! engine touches. `postgres` provides the production implementation,
//! `memory` the recording double used throughout the test suites.

pub mod core;
pub mod memory;
pub mod postgres;

pub use core::{Database, SqlRow};
pub use memory::{MemoryDatabase, Statement};
pub use postgres::{DatabaseConfig, PoolError, PostgresDatabase};
