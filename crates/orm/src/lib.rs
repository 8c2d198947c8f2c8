//! # chimera-orm: Polymorphic Relations Engine
//!
//! Morph-style relations over dynamic records: one-to-many and one-to-one
//! relations whose foreign-key and discriminator columns derive from a
//! determiner, the inverse per-row owner lookup, a discriminator token
//! registry, batched eager loading of dotted relation paths, and
//! relation-aware query filtering (`has`, `with_count`).
//!
//! Records are schemaless JSON attribute maps described by `static`
//! [`EntityDef`]s; everything executes through the [`Database`] trait so
//! the whole engine runs unchanged against Postgres or the in-memory
//! test double.

pub mod backends;
pub mod error;
pub mod loading;
pub mod model;
pub mod query;
pub mod relations;

// Re-export core traits and types
pub use backends::*;
pub use error::*;
pub use loading::*;
pub use model::*;
pub use query::*;
pub use relations::*;
