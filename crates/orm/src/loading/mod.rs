//! Batched relation loading
//!
//! Resolves the eager specs accumulated on queries into attached records.

pub mod eager;

pub use eager::EagerLoader;
