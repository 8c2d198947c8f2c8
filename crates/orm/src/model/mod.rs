//! Entity definitions, dynamic records, and persistence
//!
//! - `entity`: const-constructible entity definitions and the dynamic
//!   attribute-map record they describe
//! - `persistence`: insert/update/delete/find against the database trait

pub mod entity;
pub mod persistence;

pub use entity::{EntityDef, Record, Related};
