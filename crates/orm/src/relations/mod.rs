//! Polymorphic relations
//!
//! Three relation shapes over a `(<determiner>_id, <determiner>_type)`
//! column pair: [`MorphMany`] and [`MorphOne`] point from a source row at
//! rows in one fixed target table, [`MorphTo`] is their inverse and
//! resolves the owning table per row through a [`MorphMap`] of
//! discriminator tokens.

pub(crate) mod decorate;
pub mod def;
mod filter;
pub mod link;
pub mod map;
pub mod morph_many;
pub mod morph_one;
pub mod morph_to;
pub mod morphable;
pub(crate) mod one_or_many;

pub use def::{MorphKind, RelationDef, Target};
pub use link::{morph_columns, MorphLink, OwnerLink};
pub use map::{global_morph_map, MorphMap};
pub use morph_many::MorphMany;
pub use morph_one::MorphOne;
pub use morph_to::MorphTo;
pub use morphable::Morphable;

use serde_json::Value;

use crate::model::Related;

/// Result of one batched relation load.
///
/// `entries` pairs a parent identity with the value to attach; parents
/// absent from `entries` receive a clone of `default`, so no parent is
/// ever left without the relation set.
#[derive(Debug, Clone)]
pub struct GroupedLoad {
    /// Parent attribute the identities match against
    pub key: String,
    /// Parent identity paired with its resolved value
    pub entries: Vec<(Value, Related)>,
    /// Attached to parents that matched nothing
    pub default: Related,
}
