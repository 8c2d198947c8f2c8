//! Discriminator registry
//!
//! Maps morph type tokens to entity definitions. Relation factories take
//! a map explicitly; the process-wide [`global_morph_map`] backs the
//! convenience accessors that do not.

use std::sync::{Arc, OnceLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{ModelResult, RelationError};
use crate::model::EntityDef;

/// Token to entity-definition registry.
///
/// Cheap to clone; clones share one table. Registration is additive
/// merge: re-registering an identical binding is a no-op, rebinding a
/// token to a different definition is rejected. There is no removal.
#[derive(Clone, Default)]
pub struct MorphMap {
    entries: Arc<DashMap<String, &'static EntityDef>>,
}

impl MorphMap {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Register definitions under their table names
    pub fn register(&self, defs: &[&'static EntityDef]) -> ModelResult<()> {
        for def in defs {
            self.register_as(def.table, def)?;
        }
        Ok(())
    }

    /// Register one definition under an explicit token
    pub fn register_as(&self, token: &str, def: &'static EntityDef) -> ModelResult<()> {
        if token.is_empty() {
            return Err(RelationError::InvalidMapping(format!(
                "empty token for entity '{}'",
                def.name
            ))
            .into());
        }
        match self.entries.entry(token.to_string()) {
            Entry::Occupied(existing) => {
                let bound: &'static EntityDef = *existing.get();
                if !bound.same(def) {
                    return Err(RelationError::InvalidMapping(format!(
                        "token '{}' is already bound to '{}', cannot rebind to '{}'",
                        token, bound.name, def.name
                    ))
                    .into());
                }
            }
            Entry::Vacant(slot) => {
                tracing::debug!(token, entity = def.name, "registered morph type");
                slot.insert(def);
            }
        }
        Ok(())
    }

    /// The definition a token is bound to
    pub fn resolve(&self, token: &str) -> Option<&'static EntityDef> {
        self.entries.get(token).map(|entry| *entry.value())
    }

    /// Reverse lookup: the token a definition is registered under
    pub fn token_for(&self, def: &'static EntityDef) -> Option<String> {
        self.entries
            .iter()
            .find(|entry| entry.value().same(def))
            .map(|entry| entry.key().clone())
    }

    /// Registered token, or the table name when unregistered.
    ///
    /// The same fallback is applied when stamping and when filtering, so
    /// both sides of an association always agree on the token.
    pub fn token_or_table(&self, def: &'static EntityDef) -> String {
        self.token_for(def)
            .unwrap_or_else(|| def.table.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Process-wide registry, populated during application bootstrap
pub fn global_morph_map() -> &'static MorphMap {
    static GLOBAL: OnceLock<MorphMap> = OnceLock::new();
    GLOBAL.get_or_init(MorphMap::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;

    static VIDEOS: EntityDef = EntityDef::new("Video", "videos", "id");
    static POSTS: EntityDef = EntityDef::new("Post", "posts", "id");

    #[test]
    fn merge_registration_is_idempotent() {
        let map = MorphMap::new();
        map.register(&[&VIDEOS, &POSTS]).unwrap();
        map.register(&[&VIDEOS, &POSTS]).unwrap();

        assert_eq!(map.len(), 2);
        assert!(map.resolve("videos").unwrap().same(&VIDEOS));
        assert_eq!(map.token_for(&POSTS).as_deref(), Some("posts"));
    }

    #[test]
    fn rebinding_a_token_is_rejected() {
        let map = MorphMap::new();
        map.register_as("media", &VIDEOS).unwrap();

        let err = map.register_as("media", &POSTS).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Relation(RelationError::InvalidMapping(_))
        ));
        // The original binding survives
        assert!(map.resolve("media").unwrap().same(&VIDEOS));
    }

    #[test]
    fn empty_tokens_are_rejected() {
        let map = MorphMap::new();
        let err = map.register_as("", &VIDEOS).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Relation(RelationError::InvalidMapping(_))
        ));
    }

    #[test]
    fn unregistered_definitions_fall_back_to_table_names() {
        let map = MorphMap::new();
        map.register_as("clips", &VIDEOS).unwrap();

        assert_eq!(map.token_or_table(&VIDEOS), "clips");
        assert_eq!(map.token_or_table(&POSTS), "posts");
        assert_eq!(map.token_for(&POSTS), None);
        assert!(map.resolve("posts").is_none());
    }

    #[test]
    fn clones_share_the_same_table() {
        let map = MorphMap::new();
        let view = map.clone();
        map.register_as("videos", &VIDEOS).unwrap();
        assert!(view.resolve("videos").unwrap().same(&VIDEOS));
    }
}
