//! Frozen relation descriptors
//!
//! Key names and the discriminator token are computed once when a
//! relation accessor is constructed and never change afterwards. No I/O
//! happens here.

use crate::error::RelationError;
use crate::model::EntityDef;
use crate::relations::def::RelationDef;
use crate::relations::map::MorphMap;

/// Column names derived from a determiner:
/// `"commentable"` yields `("commentable_id", "commentable_type")`.
pub fn morph_columns(determiner: &str) -> (String, String) {
    (format!("{}_id", determiner), format!("{}_type", determiner))
}

/// Descriptor for the outgoing relations (morph-one, morph-many).
///
/// `type_value` is the source's registered token, resolved at
/// construction; it is both stamped on save and filtered by on read.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphLink {
    /// Identity column read from the source row
    pub local_key: String,
    /// Foreign-key column on the target table
    pub foreign_key: String,
    /// Discriminator column on the target table
    pub type_key: String,
    /// Discriminator token for the source type
    pub type_value: String,
}

impl MorphLink {
    /// Resolve a declared relation against its source definition
    pub fn for_relation(
        relation: &RelationDef,
        source: &'static EntityDef,
        map: &MorphMap,
    ) -> Self {
        let (foreign_key, type_key) = morph_columns(relation.determiner);
        Self {
            local_key: relation
                .local_key
                .unwrap_or(source.primary_key)
                .to_string(),
            foreign_key: match relation.foreign_key {
                Some(key) => key.to_string(),
                None => foreign_key,
            },
            type_key: match relation.type_key {
                Some(key) => key.to_string(),
                None => type_key,
            },
            type_value: map.token_or_table(source),
        }
    }

    /// Resolve an ad-hoc relation from a determiner alone
    pub fn from_determiner(source: &'static EntityDef, determiner: &str, map: &MorphMap) -> Self {
        let (foreign_key, type_key) = morph_columns(determiner);
        Self {
            local_key: source.primary_key.to_string(),
            foreign_key,
            type_key,
            type_value: map.token_or_table(source),
        }
    }
}

/// Descriptor for the inverse relation (morph-to).
///
/// The owning type is read per row, so there is no fixed token; the
/// candidate list and the registry travel with the link instead.
#[derive(Clone)]
pub struct OwnerLink {
    /// Foreign-key column on the source row
    pub foreign_key: String,
    /// Discriminator column on the source row
    pub type_key: String,
    /// Key looked up on the owner table; `None` means its primary key
    pub owner_key: Option<String>,
    /// Legal owner types for this relation
    pub candidates: &'static [&'static EntityDef],
    /// Registry used to resolve tokens read from rows
    pub map: MorphMap,
}

impl OwnerLink {
    /// Resolve a declared inverse relation
    pub fn for_relation(relation: &RelationDef, map: &MorphMap) -> Self {
        let (foreign_key, type_key) = morph_columns(relation.determiner);
        Self {
            foreign_key: match relation.foreign_key {
                Some(key) => key.to_string(),
                None => foreign_key,
            },
            type_key: match relation.type_key {
                Some(key) => key.to_string(),
                None => type_key,
            },
            owner_key: relation.local_key.map(str::to_string),
            candidates: relation.candidates(),
            map: map.clone(),
        }
    }

    /// Resolve an ad-hoc inverse relation from a determiner alone
    pub fn from_determiner(
        candidates: &'static [&'static EntityDef],
        determiner: &str,
        map: &MorphMap,
    ) -> Self {
        let (foreign_key, type_key) = morph_columns(determiner);
        Self {
            foreign_key,
            type_key,
            owner_key: None,
            candidates,
            map: map.clone(),
        }
    }

    /// The key to look up on an owner table
    pub fn owner_key_for(&self, target: &'static EntityDef) -> String {
        match &self.owner_key {
            Some(key) => key.clone(),
            None => target.primary_key.to_string(),
        }
    }

    /// Resolve a discriminator token read from a row to a candidate.
    ///
    /// Registry bindings win; an unregistered candidate still matches by
    /// table name, mirroring the stamping fallback.
    pub fn resolve_target(&self, token: &str) -> Result<&'static EntityDef, RelationError> {
        if let Some(def) = self.map.resolve(token) {
            if self.candidates.iter().any(|candidate| candidate.same(def)) {
                return Ok(def);
            }
        }
        self.candidates
            .iter()
            .copied()
            .find(|candidate| candidate.table == token)
            .ok_or_else(|| RelationError::UnknownMorphType {
                column: self.type_key.clone(),
                token: token.to_string(),
            })
    }

    /// The token to stamp for a candidate definition
    pub fn token_for(&self, def: &'static EntityDef) -> String {
        self.map.token_or_table(def)
    }

    /// Human-readable candidate list for mismatch errors
    pub fn expected(&self) -> String {
        let names: Vec<&str> = self.candidates.iter().map(|def| def.name).collect();
        names.join(" | ")
    }
}

impl std::fmt::Debug for OwnerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerLink")
            .field("foreign_key", &self.foreign_key)
            .field("type_key", &self.type_key)
            .field("owner_key", &self.owner_key)
            .field("candidates", &self.expected())
            .finish()
    }
}
