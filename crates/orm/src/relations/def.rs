//! Relation declarations
//!
//! A [`RelationDef`] describes one polymorphic relation on an entity
//! definition. Declarations are const-constructible so they can live in
//! the `relations` slice of a `static` [`EntityDef`].

use std::fmt;

use crate::model::EntityDef;

/// Shape of a polymorphic relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphKind {
    /// Source owns at most one target row
    One,
    /// Source owns zero or more target rows
    Many,
    /// Inverse: the source row points at its owner
    To,
}

impl fmt::Display for MorphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MorphKind::One => write!(f, "morph-one"),
            MorphKind::Many => write!(f, "morph-many"),
            MorphKind::To => write!(f, "morph-to"),
        }
    }
}

/// Declared target side of a relation
#[derive(Debug, Clone, Copy)]
pub enum Target {
    /// Fixed target entity (morph-one, morph-many)
    Fixed(&'static EntityDef),
    /// Candidate owner entities, resolved per row (morph-to)
    Candidates(&'static [&'static EntityDef]),
}

/// One declared relation.
///
/// Key columns default from the determiner: `"commentable"` yields
/// `commentable_id` and `commentable_type`. The `with_*` builders
/// override individual names.
#[derive(Debug, Clone, Copy)]
pub struct RelationDef {
    pub name: &'static str,
    pub kind: MorphKind,
    pub determiner: &'static str,
    pub target: Target,
    /// Key read from the side holding the identity: the source's primary
    /// key for outgoing relations, the owner's for morph-to
    pub local_key: Option<&'static str>,
    pub foreign_key: Option<&'static str>,
    pub type_key: Option<&'static str>,
}

impl RelationDef {
    /// One-to-many polymorphic relation
    pub const fn morph_many(
        name: &'static str,
        target: &'static EntityDef,
        determiner: &'static str,
    ) -> Self {
        Self {
            name,
            kind: MorphKind::Many,
            determiner,
            target: Target::Fixed(target),
            local_key: None,
            foreign_key: None,
            type_key: None,
        }
    }

    /// One-to-one polymorphic relation
    pub const fn morph_one(
        name: &'static str,
        target: &'static EntityDef,
        determiner: &'static str,
    ) -> Self {
        Self {
            name,
            kind: MorphKind::One,
            determiner,
            target: Target::Fixed(target),
            local_key: None,
            foreign_key: None,
            type_key: None,
        }
    }

    /// Inverse polymorphic relation over a candidate owner list
    pub const fn morph_to(
        name: &'static str,
        candidates: &'static [&'static EntityDef],
        determiner: &'static str,
    ) -> Self {
        Self {
            name,
            kind: MorphKind::To,
            determiner,
            target: Target::Candidates(candidates),
            local_key: None,
            foreign_key: None,
            type_key: None,
        }
    }

    pub const fn with_local_key(mut self, key: &'static str) -> Self {
        self.local_key = Some(key);
        self
    }

    pub const fn with_foreign_key(mut self, key: &'static str) -> Self {
        self.foreign_key = Some(key);
        self
    }

    pub const fn with_type_key(mut self, key: &'static str) -> Self {
        self.type_key = Some(key);
        self
    }

    /// The fixed target of an outgoing relation
    pub fn fixed_target(&self) -> Option<&'static EntityDef> {
        match self.target {
            Target::Fixed(def) => Some(def),
            Target::Candidates(_) => None,
        }
    }

    /// The candidate owners of an inverse relation
    pub fn candidates(&self) -> &'static [&'static EntityDef] {
        match self.target {
            Target::Candidates(defs) => defs,
            Target::Fixed(_) => &[],
        }
    }
}
