//! Entity definitions and dynamic records
//!
//! An [`EntityDef`] is a const-constructible description of one table:
//! name, primary key, and declared relations. A [`Record`] is one row of
//! such an entity: a JSON attribute map plus persistence state and any
//! eager-loaded relation values.

use std::collections::HashMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::backends::SqlRow;
use crate::relations::RelationDef;

/// Static description of one entity type.
///
/// Declared as `static` so definitions can reference each other (including
/// self-referentially) in relation declarations:
///
/// ```
/// use chimera_orm::{EntityDef, RelationDef};
///
/// static TAGS: EntityDef = EntityDef::new("Tag", "tags", "id");
/// static VIDEOS: EntityDef = EntityDef {
///     name: "Video",
///     table: "videos",
///     primary_key: "id",
///     relations: &[RelationDef::morph_many("tags", &TAGS, "taggable")],
/// };
/// ```
pub struct EntityDef {
    pub name: &'static str,
    pub table: &'static str,
    pub primary_key: &'static str,
    pub relations: &'static [RelationDef],
}

impl EntityDef {
    /// Definition with no declared relations
    pub const fn new(
        name: &'static str,
        table: &'static str,
        primary_key: &'static str,
    ) -> Self {
        Self {
            name,
            table,
            primary_key,
            relations: &[],
        }
    }

    /// Identity comparison. Definitions live in statics, so pointer
    /// equality is the definition identity.
    pub fn same(&'static self, other: &'static EntityDef) -> bool {
        std::ptr::eq(self, other)
    }

    /// Look up a declared relation by name
    pub fn relation(&'static self, name: &str) -> Option<&'static RelationDef> {
        self.relations.iter().find(|rel| rel.name == name)
    }
}

// Relation declarations may reference their own entity, so the derived
// Debug impl would recurse. Print the identifying fields only.
impl fmt::Debug for EntityDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDef")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .finish()
    }
}

/// An eager-loaded relation value attached to a record
#[derive(Debug, Clone)]
pub enum Related {
    /// Single-row relations (morph-one, morph-to)
    One(Option<Record>),
    /// Collection relations (morph-many)
    Many(Vec<Record>),
}

impl Related {
    pub fn is_empty(&self) -> bool {
        match self {
            Related::One(value) => value.is_none(),
            Related::Many(values) => values.is_empty(),
        }
    }

    pub fn as_one(&self) -> Option<&Record> {
        match self {
            Related::One(value) => value.as_ref(),
            Related::Many(values) => values.first(),
        }
    }

    pub fn as_many(&self) -> &[Record] {
        match self {
            Related::Many(values) => values,
            Related::One(_) => &[],
        }
    }

    pub fn records(&self) -> Vec<&Record> {
        match self {
            Related::One(Some(record)) => vec![record],
            Related::One(None) => Vec::new(),
            Related::Many(records) => records.iter().collect(),
        }
    }

    pub fn records_mut(&mut self) -> Vec<&mut Record> {
        match self {
            Related::One(Some(record)) => vec![record],
            Related::One(None) => Vec::new(),
            Related::Many(records) => records.iter_mut().collect(),
        }
    }
}

/// One row of an entity: attribute map, persistence state, and attached
/// relation values.
///
/// The engine never mutates attributes except to stamp foreign-key and
/// discriminator columns during association.
#[derive(Debug, Clone)]
pub struct Record {
    def: &'static EntityDef,
    attributes: SqlRow,
    related: HashMap<String, Related>,
    persisted: bool,
}

impl Record {
    /// Fresh, unpersisted record with no attributes
    pub fn new(def: &'static EntityDef) -> Self {
        Self {
            def,
            attributes: SqlRow::new(),
            related: HashMap::new(),
            persisted: false,
        }
    }

    /// Record hydrated from a fetched row; marked persisted
    pub fn hydrate(def: &'static EntityDef, row: SqlRow) -> Self {
        Self {
            def,
            attributes: row,
            related: HashMap::new(),
            persisted: true,
        }
    }

    pub fn def(&self) -> &'static EntityDef {
        self.def
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub(crate) fn mark_persisted(&mut self, persisted: bool) {
        self.persisted = persisted;
    }

    /// Raw attribute lookup; the stored value may be JSON null
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Attribute lookup treating JSON null as missing.
    ///
    /// `0`, `false` and `""` are present values; only an absent key or an
    /// explicit null counts as missing.
    pub fn present(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).filter(|value| !value.is_null())
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    /// Merge a payload into the attribute map
    pub fn fill(&mut self, payload: SqlRow) {
        self.attributes.extend(payload);
    }

    /// The primary-key value, when present and non-null
    pub fn primary_key_value(&self) -> Option<&Value> {
        self.present(self.def.primary_key)
    }

    /// Snapshot of the attribute map, for persistence
    pub fn to_fields(&self) -> SqlRow {
        self.attributes.clone()
    }

    pub(crate) fn merge_row(&mut self, row: SqlRow) {
        self.attributes.extend(row);
    }

    /// Attached relation value, if this relation has been loaded
    pub fn related(&self, name: &str) -> Option<&Related> {
        self.related.get(name)
    }

    pub fn related_mut(&mut self, name: &str) -> Option<&mut Related> {
        self.related.get_mut(name)
    }

    pub fn set_related(&mut self, name: &str, value: Related) {
        self.related.insert(name.to_string(), value);
    }
}

// Records serialize flat: attributes first, then every loaded relation
// nested under its name. Definition and persistence state stay internal.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attributes.len() + self.related.len()))?;
        for (key, value) in &self.attributes {
            map.serialize_entry(key, value)?;
        }
        for (name, related) in &self.related {
            match related {
                Related::One(value) => map.serialize_entry(name, value)?,
                Related::Many(records) => map.serialize_entry(name, records)?,
            }
        }
        map.end()
    }
}
