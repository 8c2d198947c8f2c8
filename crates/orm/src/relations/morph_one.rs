//! One-to-one polymorphic relation

use crate::backends::{Database, SqlRow};
use crate::error::{ModelResult, RelationError};
use crate::model::{EntityDef, Record};
use crate::query::{Page, Query, ScopeFn};
use crate::relations::def::RelationDef;
use crate::relations::link::MorphLink;
use crate::relations::map::{global_morph_map, MorphMap};
use crate::relations::one_or_many::{self, OneOrMany};
use crate::relations::GroupedLoad;

/// At most one target row owned by one source row.
///
/// Same decoration and stamping as [`MorphMany`](crate::relations::MorphMany),
/// restricted to a single row: reads take the first match, batched loads
/// keep the last row seen per parent, and the bulk attach methods are
/// rejected.
#[derive(Debug)]
pub struct MorphOne<'a> {
    core: OneOrMany<'a>,
}

impl<'a> MorphOne<'a> {
    /// Ad-hoc accessor from a determiner, token resolved process-wide
    pub fn new(parent: &'a mut Record, target: &'static EntityDef, determiner: &str) -> Self {
        Self::with_map(parent, target, determiner, global_morph_map())
    }

    /// Ad-hoc accessor resolving the source token through `map`
    pub fn with_map(
        parent: &'a mut Record,
        target: &'static EntityDef,
        determiner: &str,
        map: &MorphMap,
    ) -> Self {
        let link = MorphLink::from_determiner(parent.def(), determiner, map);
        let label = format!("MorphOne({}.{})", parent.def().name, determiner);
        Self {
            core: OneOrMany::new(parent, target, link, label),
        }
    }

    pub(crate) fn declared(
        parent: &'a mut Record,
        relation: &RelationDef,
        target: &'static EntityDef,
        map: &MorphMap,
    ) -> Self {
        let link = MorphLink::for_relation(relation, parent.def(), map);
        let label = format!("MorphOne({}.{})", parent.def().name, relation.name);
        Self {
            core: OneOrMany::new(parent, target, link, label),
        }
    }

    pub fn link(&self) -> &MorphLink {
        &self.core.link
    }

    /// Target query constrained to this parent
    pub fn query(&self) -> Query {
        self.core.related_query()
    }

    /// The related row, if any
    pub async fn fetch(&self, db: &dyn Database) -> ModelResult<Option<Record>> {
        self.first(db).await
    }

    pub async fn first(&self, db: &dyn Database) -> ModelResult<Option<Record>> {
        if self.core.parent_identity().is_none() {
            return Ok(None);
        }
        self.query().first(db).await
    }

    /// Attach and persist the target row
    pub async fn save(&mut self, db: &dyn Database, target: &mut Record) -> ModelResult<()> {
        self.core.save(db, target).await
    }

    /// Build a target row from a payload, attach and persist it
    pub async fn create(&mut self, db: &dyn Database, payload: SqlRow) -> ModelResult<Record> {
        self.core.create(db, payload).await
    }

    /// Not meaningful for a single-row relation
    pub async fn save_many(
        &mut self,
        _db: &dyn Database,
        _targets: &mut [Record],
    ) -> ModelResult<()> {
        Err(RelationError::unsupported(&self.core.label, "save_many").into())
    }

    /// Not meaningful for a single-row relation
    pub async fn create_many(
        &mut self,
        _db: &dyn Database,
        _payloads: Vec<SqlRow>,
    ) -> ModelResult<Vec<Record>> {
        Err(RelationError::unsupported(&self.core.label, "create_many").into())
    }

    /// Not meaningful for a single-row relation
    pub async fn paginate(
        &self,
        _db: &dyn Database,
        _page: i64,
        _per_page: i64,
    ) -> ModelResult<Page> {
        Err(RelationError::unsupported(&self.core.label, "paginate").into())
    }

    /// Update the related row in place
    pub async fn update(&mut self, db: &dyn Database, payload: SqlRow) -> ModelResult<u64> {
        self.core.update(db, payload).await
    }

    /// Delete the related row
    pub async fn delete(&mut self, db: &dyn Database) -> ModelResult<u64> {
        self.core.delete(db).await
    }
}

/// Batched load: one query for all parents, the last row seen per parent
pub(crate) async fn load_grouped(
    db: &dyn Database,
    target: &'static EntityDef,
    link: &MorphLink,
    parents: &[&Record],
    scope: Option<&ScopeFn>,
) -> ModelResult<GroupedLoad> {
    one_or_many::load_grouped(db, target, link, parents, scope, true).await
}
