//! One-to-many polymorphic relation

use crate::backends::{Database, SqlRow};
use crate::error::ModelResult;
use crate::model::{EntityDef, Record};
use crate::query::{Page, Query, ScopeFn};
use crate::relations::def::RelationDef;
use crate::relations::link::MorphLink;
use crate::relations::map::{global_morph_map, MorphMap};
use crate::relations::one_or_many::{self, OneOrMany};
use crate::relations::GroupedLoad;

/// Zero-or-more target rows owned by one source row.
///
/// Reads filter on the frozen `(foreign_key, type_key)` pair; writes
/// stamp the same pair, cascading a save of the parent when it has never
/// been persisted.
#[derive(Debug)]
pub struct MorphMany<'a> {
    core: OneOrMany<'a>,
}

impl<'a> MorphMany<'a> {
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
        let label = format!("MorphMany({}.{})", parent.def().name, determiner);
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
        let label = format!("MorphMany({}.{})", parent.def().name, relation.name);
        Self {
            core: OneOrMany::new(parent, target, link, label),
        }
    }

    /// The descriptor frozen at construction
    pub fn link(&self) -> &MorphLink {
        &self.core.link
    }

    /// Target query constrained to this parent
    pub fn query(&self) -> Query {
        self.core.related_query()
    }

    /// All related rows; empty when the parent has no identity yet
    pub async fn fetch(&self, db: &dyn Database) -> ModelResult<Vec<Record>> {
        if self.core.parent_identity().is_none() {
            return Ok(Vec::new());
        }
        self.query().fetch(db).await
    }

    /// Like [`fetch`](Self::fetch), with extra constraints on the query
    pub async fn fetch_scoped(
        &self,
        db: &dyn Database,
        scope: impl FnOnce(Query) -> Query,
    ) -> ModelResult<Vec<Record>> {
        if self.core.parent_identity().is_none() {
            return Ok(Vec::new());
        }
        scope(self.query()).fetch(db).await
    }

    pub async fn first(&self, db: &dyn Database) -> ModelResult<Option<Record>> {
        if self.core.parent_identity().is_none() {
            return Ok(None);
        }
        self.query().first(db).await
    }

    /// Like [`first`](Self::first), with extra constraints on the query
    pub async fn first_scoped(
        &self,
        db: &dyn Database,
        scope: impl FnOnce(Query) -> Query,
    ) -> ModelResult<Option<Record>> {
        if self.core.parent_identity().is_none() {
            return Ok(None);
        }
        scope(self.query()).first(db).await
    }

    pub async fn paginate(
        &self,
        db: &dyn Database,
        page: i64,
        per_page: i64,
    ) -> ModelResult<Page> {
        self.query().paginate(db, page, per_page).await
    }

    /// Attach and persist one target row
    pub async fn save(&mut self, db: &dyn Database, target: &mut Record) -> ModelResult<()> {
        self.core.save(db, target).await
    }

    /// Build a target row from a payload, attach and persist it
    pub async fn create(&mut self, db: &dyn Database, payload: SqlRow) -> ModelResult<Record> {
        self.core.create(db, payload).await
    }

    pub async fn save_many(
        &mut self,
        db: &dyn Database,
        targets: &mut [Record],
    ) -> ModelResult<()> {
        self.core.save_many(db, targets).await
    }

    pub async fn create_many(
        &mut self,
        db: &dyn Database,
        payloads: Vec<SqlRow>,
    ) -> ModelResult<Vec<Record>> {
        self.core.create_many(db, payloads).await
    }

    /// Bulk-update every related row
    pub async fn update(&mut self, db: &dyn Database, payload: SqlRow) -> ModelResult<u64> {
        self.core.update(db, payload).await
    }

    /// Bulk-delete every related row
    pub async fn delete(&mut self, db: &dyn Database) -> ModelResult<u64> {
        self.core.delete(db).await
    }
}

/// Batched load: one query for all parents, one collection per parent
pub(crate) async fn load_grouped(
    db: &dyn Database,
    target: &'static EntityDef,
    link: &MorphLink,
    parents: &[&Record],
    scope: Option<&ScopeFn>,
) -> ModelResult<GroupedLoad> {
    one_or_many::load_grouped(db, target, link, parents, scope, false).await
}
