//! Inverse polymorphic relation
//!
//! The owning type is not fixed at construction: each source row carries
//! a discriminator token naming the table its foreign key points into.
//! Reads resolve the token through the relation's [`OwnerLink`]; batched
//! loads split parents per token, one query per distinct owner table.

use std::collections::HashMap;

use futures::future::join_all;
use serde_json::Value;

use crate::backends::{Database, SqlRow};
use crate::error::{ModelError, ModelResult, RelationError};
use crate::model::{EntityDef, Record, Related};
use crate::query::{Page, Query, ScopeFn};
use crate::relations::def::RelationDef;
use crate::relations::link::OwnerLink;
use crate::relations::map::{global_morph_map, MorphMap};
use crate::relations::one_or_many::warn_on_falsy_key;
use crate::relations::GroupedLoad;

/// The owner side of a polymorphic pointer.
///
/// This relation does not own the target rows, so the attach-style
/// mutations (`save`, `create` and friends) are rejected; association is
/// expressed by stamping the pointer pair onto the source row instead.
#[derive(Debug)]
pub struct MorphTo<'a> {
    parent: &'a mut Record,
    link: OwnerLink,
    label: String,
}

impl<'a> MorphTo<'a> {
    /// Ad-hoc accessor from a determiner, tokens resolved process-wide
    pub fn new(
        parent: &'a mut Record,
        candidates: &'static [&'static EntityDef],
        determiner: &str,
    ) -> Self {
        Self::with_map(parent, candidates, determiner, global_morph_map())
    }

    /// Ad-hoc accessor resolving tokens through `map`
    pub fn with_map(
        parent: &'a mut Record,
        candidates: &'static [&'static EntityDef],
        determiner: &str,
        map: &MorphMap,
    ) -> Self {
        let link = OwnerLink::from_determiner(candidates, determiner, map);
        let label = format!("MorphTo({}.{})", parent.def().name, determiner);
        Self {
            parent,
            link,
            label,
        }
    }

    pub(crate) fn declared(parent: &'a mut Record, relation: &RelationDef, map: &MorphMap) -> Self {
        let link = OwnerLink::for_relation(relation, map);
        let label = format!("MorphTo({}.{})", parent.def().name, relation.name);
        Self {
            parent,
            link,
            label,
        }
    }

    pub fn link(&self) -> &OwnerLink {
        &self.link
    }

    /// The owning row, or `None` without a query when either pointer
    /// column is absent
    pub async fn fetch(&self, db: &dyn Database) -> ModelResult<Option<Record>> {
        self.first(db).await
    }

    pub async fn first(&self, db: &dyn Database) -> ModelResult<Option<Record>> {
        let Some((token, foreign)) = self.pointer() else {
            return Ok(None);
        };
        let target = self.link.resolve_target(&token)?;
        let owner_key = self.link.owner_key_for(target);
        Query::for_entity(target)
            .where_eq(&owner_key, foreign)
            .first(db)
            .await
    }

    /// Point the source row at `target` and persist the source, saving
    /// the target first when it has never been persisted
    pub async fn associate(&mut self, db: &dyn Database, target: &mut Record) -> ModelResult<()> {
        let candidate = self
            .link
            .candidates
            .iter()
            .copied()
            .find(|candidate| candidate.same(target.def()));
        let Some(candidate) = candidate else {
            return Err(RelationError::Mismatch {
                relation: self.label.clone(),
                expected: self.link.expected(),
            }
            .into());
        };

        if !target.is_persisted() {
            target.save(db).await?;
        }
        let owner_key = self.link.owner_key_for(candidate);
        let identity = target
            .present(&owner_key)
            .cloned()
            .ok_or(ModelError::MissingPrimaryKey)?;
        warn_on_falsy_key(&self.label, &self.link.foreign_key, &identity);

        let token = self.link.token_for(candidate);
        self.parent.set(&self.link.foreign_key, identity);
        self.parent.set(&self.link.type_key, token.as_str());
        self.parent.save(db).await
    }

    /// Null out the pointer pair and persist the source
    pub async fn dissociate(&mut self, db: &dyn Database) -> ModelResult<()> {
        if !self.parent.is_persisted() {
            return Err(RelationError::UnsavedModel {
                relation: self.label.clone(),
                operation: "dissociate".to_string(),
            }
            .into());
        }
        self.parent.set(&self.link.foreign_key, Value::Null);
        self.parent.set(&self.link.type_key, Value::Null);
        self.parent.save(db).await
    }

    /// This relation does not own the target rows
    pub async fn save(&mut self, _db: &dyn Database, _target: &mut Record) -> ModelResult<()> {
        Err(RelationError::unsupported(&self.label, "save").into())
    }

    /// This relation does not own the target rows
    pub async fn create(&mut self, _db: &dyn Database, _payload: SqlRow) -> ModelResult<Record> {
        Err(RelationError::unsupported(&self.label, "create").into())
    }

    /// This relation does not own the target rows
    pub async fn save_many(
        &mut self,
        _db: &dyn Database,
        _targets: &mut [Record],
    ) -> ModelResult<()> {
        Err(RelationError::unsupported(&self.label, "save_many").into())
    }

    /// This relation does not own the target rows
    pub async fn create_many(
        &mut self,
        _db: &dyn Database,
        _payloads: Vec<SqlRow>,
    ) -> ModelResult<Vec<Record>> {
        Err(RelationError::unsupported(&self.label, "create_many").into())
    }

    /// This relation does not own the target rows
    pub async fn delete(&mut self, _db: &dyn Database) -> ModelResult<u64> {
        Err(RelationError::unsupported(&self.label, "delete").into())
    }

    /// At most one owner exists; there is nothing to page
    pub async fn paginate(
        &self,
        _db: &dyn Database,
        _page: i64,
        _per_page: i64,
    ) -> ModelResult<Page> {
        Err(RelationError::unsupported(&self.label, "paginate").into())
    }

    /// The pointer pair, when both columns are present
    fn pointer(&self) -> Option<(String, Value)> {
        let token = read_token(self.parent, &self.link.type_key)?;
        let foreign = self.parent.present(&self.link.foreign_key)?.clone();
        Some((token, foreign))
    }
}

fn read_token(record: &Record, type_key: &str) -> Option<String> {
    let value = record.present(type_key)?;
    Some(match value.as_str() {
        Some(text) => text.to_string(),
        // Keep non-string tokens readable so resolution errors name them
        None => value.to_string(),
    })
}

/// Batched load: parents split per discriminator token, one query per
/// distinct owner table, the merged result keyed by each parent's own
/// primary key so the generic attach step stays type-agnostic.
pub(crate) async fn load_grouped(
    db: &dyn Database,
    link: &OwnerLink,
    parent_def: &'static EntityDef,
    parents: &[&Record],
    scope: Option<&ScopeFn>,
) -> ModelResult<GroupedLoad> {
    let parent_key = parent_def.primary_key.to_string();

    struct Group<'p> {
        token: String,
        members: Vec<(&'p Record, Value)>,
    }

    // Group parents by token in first-seen order; parents with an absent
    // pointer stay out of every group and keep the default at attach time
    let mut groups: Vec<Group> = Vec::new();
    for parent in parents {
        let Some(token) = read_token(parent, &link.type_key) else {
            continue;
        };
        let Some(foreign) = parent.present(&link.foreign_key) else {
            continue;
        };
        match groups.iter_mut().find(|group| group.token == token) {
            Some(group) => group.members.push((parent, foreign.clone())),
            None => groups.push(Group {
                token,
                members: vec![(parent, foreign.clone())],
            }),
        }
    }

    // One query per token, dispatched together
    let mut lookups = Vec::with_capacity(groups.len());
    for group in &groups {
        let target = link.resolve_target(&group.token)?;
        let owner_key = link.owner_key_for(target);
        let mut keys: Vec<Value> = Vec::new();
        for (_, foreign) in &group.members {
            if !keys.contains(foreign) {
                keys.push(foreign.clone());
            }
        }
        lookups.push(async move {
            let mut query = Query::for_entity(target).where_in(&owner_key, keys);
            if let Some(scope) = scope {
                query = scope(query);
            }
            let rows = query.fetch(db).await?;
            Ok::<_, ModelError>((owner_key, rows))
        });
    }
    let outcomes = join_all(lookups).await;

    let mut entries: Vec<(Value, Related)> = Vec::new();
    for (group, outcome) in groups.iter().zip(outcomes) {
        let (owner_key, rows) = outcome?;
        let mut owners: HashMap<String, Record> = HashMap::with_capacity(rows.len());
        for row in rows {
            let Some(identity) = row.present(&owner_key).map(Value::to_string) else {
                continue;
            };
            owners.insert(identity, row);
        }
        for (parent, foreign) in &group.members {
            let Some(owner) = owners.get(&foreign.to_string()) else {
                continue;
            };
            let Some(identity) = parent.present(&parent_key) else {
                continue;
            };
            entries.push((identity.clone(), Related::One(Some(owner.clone()))));
        }
    }

    Ok(GroupedLoad {
        key: parent_key,
        entries,
        default: Related::One(None),
    })
}
