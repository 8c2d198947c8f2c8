//! Shared core of the outgoing relations
//!
//! [`MorphMany`](crate::relations::MorphMany) and
//! [`MorphOne`](crate::relations::MorphOne) differ only in cardinality;
//! the query decoration, stamping cascade, and batched loading live here.

use serde_json::Value;

use crate::backends::{Database, SqlRow};
use crate::error::{ModelError, ModelResult, RelationError};
use crate::model::{EntityDef, Record, Related};
use crate::query::{Query, ScopeFn};
use crate::relations::decorate;
use crate::relations::link::MorphLink;
use crate::relations::GroupedLoad;

#[derive(Debug)]
pub(crate) struct OneOrMany<'a> {
    pub(crate) parent: &'a mut Record,
    pub(crate) target: &'static EntityDef,
    pub(crate) link: MorphLink,
    pub(crate) label: String,
}

impl<'a> OneOrMany<'a> {
    pub(crate) fn new(
        parent: &'a mut Record,
        target: &'static EntityDef,
        link: MorphLink,
        label: String,
    ) -> Self {
        Self {
            parent,
            target,
            link,
            label,
        }
    }

    /// The identity this relation hangs off, when the parent has one
    pub(crate) fn parent_identity(&self) -> Option<Value> {
        self.parent.present(&self.link.local_key).cloned()
    }

    /// Target query constrained to this parent
    pub(crate) fn related_query(&self) -> Query {
        decorate::constrain_to_parent(Query::for_entity(self.target), &self.link, self.parent)
    }

    /// Stamp the key pair onto `target` and persist it, saving the parent
    /// first when it has never been persisted
    pub(crate) async fn save(&mut self, db: &dyn Database, target: &mut Record) -> ModelResult<()> {
        if !target.def().same(self.target) {
            return Err(RelationError::Mismatch {
                relation: self.label.clone(),
                expected: self.target.name.to_string(),
            }
            .into());
        }
        if !self.parent.is_persisted() {
            self.parent.save(db).await?;
        }
        let identity = self
            .parent_identity()
            .ok_or(ModelError::MissingPrimaryKey)?;
        warn_on_falsy_key(&self.label, &self.link.foreign_key, &identity);

        target.set(&self.link.foreign_key, identity);
        target.set(&self.link.type_key, self.link.type_value.as_str());
        target.save(db).await
    }

    pub(crate) async fn create(
        &mut self,
        db: &dyn Database,
        payload: SqlRow,
    ) -> ModelResult<Record> {
        let mut record = Record::new(self.target);
        record.fill(payload);
        self.save(db, &mut record).await?;
        Ok(record)
    }

    /// Sequential, so serial keys are handed out in argument order
    pub(crate) async fn save_many(
        &mut self,
        db: &dyn Database,
        targets: &mut [Record],
    ) -> ModelResult<()> {
        for target in targets.iter_mut() {
            self.save(db, target).await?;
        }
        Ok(())
    }

    pub(crate) async fn create_many(
        &mut self,
        db: &dyn Database,
        payloads: Vec<SqlRow>,
    ) -> ModelResult<Vec<Record>> {
        let mut records = Vec::with_capacity(payloads.len());
        for payload in payloads {
            records.push(self.create(db, payload).await?);
        }
        Ok(records)
    }

    pub(crate) async fn update(&mut self, db: &dyn Database, payload: SqlRow) -> ModelResult<u64> {
        self.related_query().update(db, payload).await
    }

    pub(crate) async fn delete(&mut self, db: &dyn Database) -> ModelResult<u64> {
        self.related_query().delete(db).await
    }
}

/// `0`, `""` and `false` are legitimate keys, so a falsy stamp proceeds
/// and only leaves a warning behind.
pub(crate) fn warn_on_falsy_key(relation: &str, column: &str, value: &Value) {
    let falsy = match value {
        Value::Bool(flag) => !*flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Null => true,
        _ => false,
    };
    if falsy {
        tracing::warn!(relation, column, %value, "stamping a falsy foreign key");
    }
}

/// One batched query for a set of parents, grouped by the foreign-key
/// value each returned row points back with.
///
/// With `single` set, a later row for an already-seen parent replaces the
/// earlier one; the overwrite is logged, not an error.
pub(crate) async fn load_grouped(
    db: &dyn Database,
    target: &'static EntityDef,
    link: &MorphLink,
    parents: &[&Record],
    scope: Option<&ScopeFn>,
    single: bool,
) -> ModelResult<GroupedLoad> {
    let default = if single {
        Related::One(None)
    } else {
        Related::Many(Vec::new())
    };

    let mut identities: Vec<Value> = Vec::new();
    for parent in parents {
        if let Some(identity) = parent.present(&link.local_key) {
            if !identities.contains(identity) {
                identities.push(identity.clone());
            }
        }
    }
    if identities.is_empty() {
        return Ok(GroupedLoad {
            key: link.local_key.clone(),
            entries: Vec::new(),
            default,
        });
    }

    let mut query = decorate::constrain_to_parents(Query::for_entity(target), link, identities);
    if let Some(scope) = scope {
        query = scope(query);
    }
    let rows = query.fetch(db).await?;

    let mut entries: Vec<(Value, Related)> = Vec::new();
    for row in rows {
        let Some(identity) = row.present(&link.foreign_key).cloned() else {
            continue;
        };
        let position = entries.iter().position(|(seen, _)| *seen == identity);
        match (single, position) {
            (false, Some(at)) => {
                if let Related::Many(records) = &mut entries[at].1 {
                    records.push(row);
                }
            }
            (false, None) => entries.push((identity, Related::Many(vec![row]))),
            (true, Some(at)) => {
                tracing::warn!(
                    target_entity = target.name,
                    identity = %identity,
                    "multiple rows share one parent in a single-row relation, keeping the last"
                );
                entries[at].1 = Related::One(Some(row));
            }
            (true, None) => entries.push((identity, Related::One(Some(row)))),
        }
    }

    Ok(GroupedLoad {
        key: link.local_key.clone(),
        entries,
        default,
    })
}
