//! Batched eager loading
//!
//! Resolves dotted relation paths level by level. Each level groups its
//! parents by entity definition, issues one batched query per declared
//! relation per group (all groups of a level dispatched together), and
//! attaches the grouped results before recursing into the freshly loaded
//! rows for the next path segment. A scope travels with its own (deepest)
//! segment and never leaks into intermediate levels.

use std::collections::HashMap;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;

use crate::backends::Database;
use crate::error::{ModelError, ModelResult, RelationError};
use crate::model::{EntityDef, Record, Related};
use crate::query::{EagerSpec, ScopeFn};
use crate::relations::def::MorphKind;
use crate::relations::link::{MorphLink, OwnerLink};
use crate::relations::map::{global_morph_map, MorphMap};
use crate::relations::{morph_to, one_or_many};

/// Executes the eager specs accumulated on a query
pub struct EagerLoader<'d> {
    db: &'d dyn Database,
    map: MorphMap,
}

/// One resolved relation lookup, validated before dispatch
enum Plan {
    Outgoing {
        target: &'static EntityDef,
        link: MorphLink,
        single: bool,
    },
    Inverse {
        link: OwnerLink,
    },
}

/// One path segment shared by every spec naming it
struct Level {
    name: String,
    scope: Option<ScopeFn>,
    children: Vec<EagerSpec>,
}

impl<'d> EagerLoader<'d> {
    /// Loader resolving discriminators through the process-wide morph map
    pub fn new(db: &'d dyn Database) -> Self {
        Self {
            db,
            map: global_morph_map().clone(),
        }
    }

    pub fn with_map(db: &'d dyn Database, map: &MorphMap) -> Self {
        Self {
            db,
            map: map.clone(),
        }
    }

    /// Attach every requested relation to `records`, batching one query
    /// per relation per distinct parent definition
    pub async fn load(&self, records: &mut [Record], specs: &[EagerSpec]) -> ModelResult<()> {
        if records.is_empty() || specs.is_empty() {
            return Ok(());
        }
        let parents: Vec<&mut Record> = records.iter_mut().collect();
        self.load_level(parents, specs.to_vec()).await
    }

    fn load_level<'s>(
        &'s self,
        mut parents: Vec<&'s mut Record>,
        specs: Vec<EagerSpec>,
    ) -> BoxFuture<'s, ModelResult<()>> {
        async move {
            let levels = split_levels(&specs);

            // Validate every lookup up front, then dispatch them together
            let mut attachments: Vec<(String, Vec<usize>)> = Vec::new();
            let mut lookups = Vec::new();
            for level in &levels {
                for (def, members) in group_by_def(&parents) {
                    let Some(decl) = def.relation(&level.name) else {
                        return Err(RelationError::Undefined {
                            entity: def.name.to_string(),
                            relation: level.name.clone(),
                        }
                        .into());
                    };
                    let plan = match decl.kind {
                        MorphKind::Many | MorphKind::One => {
                            let Some(target) = decl.fixed_target() else {
                                return Err(ModelError::Configuration(format!(
                                    "relation '{}' on {} declares no fixed target",
                                    decl.name, def.name
                                )));
                            };
                            Plan::Outgoing {
                                target,
                                link: MorphLink::for_relation(decl, def, &self.map),
                                single: decl.kind == MorphKind::One,
                            }
                        }
                        MorphKind::To => Plan::Inverse {
                            link: OwnerLink::for_relation(decl, &self.map),
                        },
                    };

                    let scope = level.scope.clone();
                    let views: Vec<&Record> = members.iter().map(|&index| &*parents[index]).collect();
                    attachments.push((level.name.clone(), members));
                    lookups.push(async move {
                        match &plan {
                            Plan::Outgoing {
                                target,
                                link,
                                single,
                            } => {
                                one_or_many::load_grouped(
                                    self.db,
                                    target,
                                    link,
                                    &views,
                                    scope.as_ref(),
                                    *single,
                                )
                                .await
                            }
                            Plan::Inverse { link } => {
                                morph_to::load_grouped(self.db, link, def, &views, scope.as_ref())
                                    .await
                            }
                        }
                    });
                }
            }
            let outcomes = join_all(lookups).await;

            for ((name, members), outcome) in attachments.into_iter().zip(outcomes) {
                let grouped = outcome?;
                let mut keyed: HashMap<String, Related> =
                    HashMap::with_capacity(grouped.entries.len());
                for (identity, related) in grouped.entries {
                    // Later duplicates win, matching single-parent reads
                    keyed.insert(identity.to_string(), related);
                }
                for &index in &members {
                    let parent = &mut *parents[index];
                    let attached = parent
                        .present(&grouped.key)
                        .map(Value::to_string)
                        .and_then(|identity| keyed.get(&identity).cloned())
                        .unwrap_or_else(|| grouped.default.clone());
                    parent.set_related(&name, attached);
                }
            }

            // Recurse into what this level just attached
            for level in levels {
                if level.children.is_empty() {
                    continue;
                }
                let mut children: Vec<&mut Record> = Vec::new();
                for parent in parents.iter_mut() {
                    if let Some(related) = parent.related_mut(&level.name) {
                        children.extend(related.records_mut());
                    }
                }
                if children.is_empty() {
                    continue;
                }
                self.load_level(children, level.children).await?;
            }
            Ok(())
        }
        .boxed()
    }
}

/// Merge specs by head segment; remainders become the child specs of
/// their head, carrying their scope with them
fn split_levels(specs: &[EagerSpec]) -> Vec<Level> {
    let mut levels: Vec<Level> = Vec::new();
    for spec in specs {
        let (head, rest) = match spec.path.split_once('.') {
            Some((head, rest)) => (head.to_string(), Some(rest)),
            None => (spec.path.clone(), None),
        };
        let position = match levels.iter().position(|level| level.name == head) {
            Some(position) => position,
            None => {
                levels.push(Level {
                    name: head,
                    scope: None,
                    children: Vec::new(),
                });
                levels.len() - 1
            }
        };
        match rest {
            Some(rest) => levels[position].children.push(EagerSpec {
                path: rest.to_string(),
                scope: spec.scope.clone(),
            }),
            None => {
                if spec.scope.is_some() {
                    levels[position].scope = spec.scope.clone();
                }
            }
        }
    }
    levels
}

/// Parent indices grouped by definition pointer, first-seen order
fn group_by_def(parents: &[&mut Record]) -> Vec<(&'static EntityDef, Vec<usize>)> {
    let mut groups: Vec<(&'static EntityDef, Vec<usize>)> = Vec::new();
    for (index, parent) in parents.iter().enumerate() {
        let def = parent.def();
        match groups.iter_mut().find(|(existing, _)| existing.same(def)) {
            Some((_, members)) => members.push(index),
            None => groups.push((def, vec![index])),
        }
    }
    groups
}
