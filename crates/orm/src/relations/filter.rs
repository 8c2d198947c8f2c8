//! Relation-aware query filters
//!
//! Extends [`Query`] with existence and count filtering over declared
//! relations: `has`, `where_has`, `doesnt_have`, `has_count` and the
//! `with_count` select projection. Each builds a correlated subquery
//! through the same decoration the relation accessors use, so predicate
//! shape and self-join aliasing stay identical across both paths.

use std::sync::Arc;

use crate::error::{ModelError, ModelResult, RelationError};
use crate::model::EntityDef;
use crate::query::{Query, QueryOperator, ScopeFn};
use crate::relations::decorate::{correlated_subquery, owner_subquery};
use crate::relations::def::{MorphKind, RelationDef};
use crate::relations::link::{MorphLink, OwnerLink};
use crate::relations::map::global_morph_map;

impl Query {
    /// Keep rows with at least one related row
    pub fn has(self, relation: &str) -> ModelResult<Self> {
        self.has_filter("has", relation, None, true)
    }

    /// Keep rows with at least one related row matching `scope`
    pub fn where_has(
        self,
        relation: &str,
        scope: impl Fn(Query) -> Query + Send + Sync + 'static,
    ) -> ModelResult<Self> {
        let scope: ScopeFn = Arc::new(scope);
        self.has_filter("where_has", relation, Some(&scope), true)
    }

    /// Keep rows with no related rows
    pub fn doesnt_have(self, relation: &str) -> ModelResult<Self> {
        self.has_filter("doesnt_have", relation, None, false)
    }

    /// Keep rows whose related-row count satisfies `operator count`
    pub fn has_count(
        self,
        relation: &str,
        operator: QueryOperator,
        count: i64,
    ) -> ModelResult<Self> {
        self.count_filter("has_count", relation, None, operator, count)
    }

    /// Count filter over related rows matching `scope`
    pub fn where_has_count(
        self,
        relation: &str,
        scope: impl Fn(Query) -> Query + Send + Sync + 'static,
        operator: QueryOperator,
        count: i64,
    ) -> ModelResult<Self> {
        let scope: ScopeFn = Arc::new(scope);
        self.count_filter("where_has_count", relation, Some(&scope), operator, count)
    }

    /// Project the related-row count as `<relation>_count`
    pub fn with_count(self, relation: &str) -> ModelResult<Self> {
        self.count_select("with_count", relation, None)
    }

    /// Project the count of related rows matching `scope`
    pub fn with_count_scoped(
        self,
        relation: &str,
        scope: impl Fn(Query) -> Query + Send + Sync + 'static,
    ) -> ModelResult<Self> {
        let scope: ScopeFn = Arc::new(scope);
        self.count_select("with_count_scoped", relation, Some(&scope))
    }

    fn has_filter(
        mut self,
        method: &str,
        relation: &str,
        scope: Option<&ScopeFn>,
        exists: bool,
    ) -> ModelResult<Self> {
        let (def, decl) = self.relation_parts(method, relation)?;
        let subquery = self.relation_subquery(def, decl, vec!["*"], scope)?;
        Ok(if exists {
            self.where_exists(subquery)
        } else {
            self.where_not_exists(subquery)
        })
    }

    fn count_filter(
        mut self,
        method: &str,
        relation: &str,
        scope: Option<&ScopeFn>,
        operator: QueryOperator,
        count: i64,
    ) -> ModelResult<Self> {
        let (def, decl) = self.relation_parts(method, relation)?;
        let subquery = self.relation_subquery(def, decl, vec!["COUNT(*)"], scope)?;
        Ok(self.where_count(subquery, operator, count))
    }

    fn count_select(
        mut self,
        method: &str,
        relation: &str,
        scope: Option<&ScopeFn>,
    ) -> ModelResult<Self> {
        let (def, decl) = self.relation_parts(method, relation)?;
        let alias = format!("{}_count", relation);
        let subquery = self.relation_subquery(def, decl, vec!["COUNT(*)"], scope)?;
        Ok(self.select_count_subquery(subquery, &alias))
    }

    fn relation_parts(
        &self,
        method: &str,
        relation: &str,
    ) -> ModelResult<(&'static EntityDef, &'static RelationDef)> {
        let Some(def) = self.def else {
            return Err(ModelError::Query(format!(
                "{} requires a query bound to an entity definition",
                method
            )));
        };
        let Some(decl) = def.relation(relation) else {
            return Err(RelationError::Undefined {
                entity: def.name.to_string(),
                relation: relation.to_string(),
            }
            .into());
        };
        Ok((def, decl))
    }

    fn relation_subquery(
        &mut self,
        def: &'static EntityDef,
        decl: &'static RelationDef,
        select: Vec<&str>,
        scope: Option<&ScopeFn>,
    ) -> ModelResult<Query> {
        match decl.kind {
            MorphKind::One | MorphKind::Many => {
                let Some(target) = decl.fixed_target() else {
                    return Err(ModelError::Configuration(format!(
                        "relation '{}' on {} declares no fixed target",
                        decl.name, def.name
                    )));
                };
                let link = MorphLink::for_relation(decl, def, global_morph_map());
                Ok(correlated_subquery(
                    self,
                    def.table,
                    target.table,
                    &link,
                    select,
                    scope,
                ))
            }
            MorphKind::To => {
                let candidates = decl.candidates();
                // Correlating one EXISTS across several owner tables would
                // need per-candidate unions; keep the surface honest instead
                if candidates.len() != 1 {
                    return Err(RelationError::UnsupportedMethod {
                        relation: format!(
                            "MorphTo({}.{}) across {} candidate targets",
                            def.name,
                            decl.name,
                            candidates.len()
                        ),
                        method: "relation filtering".to_string(),
                    }
                    .into());
                }
                let link = OwnerLink::for_relation(decl, global_morph_map());
                Ok(owner_subquery(
                    self,
                    def.table,
                    &link,
                    candidates[0],
                    select,
                    scope,
                ))
            }
        }
    }
}
