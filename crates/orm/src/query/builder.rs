//! Query builder
//!
//! A dynamic SELECT/UPDATE/DELETE builder over one table. Queries bound to
//! an [`EntityDef`] hydrate [`Record`](crate::model::Record)s and accept
//! eager-load and relation-filter decoration; unbound queries serve as
//! correlated subqueries.

use serde_json::Value;

use super::types::*;
use crate::model::EntityDef;

/// Builder for database queries
#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) def: Option<&'static EntityDef>,
    pub(crate) table: String,
    pub(crate) alias: Option<String>,
    pub(crate) select_fields: Vec<String>,
    pub(crate) where_conditions: Vec<WhereCondition>,
    pub(crate) order_by: Vec<(String, OrderDirection)>,
    pub(crate) limit_count: Option<i64>,
    pub(crate) offset_value: Option<i64>,
    pub(crate) eager: Vec<EagerSpec>,
    // Self-join alias counter; scoped to one compilation pass
    pub(crate) alias_seq: u32,
}

impl Query {
    /// Query bound to an entity definition; results hydrate as records
    pub fn for_entity(def: &'static EntityDef) -> Self {
        Self {
            def: Some(def),
            table: def.table.to_string(),
            alias: None,
            select_fields: Vec::new(),
            where_conditions: Vec::new(),
            order_by: Vec::new(),
            limit_count: None,
            offset_value: None,
            eager: Vec::new(),
            alias_seq: 0,
        }
    }

    /// Unbound query over a raw table name (subqueries, correlation)
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            def: None,
            table: table.into(),
            alias: None,
            select_fields: Vec::new(),
            where_conditions: Vec::new(),
            order_by: Vec::new(),
            limit_count: None,
            offset_value: None,
            eager: Vec::new(),
            alias_seq: 0,
        }
    }

    /// Give the FROM table an alias (`table AS alias`)
    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Replace the select list (defaults to `*`)
    pub fn select(mut self, fields: Vec<&str>) -> Self {
        self.select_fields = fields.into_iter().map(|f| f.to_string()).collect();
        self
    }

    fn push_condition(
        mut self,
        column: &str,
        operator: QueryOperator,
        value: Option<Value>,
        values: Vec<Value>,
        conjunction: Conjunction,
    ) -> Self {
        self.where_conditions.push(WhereCondition {
            column: column.to_string(),
            operator,
            value,
            values,
            conjunction,
        });
        self
    }

    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(
            column,
            QueryOperator::Equal,
            Some(value.into()),
            Vec::new(),
            Conjunction::And,
        )
    }

    /// Add OR WHERE condition with equality
    pub fn or_where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(
            column,
            QueryOperator::Equal,
            Some(value.into()),
            Vec::new(),
            Conjunction::Or,
        )
    }

    /// Add WHERE condition with not equal
    pub fn where_ne<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.push_condition(
            column,
            QueryOperator::NotEqual,
            Some(value.into()),
            Vec::new(),
            Conjunction::And,
        )
    }

    /// Add WHERE condition with an explicit comparison operator
    pub fn where_op<T: Into<Value>>(
        self,
        column: &str,
        operator: QueryOperator,
        value: T,
    ) -> Self {
        self.push_condition(
            column,
            operator,
            Some(value.into()),
            Vec::new(),
            Conjunction::And,
        )
    }

    /// Add WHERE condition with IN
    pub fn where_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.push_condition(
            column,
            QueryOperator::In,
            None,
            values.into_iter().map(|v| v.into()).collect(),
            Conjunction::And,
        )
    }

    /// Add OR WHERE condition with IN
    pub fn or_where_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.push_condition(
            column,
            QueryOperator::In,
            None,
            values.into_iter().map(|v| v.into()).collect(),
            Conjunction::Or,
        )
    }

    /// Add WHERE condition with NOT IN
    pub fn where_not_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.push_condition(
            column,
            QueryOperator::NotIn,
            None,
            values.into_iter().map(|v| v.into()).collect(),
            Conjunction::And,
        )
    }

    /// Add WHERE condition with IS NULL
    pub fn where_null(self, column: &str) -> Self {
        self.push_condition(
            column,
            QueryOperator::IsNull,
            None,
            Vec::new(),
            Conjunction::And,
        )
    }

    /// Add WHERE condition with IS NOT NULL
    pub fn where_not_null(self, column: &str) -> Self {
        self.push_condition(
            column,
            QueryOperator::IsNotNull,
            None,
            Vec::new(),
            Conjunction::And,
        )
    }

    /// Add a raw WHERE condition, rendered verbatim
    pub fn where_raw(self, raw_condition: &str) -> Self {
        self.push_condition(
            "RAW",
            QueryOperator::Equal,
            Some(Value::String(raw_condition.to_string())),
            Vec::new(),
            Conjunction::And,
        )
    }

    /// Add an EXISTS subquery condition
    pub fn where_exists(self, subquery: Query) -> Self {
        let rendered = format!("({})", subquery.to_sql());
        self.push_condition(
            "EXISTS",
            QueryOperator::Equal,
            Some(Value::String(rendered)),
            Vec::new(),
            Conjunction::And,
        )
    }

    /// Add a NOT EXISTS subquery condition
    pub fn where_not_exists(self, subquery: Query) -> Self {
        let rendered = format!("({})", subquery.to_sql());
        self.push_condition(
            "NOT EXISTS",
            QueryOperator::Equal,
            Some(Value::String(rendered)),
            Vec::new(),
            Conjunction::And,
        )
    }

    /// Compare a scalar subquery (typically `COUNT(*)`) against a value
    pub fn where_count(
        self,
        subquery: Query,
        operator: QueryOperator,
        count: i64,
    ) -> Self {
        let rendered = format!("({})", subquery.to_sql());
        self.push_condition(
            &rendered,
            operator,
            Some(Value::from(count)),
            Vec::new(),
            Conjunction::And,
        )
    }

    /// Project a scalar subquery into the select list under an alias
    pub fn select_count_subquery(mut self, subquery: Query, alias: &str) -> Self {
        if self.select_fields.is_empty() {
            self.select_fields.push("*".to_string());
        }
        self.select_fields
            .push(format!("({}) AS {}", subquery.to_sql(), alias));
        self
    }

    /// Add ORDER BY
    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.order_by.push((column.to_string(), direction));
        self
    }

    /// Limit result count
    pub fn limit(mut self, count: i64) -> Self {
        self.limit_count = Some(count);
        self
    }

    /// Skip rows before returning results
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset_value = Some(offset);
        self
    }

    /// Request an eager-loaded relation (dotted paths nest)
    pub fn with(mut self, relation: &str) -> Self {
        self.eager.push(EagerSpec::new(relation));
        self
    }

    /// Request an eager-loaded relation with a scope on its batch query
    pub fn with_scoped(
        mut self,
        relation: &str,
        scope: impl Fn(Query) -> Query + Send + Sync + 'static,
    ) -> Self {
        self.eager.push(EagerSpec::scoped(relation, scope));
        self
    }

    /// Next self-join alias for this compilation pass (`sj_0`, `sj_1`, ...)
    pub(crate) fn next_self_join_alias(&mut self) -> String {
        let alias = format!("sj_{}", self.alias_seq);
        self.alias_seq += 1;
        alias
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static ITEMS: EntityDef = EntityDef::new("Item", "items", "id");

    #[test]
    fn bound_queries_carry_their_definition() {
        let query = Query::for_entity(&ITEMS);
        assert_eq!(query.table, "items");
        assert!(query.def.is_some());

        let sub = Query::table("anything");
        assert!(sub.def.is_none());
    }

    #[test]
    fn self_join_aliases_increment_per_pass() {
        let mut query = Query::for_entity(&ITEMS);
        assert_eq!(query.next_self_join_alias(), "sj_0");
        assert_eq!(query.next_self_join_alias(), "sj_1");

        // A fresh compilation pass starts over
        let mut other = Query::for_entity(&ITEMS);
        assert_eq!(other.next_self_join_alias(), "sj_0");
    }
}
