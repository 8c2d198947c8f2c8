//! SQL generation
//!
//! Two render modes: `to_sql_with_params` produces `$n` placeholders for
//! execution; `to_sql` inlines literals and is used for embedded
//! subqueries, logging, and assertions.

use serde_json::Value;

use super::builder::Query;
use super::types::*;

impl Query {
    /// Render SELECT SQL with `$n` placeholders and the parameter list
    pub fn to_sql_with_params(&self) -> (String, Vec<Value>) {
        let mut sql = self.select_from();
        let mut params = Vec::new();
        let mut counter = 1usize;

        if let Some(clause) = self.where_clause_params(&mut counter, &mut params) {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        self.push_order_limit(&mut sql);

        (sql, params)
    }

    /// Render SELECT SQL with inline literals
    pub fn to_sql(&self) -> String {
        let mut sql = self.select_from();

        if let Some(clause) = self.where_clause_inline() {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        self.push_order_limit(&mut sql);

        sql
    }

    fn select_from(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.select_fields.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select_fields.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.from_clause());
        sql
    }

    pub(crate) fn from_clause(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {}", self.table, alias),
            None => self.table.clone(),
        }
    }

    fn push_order_limit(&self, sql: &mut String) {
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let clauses: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", column, direction))
                .collect();
            sql.push_str(&clauses.join(", "));
        }
        if let Some(limit) = self.limit_count {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset_value {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
    }

    /// WHERE clause in placeholder mode; `counter` carries the next `$n`
    pub(crate) fn where_clause_params(
        &self,
        counter: &mut usize,
        params: &mut Vec<Value>,
    ) -> Option<String> {
        if self.where_conditions.is_empty() {
            return None;
        }
        let mut clause = String::new();
        for (i, condition) in self.where_conditions.iter().enumerate() {
            if i > 0 {
                clause.push(' ');
                clause.push_str(&condition.conjunction.to_string());
                clause.push(' ');
            }
            clause.push_str(&render_condition_params(condition, counter, params));
        }
        Some(clause)
    }

    pub(crate) fn where_clause_inline(&self) -> Option<String> {
        if self.where_conditions.is_empty() {
            return None;
        }
        let mut clause = String::new();
        for (i, condition) in self.where_conditions.iter().enumerate() {
            if i > 0 {
                clause.push(' ');
                clause.push_str(&condition.conjunction.to_string());
                clause.push(' ');
            }
            clause.push_str(&render_condition_inline(condition));
        }
        Some(clause)
    }
}

fn render_condition_params(
    condition: &WhereCondition,
    counter: &mut usize,
    params: &mut Vec<Value>,
) -> String {
    if let Some(rendered) = render_sentinel(condition) {
        return rendered;
    }

    match condition.operator {
        QueryOperator::In | QueryOperator::NotIn => {
            let mut placeholders = Vec::with_capacity(condition.values.len());
            for value in &condition.values {
                params.push(value.clone());
                placeholders.push(format!("${}", counter));
                *counter += 1;
            }
            format!(
                "{} {} ({})",
                condition.column,
                condition.operator,
                placeholders.join(", ")
            )
        }
        QueryOperator::IsNull | QueryOperator::IsNotNull => {
            format!("{} {}", condition.column, condition.operator)
        }
        _ => match &condition.value {
            Some(value) => {
                params.push(value.clone());
                let rendered =
                    format!("{} {} ${}", condition.column, condition.operator, counter);
                *counter += 1;
                rendered
            }
            None => format!("{} {} NULL", condition.column, condition.operator),
        },
    }
}

fn render_condition_inline(condition: &WhereCondition) -> String {
    if let Some(rendered) = render_sentinel(condition) {
        return rendered;
    }

    match condition.operator {
        QueryOperator::In | QueryOperator::NotIn => {
            let values: Vec<String> = condition.values.iter().map(format_value).collect();
            format!(
                "{} {} ({})",
                condition.column,
                condition.operator,
                values.join(", ")
            )
        }
        QueryOperator::IsNull | QueryOperator::IsNotNull => {
            format!("{} {}", condition.column, condition.operator)
        }
        _ => match &condition.value {
            Some(value) => format!(
                "{} {} {}",
                condition.column,
                condition.operator,
                format_value(value)
            ),
            None => format!("{} {} NULL", condition.column, condition.operator),
        },
    }
}

/// Raw and subquery sentinels render the same in both modes
fn render_sentinel(condition: &WhereCondition) -> Option<String> {
    if condition.column == "RAW" {
        if let Some(Value::String(raw)) = &condition.value {
            return Some(raw.clone());
        }
    }
    if condition.column == "EXISTS" || condition.column == "NOT EXISTS" {
        if let Some(Value::String(subquery)) = &condition.value {
            return Some(format!("{} {}", condition.column, subquery));
        }
    }
    None
}

/// Format a value as a SQL literal
pub(crate) fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "NULL".to_string(),
        _ => "NULL".to_string(), // Arrays and objects are not valid literals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityDef;

    static TAGS: EntityDef = EntityDef::new("Tag", "tags", "id");

    #[test]
    fn renders_predicates_inline() {
        let sql = Query::for_entity(&TAGS)
            .where_eq("taggable_type", "videos")
            .where_in("taggable_id", vec![1, 2])
            .to_sql();
        assert_eq!(
            sql,
            "SELECT * FROM tags WHERE taggable_type = 'videos' AND taggable_id IN (1, 2)"
        );
    }

    #[test]
    fn renders_placeholders_in_order() {
        let (sql, params) = Query::for_entity(&TAGS)
            .where_eq("taggable_type", "videos")
            .where_in("taggable_id", vec![1, 2])
            .to_sql_with_params();
        assert_eq!(
            sql,
            "SELECT * FROM tags WHERE taggable_type = $1 AND taggable_id IN ($2, $3)"
        );
        assert_eq!(
            params,
            vec![
                Value::from("videos"),
                Value::from(1),
                Value::from(2)
            ]
        );
    }

    #[test]
    fn escapes_string_literals() {
        let sql = Query::for_entity(&TAGS)
            .where_eq("title", "it's")
            .to_sql();
        assert_eq!(sql, "SELECT * FROM tags WHERE title = 'it''s'");
    }

    #[test]
    fn embeds_exists_subqueries_verbatim() {
        let sub = Query::table("tags").where_raw("tags.taggable_id = videos.id");
        let sql = Query::table("videos").where_exists(sub).to_sql();
        assert_eq!(
            sql,
            "SELECT * FROM videos WHERE EXISTS (SELECT * FROM tags WHERE tags.taggable_id = videos.id)"
        );
    }

    #[test]
    fn chains_or_conditions() {
        let sql = Query::for_entity(&TAGS)
            .where_eq("title", "a")
            .or_where_eq("title", "b")
            .to_sql();
        assert_eq!(
            sql,
            "SELECT * FROM tags WHERE title = 'a' OR title = 'b'"
        );
    }

    #[test]
    fn compares_scalar_count_subqueries() {
        let sub = Query::table("tags").select(vec!["COUNT(*)"]);
        let sql = Query::table("videos")
            .where_count(sub, QueryOperator::GreaterThanOrEqual, 2)
            .to_sql();
        assert_eq!(
            sql,
            "SELECT * FROM videos WHERE (SELECT COUNT(*) FROM tags) >= 2"
        );
    }

    #[test]
    fn aliases_and_paging_render_in_place() {
        let sql = Query::table("comments")
            .aliased("sj_0")
            .select(vec!["COUNT(*)"])
            .to_sql();
        assert_eq!(sql, "SELECT COUNT(*) FROM comments AS sj_0");

        let sql = Query::for_entity(&TAGS)
            .order_by("id", OrderDirection::Desc)
            .limit(10)
            .offset(20)
            .to_sql();
        assert_eq!(sql, "SELECT * FROM tags ORDER BY id DESC LIMIT 10 OFFSET 20");
    }
}
