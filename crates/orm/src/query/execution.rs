//! Query execution
//!
//! Bound queries hydrate [`Record`]s and run their eager-load plan after
//! the rows arrive. Unbound queries can still run DML.

use serde_json::Value;

use super::builder::Query;
use crate::backends::{Database, SqlRow};
use crate::error::{ModelError, ModelResult};
use crate::loading::EagerLoader;
use crate::model::Record;

/// One page of results plus pagination bookkeeping
#[derive(Debug, Clone)]
pub struct Page {
    pub data: Vec<Record>,
    pub total: i64,
    pub per_page: i64,
    pub current_page: i64,
    pub last_page: i64,
}

impl Query {
    /// Execute and hydrate all matching records, then run the eager plan
    pub async fn fetch(mut self, db: &dyn Database) -> ModelResult<Vec<Record>> {
        let def = self.def.ok_or_else(|| {
            ModelError::Query("cannot fetch records from an unbound query".to_string())
        })?;
        let eager = std::mem::take(&mut self.eager);

        let (sql, params) = self.to_sql_with_params();
        tracing::debug!(entity = def.name, sql = %sql, "fetching records");
        let rows = db.fetch_all(&sql, &params).await?;
        let mut records: Vec<Record> = rows
            .into_iter()
            .map(|row| Record::hydrate(def, row))
            .collect();

        if !eager.is_empty() && !records.is_empty() {
            EagerLoader::new(db).load(&mut records, &eager).await?;
        }
        Ok(records)
    }

    /// Execute and return the first matching record, if any
    pub async fn first(self, db: &dyn Database) -> ModelResult<Option<Record>> {
        let records = self.limit(1).fetch(db).await?;
        Ok(records.into_iter().next())
    }

    /// Execute and return the first matching record, or a not-found error
    pub async fn first_or_fail(self, db: &dyn Database) -> ModelResult<Record> {
        let table = self.def.map(|def| def.table).unwrap_or("record");
        self.first(db)
            .await?
            .ok_or_else(|| ModelError::NotFound(table.to_string()))
    }

    /// Count matching rows. Ordering, paging and eager specs are dropped;
    /// they cannot change the count.
    pub async fn count(mut self, db: &dyn Database) -> ModelResult<i64> {
        self.select_fields = vec!["COUNT(*) AS count".to_string()];
        self.order_by.clear();
        self.limit_count = None;
        self.offset_value = None;
        self.eager.clear();

        let (sql, params) = self.to_sql_with_params();
        let row = db.fetch_optional(&sql, &params).await?;
        let count = row
            .as_ref()
            .and_then(|row| row.get("count").or_else(|| row.values().next()))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(count)
    }

    /// Bulk UPDATE of every matching row; returns the affected count
    pub async fn update(self, db: &dyn Database, payload: SqlRow) -> ModelResult<u64> {
        if payload.is_empty() {
            return Err(ModelError::Query(
                "update payload has no columns".to_string(),
            ));
        }

        let mut params: Vec<Value> = Vec::with_capacity(payload.len());
        let mut counter = 1usize;
        let mut assignments = Vec::with_capacity(payload.len());
        for (column, value) in &payload {
            params.push(value.clone());
            assignments.push(format!("{} = ${}", column, counter));
            counter += 1;
        }

        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        if let Some(clause) = self.where_clause_params(&mut counter, &mut params) {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }

        tracing::debug!(sql = %sql, "executing bulk update");
        db.execute(&sql, &params).await
    }

    /// Bulk DELETE of every matching row; returns the affected count
    pub async fn delete(self, db: &dyn Database) -> ModelResult<u64> {
        let mut params = Vec::new();
        let mut counter = 1usize;
        let mut sql = format!("DELETE FROM {}", self.table);
        if let Some(clause) = self.where_clause_params(&mut counter, &mut params) {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }

        tracing::debug!(sql = %sql, "executing bulk delete");
        db.execute(&sql, &params).await
    }

    /// Count the full result set, then fetch one page of it
    pub async fn paginate(self, db: &dyn Database, page: i64, per_page: i64) -> ModelResult<Page> {
        if page < 1 {
            return Err(ModelError::Query("page starts at 1".to_string()));
        }
        if per_page < 1 {
            return Err(ModelError::Query("per_page must be positive".to_string()));
        }

        let total = self.clone().count(db).await?;
        let data = self
            .limit(per_page)
            .offset((page - 1) * per_page)
            .fetch(db)
            .await?;
        let last_page = ((total + per_page - 1) / per_page).max(1);

        Ok(Page {
            data,
            total,
            per_page,
            current_page: page,
            last_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryDatabase;
    use crate::model::EntityDef;
    use crate::query::types::OrderDirection;
    use serde_json::json;

    static TAGS: EntityDef = EntityDef::new("Tag", "tags", "id");

    fn rows(values: Vec<Value>) -> Vec<SqlRow> {
        values
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn fetch_hydrates_bound_records() {
        let db = MemoryDatabase::new();
        db.queue_rows(
            "tags",
            rows(vec![json!({"id": 1, "title": "a"}), json!({"id": 2, "title": "b"})]),
        );

        let records = Query::for_entity(&TAGS)
            .where_eq("taggable_type", "videos")
            .fetch(&db)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|record| record.is_persisted()));
        assert!(records[0].def().same(&TAGS));

        let logged = db.statements();
        assert_eq!(logged.len(), 1);
        assert_eq!(
            logged[0].sql,
            "SELECT * FROM tags WHERE taggable_type = $1"
        );
        assert_eq!(logged[0].params, vec![json!("videos")]);
    }

    #[tokio::test]
    async fn fetch_requires_an_entity_binding() {
        let db = MemoryDatabase::new();
        let result = Query::table("tags").fetch(&db).await;
        assert!(matches!(result, Err(ModelError::Query(_))));
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn first_limits_to_one_row() {
        let db = MemoryDatabase::new();
        db.queue_rows("tags", rows(vec![json!({"id": 1})]));

        let record = Query::for_entity(&TAGS).first(&db).await.unwrap();
        assert_eq!(record.unwrap().attr("id"), Some(&json!(1)));
        assert!(db.statements()[0].sql.ends_with("LIMIT 1"));
    }

    #[tokio::test]
    async fn first_or_fail_reports_the_table() {
        let db = MemoryDatabase::new();
        let result = Query::for_entity(&TAGS).first_or_fail(&db).await;
        match result {
            Err(ModelError::NotFound(table)) => assert_eq!(table, "tags"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn count_drops_ordering_and_paging() {
        let db = MemoryDatabase::new();
        db.queue_rows("tags", rows(vec![json!({"count": 5})]));

        let count = Query::for_entity(&TAGS)
            .where_eq("taggable_type", "videos")
            .order_by("id", OrderDirection::Desc)
            .limit(2)
            .count(&db)
            .await
            .unwrap();

        assert_eq!(count, 5);
        let sql = &db.statements()[0].sql;
        assert_eq!(
            sql,
            "SELECT COUNT(*) AS count FROM tags WHERE taggable_type = $1"
        );
    }

    #[tokio::test]
    async fn bulk_update_parametrizes_payload_then_predicate() {
        let db = MemoryDatabase::new();
        let mut payload = SqlRow::new();
        payload.insert("title".to_string(), json!("renamed"));

        let affected = Query::for_entity(&TAGS)
            .where_eq("taggable_id", 7)
            .update(&db, payload)
            .await
            .unwrap();

        assert_eq!(affected, 1);
        let logged = db.statements();
        assert_eq!(
            logged[0].sql,
            "UPDATE tags SET title = $1 WHERE taggable_id = $2"
        );
        assert_eq!(logged[0].params, vec![json!("renamed"), json!(7)]);
    }

    #[tokio::test]
    async fn bulk_update_rejects_empty_payloads() {
        let db = MemoryDatabase::new();
        let result = Query::for_entity(&TAGS).update(&db, SqlRow::new()).await;
        assert!(matches!(result, Err(ModelError::Query(_))));
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn bulk_delete_scopes_by_predicate() {
        let db = MemoryDatabase::new();
        let affected = Query::for_entity(&TAGS)
            .where_eq("taggable_id", 7)
            .where_eq("taggable_type", "videos")
            .delete(&db)
            .await
            .unwrap();

        assert_eq!(affected, 1);
        assert_eq!(
            db.statements()[0].sql,
            "DELETE FROM tags WHERE taggable_id = $1 AND taggable_type = $2"
        );
    }

    #[tokio::test]
    async fn paginate_counts_then_fetches_the_page() {
        let db = MemoryDatabase::new();
        db.queue_rows("tags", rows(vec![json!({"count": 5})]));
        db.queue_rows("tags", rows(vec![json!({"id": 3}), json!({"id": 4})]));

        let page = Query::for_entity(&TAGS)
            .paginate(&db, 2, 2)
            .await
            .unwrap();

        assert_eq!(page.total, 5);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.last_page, 3);
        assert_eq!(page.data.len(), 2);

        let logged = db.statements();
        assert!(logged[0].sql.starts_with("SELECT COUNT(*)"));
        assert!(logged[1].sql.ends_with("LIMIT 2 OFFSET 2"));
    }

    #[tokio::test]
    async fn paginate_rejects_nonpositive_pages() {
        let db = MemoryDatabase::new();
        assert!(Query::for_entity(&TAGS).paginate(&db, 0, 10).await.is_err());
        assert!(Query::for_entity(&TAGS).paginate(&db, 1, 0).await.is_err());
    }
}
