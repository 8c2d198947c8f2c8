//! Record persistence
//!
//! Implements the row operations the relations engine needs: insert with
//! `RETURNING *`, update by primary key, delete, and lookup. All I/O goes
//! through the [`Database`] trait with `$n` parameter binding.

use serde_json::Value;

use super::entity::{EntityDef, Record};
use crate::backends::Database;
use crate::error::{ModelError, ModelResult};

impl Record {
    /// Insert or update depending on persistence state
    pub async fn save(&mut self, db: &dyn Database) -> ModelResult<()> {
        if self.is_persisted() {
            self.update_row(db).await
        } else {
            self.insert_row(db).await
        }
    }

    async fn insert_row(&mut self, db: &dyn Database) -> ModelResult<()> {
        let table = self.def().table;
        let fields = self.to_fields();

        let (sql, params): (String, Vec<Value>) = if fields.is_empty() {
            (
                format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table),
                Vec::new(),
            )
        } else {
            let columns: Vec<&str> = fields.keys().map(|key| key.as_str()).collect();
            let placeholders: Vec<String> =
                (1..=columns.len()).map(|i| format!("${}", i)).collect();
            (
                format!(
                    "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                    table,
                    columns.join(", "),
                    placeholders.join(", ")
                ),
                fields.values().cloned().collect(),
            )
        };

        tracing::debug!(table, "inserting record");
        let row = db.fetch_optional(&sql, &params).await?.ok_or_else(|| {
            ModelError::Database(format!("Insert into {} returned no row", table))
        })?;

        self.merge_row(row);
        self.mark_persisted(true);
        Ok(())
    }

    async fn update_row(&mut self, db: &dyn Database) -> ModelResult<()> {
        let table = self.def().table;
        let pk = self.def().primary_key;
        let pk_value = self
            .primary_key_value()
            .cloned()
            .ok_or(ModelError::MissingPrimaryKey)?;

        let fields: Vec<(String, Value)> = self
            .to_fields()
            .into_iter()
            .filter(|(column, _)| column != pk)
            .collect();
        if fields.is_empty() {
            return Ok(());
        }

        let mut assignments = Vec::with_capacity(fields.len());
        let mut params = Vec::with_capacity(fields.len() + 1);
        for (i, (column, value)) in fields.into_iter().enumerate() {
            assignments.push(format!("{} = ${}", column, i + 1));
            params.push(value);
        }
        params.push(pk_value);

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ${}",
            table,
            assignments.join(", "),
            pk,
            params.len()
        );

        tracing::debug!(table, "updating record");
        db.execute(&sql, &params).await?;
        Ok(())
    }

    /// Delete this row by primary key
    pub async fn delete(&mut self, db: &dyn Database) -> ModelResult<u64> {
        let pk_value = self
            .primary_key_value()
            .cloned()
            .ok_or(ModelError::MissingPrimaryKey)?;

        let sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            self.def().table,
            self.def().primary_key
        );
        let affected = db.execute(&sql, &[pk_value]).await?;
        self.mark_persisted(false);
        Ok(affected)
    }

    /// Look up one row by primary key
    pub async fn find(
        def: &'static EntityDef,
        db: &dyn Database,
        id: impl Into<Value>,
    ) -> ModelResult<Option<Record>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = $1 LIMIT 1",
            def.table, def.primary_key
        );
        let row = db.fetch_optional(&sql, &[id.into()]).await?;
        Ok(row.map(|row| Record::hydrate(def, row)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryDatabase;
    use serde_json::json;

    static NOTES: EntityDef = EntityDef::new("Note", "notes", "id");

    #[tokio::test]
    async fn insert_marks_persisted_and_adopts_returned_columns() {
        let db = MemoryDatabase::new();
        let mut note = Record::new(&NOTES);
        note.set("title", "first");

        note.save(&db).await.unwrap();

        assert!(note.is_persisted());
        assert_eq!(note.primary_key_value(), Some(&json!(1)));
        let issued = db.statements();
        assert_eq!(issued.len(), 1);
        assert_eq!(
            issued[0].sql,
            "INSERT INTO notes (title) VALUES ($1) RETURNING *"
        );
        assert_eq!(issued[0].params, vec![json!("first")]);
    }

    #[tokio::test]
    async fn save_on_persisted_record_updates_by_primary_key() {
        let db = MemoryDatabase::new();
        let mut note = Record::new(&NOTES);
        note.set("title", "first");
        note.save(&db).await.unwrap();

        note.set("title", "renamed");
        note.save(&db).await.unwrap();

        let issued = db.statements();
        assert_eq!(issued.len(), 2);
        assert_eq!(issued[1].sql, "UPDATE notes SET title = $1 WHERE id = $2");
        assert_eq!(issued[1].params, vec![json!("renamed"), json!(1)]);
    }

    #[tokio::test]
    async fn update_without_primary_key_is_refused() {
        let db = MemoryDatabase::new();
        let mut note = Record::new(&NOTES);
        note.set("title", "loose");
        note.mark_persisted(true);

        let err = note.save(&db).await.unwrap_err();
        assert!(matches!(err, ModelError::MissingPrimaryKey));
        assert!(db.statements().is_empty());
    }
}
