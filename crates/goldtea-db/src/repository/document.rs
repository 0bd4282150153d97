//! # Document Repository
//!
//! A small document store on top of one SQLite table. Bodies are JSON text;
//! every filter, sort and cursor condition is evaluated with
//! `json_extract(body, '$.<field>')`.
//!
//! ## Generated SQL
//! ```text
//!   DocumentQuery::new()
//!       .filter(Filter::gte("date", 1709251200000))
//!       .order_by(OrderBy::desc("date"))
//!       .start_after(Some(Cursor { value: 1709337600000, id: "s-41" }))
//!       .limit(50)
//!
//!   SELECT id, body FROM documents
//!   WHERE collection = ? AND json_valid(body)
//!     AND json_extract(body, '$.date') >= ?
//!     AND (json_extract(body, '$.date') < ?
//!          OR (json_extract(body, '$.date') = ? AND id < ?))
//!   ORDER BY json_extract(body, '$.date') DESC, id DESC
//!   LIMIT ?
//! ```
//!
//! Field names are validated against `[A-Za-z0-9_]` before they are spliced
//! into a JSON path; every value is a bound parameter.

use chrono::Utc;
use serde_json::Value;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, warn};

use goldtea_core::query::{Direction, Document, DocumentQuery};

use super::to_millis;
use crate::error::{DbError, DbResult};

/// Repository for JSON documents.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DocumentRepository { pool }
    }

    /// Fetches one document.
    ///
    /// A stored body that is not valid JSON reads as absent.
    pub async fn get(&self, collection: &str, id: &str) -> DbResult<Option<Document>> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let body: String = row.try_get("body")?;
        Ok(parse_body(collection, id, &body))
    }

    /// Runs a filtered, ordered, cursor-paged query.
    pub async fn query(&self, collection: &str, query: &DocumentQuery) -> DbResult<Vec<Document>> {
        query
            .validate()
            .map_err(|e| DbError::InvalidQuery(e.to_string()))?;

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, body FROM documents WHERE collection = ");
        qb.push_bind(collection.to_string());
        qb.push(" AND json_valid(body)");

        for filter in &query.filters {
            qb.push(format!(
                " AND {} {} ",
                json_path(&filter.field),
                filter.op.as_sql()
            ));
            push_value(&mut qb, &filter.value);
        }

        match (&query.order_by, &query.start_after) {
            (Some(order), Some(cursor)) => {
                let path = json_path(&order.field);
                let cmp = match order.direction {
                    Direction::Ascending => ">",
                    Direction::Descending => "<",
                };
                qb.push(format!(" AND ({} {} ", path, cmp));
                push_value(&mut qb, &cursor.value);
                qb.push(format!(" OR ({} = ", path));
                push_value(&mut qb, &cursor.value);
                qb.push(format!(" AND id {} ", cmp));
                qb.push_bind(cursor.id.clone());
                qb.push("))");
            }
            (None, Some(cursor)) => {
                qb.push(" AND id > ");
                qb.push_bind(cursor.id.clone());
            }
            _ => {}
        }

        match &query.order_by {
            Some(order) => {
                let dir = match order.direction {
                    Direction::Ascending => "ASC",
                    Direction::Descending => "DESC",
                };
                qb.push(format!(
                    " ORDER BY {} {}, id {}",
                    json_path(&order.field),
                    dir,
                    dir
                ));
            }
            None => {
                qb.push(" ORDER BY id ASC");
            }
        }

        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(limit as i64);
        }

        let rows = qb.build().fetch_all(&self.pool).await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let body: String = row.try_get("body")?;
            if let Some(doc) = parse_body(collection, &id, &body) {
                documents.push(doc);
            }
        }

        debug!(
            collection = %collection,
            count = documents.len(),
            "Document query complete"
        );
        Ok(documents)
    }

    /// Inserts or replaces a document.
    pub async fn upsert(&self, collection: &str, id: &str, data: &Value) -> DbResult<()> {
        let body = serde_json::to_string(data)?;

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (collection, id) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(body)
        .bind(to_millis(Utc::now()))
        .execute(&self.pool)
        .await?;

        debug!(collection = %collection, id = %id, "Document upserted");
        Ok(())
    }

    /// Deletes a document. Returns whether anything was removed.
    pub async fn delete(&self, collection: &str, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self, collection: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

fn json_path(field: &str) -> String {
    format!("json_extract(body, '$.{}')", field)
}

/// Binds a JSON value with the SQLite type `json_extract` would produce.
fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Null => {
            qb.push("NULL");
        }
        Value::Bool(b) => {
            qb.push_bind(i64::from(*b));
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => {
                qb.push_bind(i);
            }
            None => {
                qb.push_bind(n.as_f64().unwrap_or_default());
            }
        },
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        other => {
            qb.push_bind(other.to_string());
        }
    }
}

fn parse_body(collection: &str, id: &str, body: &str) -> Option<Document> {
    match serde_json::from_str::<Value>(body) {
        Ok(data) => Some(Document::new(id, data)),
        Err(e) => {
            warn!(collection = %collection, id = %id, error = %e, "Skipping malformed document");
            None
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use goldtea_core::query::{Cursor, Filter, OrderBy};
    use serde_json::json;

    async fn repo() -> (Database, DocumentRepository) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.documents();
        (db, repo)
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let (_db, repo) = repo().await;

        repo.upsert("villages", "Rampur", &json!({ "name": "Rampur", "day": "Monday" }))
            .await
            .unwrap();
        repo.upsert("villages", "Rampur", &json!({ "name": "Rampur", "day": "Friday" }))
            .await
            .unwrap();

        let doc = repo.get("villages", "Rampur").await.unwrap().unwrap();
        assert_eq!(doc.data["day"], "Friday");
        assert_eq!(repo.count("villages").await.unwrap(), 1);
        assert!(repo.get("villages", "Sonpur").await.unwrap().is_none());
        assert!(repo.get("pricing", "Rampur").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let (_db, repo) = repo().await;
        repo.upsert("notes", "n1", &json!({ "title": "x" })).await.unwrap();

        assert!(repo.delete("notes", "n1").await.unwrap());
        assert!(!repo.delete("notes", "n1").await.unwrap());
    }

    #[tokio::test]
    async fn test_equality_filter_and_ordering() {
        let (_db, repo) = repo().await;
        for (id, tea, package) in [
            ("Mix_100gm", "Mix", "100gm"),
            ("legacy-1", "Mix", "100gm"),
            ("Barik_1kg", "Barik", "1kg"),
        ] {
            repo.upsert("pricing", id, &json!({ "tea_type": tea, "package": package }))
                .await
                .unwrap();
        }

        let query = DocumentQuery::new()
            .filter(Filter::eq("tea_type", "Mix"))
            .filter(Filter::eq("package", "100gm"))
            .order_by(OrderBy::asc("package"));
        let docs = repo.query("pricing", &query).await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["Mix_100gm", "legacy-1"]);
    }

    #[tokio::test]
    async fn test_cursor_pagination_descending_with_ties() {
        let (_db, repo) = repo().await;
        for (id, date) in [("a", 100), ("b", 300), ("c", 200), ("d", 200), ("e", 50)] {
            repo.upsert("sales", id, &json!({ "date": date })).await.unwrap();
        }

        let order = OrderBy::desc("date");
        let page1 = repo
            .query("sales", &DocumentQuery::new().order_by(order.clone()).limit(2))
            .await
            .unwrap();
        let ids: Vec<_> = page1.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d"]);

        let cursor = Cursor::at(&page1[1], &order);
        let page2 = repo
            .query(
                "sales",
                &DocumentQuery::new()
                    .order_by(order.clone())
                    .start_after(Some(cursor))
                    .limit(2),
            )
            .await
            .unwrap();
        let ids: Vec<_> = page2.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);

        let cursor = Cursor::at(&page2[1], &order);
        let page3 = repo
            .query(
                "sales",
                &DocumentQuery::new().order_by(order).start_after(Some(cursor)).limit(2),
            )
            .await
            .unwrap();
        assert_eq!(page3.len(), 1);
        assert_eq!(page3[0].id, "e");
    }

    #[tokio::test]
    async fn test_range_filters() {
        let (_db, repo) = repo().await;
        for (id, date) in [("a", 100), ("b", 200), ("c", 300)] {
            repo.upsert("sales", id, &json!({ "date": date })).await.unwrap();
        }

        let query = DocumentQuery::new()
            .filter(Filter::gte("date", 150))
            .filter(Filter::lte("date", 300))
            .order_by(OrderBy::asc("date"));
        let docs = repo.query("sales", &query).await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_malformed_body_is_skipped() {
        let (db, repo) = repo().await;
        repo.upsert("notes", "good", &json!({ "updated_at": 1 })).await.unwrap();
        sqlx::query("INSERT INTO documents (collection, id, body, updated_at) VALUES ('notes', 'bad', '{not json', 0)")
            .execute(db.pool())
            .await
            .unwrap();

        let docs = repo
            .query("notes", &DocumentQuery::new().order_by(OrderBy::desc("updated_at")))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "good");
        assert!(repo.get("notes", "bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_unsafe_field_name() {
        let (_db, repo) = repo().await;
        let query = DocumentQuery::new().filter(Filter::eq("name')--", "x"));
        let err = repo.query("villages", &query).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidQuery(_)));
    }
}
