//! SQLite-backed [`RemoteStore`] over `goldtea_db::DocumentRepository`.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use goldtea_core::{Collection, Document, DocumentQuery};
use goldtea_db::{Database, DocumentRepository};

use super::RemoteStore;
use crate::error::SyncResult;

/// Document store kept in the local SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    documents: DocumentRepository,
}

impl SqliteStore {
    pub fn new(db: &Database) -> Self {
        SqliteStore {
            documents: db.documents(),
        }
    }

    pub fn from_repository(documents: DocumentRepository) -> Self {
        SqliteStore { documents }
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn get_by_id(&self, collection: Collection, id: &str) -> SyncResult<Option<Document>> {
        Ok(self.documents.get(collection.as_str(), id).await?)
    }

    async fn query(&self, collection: Collection, query: &DocumentQuery) -> SyncResult<Vec<Document>> {
        let docs = self.documents.query(collection.as_str(), query).await?;
        debug!(collection = %collection, count = docs.len(), "sqlite query");
        Ok(docs)
    }

    async fn upsert(&self, collection: Collection, id: &str, data: &Value) -> SyncResult<()> {
        Ok(self.documents.upsert(collection.as_str(), id, data).await?)
    }

    async fn delete(&self, collection: Collection, id: &str) -> SyncResult<()> {
        self.documents.delete(collection.as_str(), id).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
