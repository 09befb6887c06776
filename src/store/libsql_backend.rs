//! libSQL backend — durable drafts and a local document database.
//!
//! Supports local file and in-memory databases. Implements both
//! [`DraftStorage`] and [`DocumentDatabase`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use serde_json::Value;
use tracing::info;

use super::migrations;
use super::traits::{DocumentDatabase, DraftStorage, StoredDocument, WriteOptions, merge_documents};
use crate::error::StoreError;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&backend.conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&backend.conn).await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn next_seq(&self, collection: &str) -> Result<i64, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM documents WHERE collection = ?1",
                params![collection],
            )
            .await
            .map_err(|e| StoreError::Query(format!("next_seq: {e}")))?;
        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(1)),
            Ok(None) => Ok(1),
            Err(e) => Err(StoreError::Query(format!("next_seq: {e}"))),
        }
    }
}

// ── Drafts ──────────────────────────────────────────────────────────────

#[async_trait]
impl DraftStorage for LibSqlBackend {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT value FROM drafts WHERE key = ?1", params![key])
            .await
            .map_err(|e| StoreError::Query(format!("get_item: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("get_item: {e}")))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("get_item: {e}"))),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO drafts (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set_item: {e}")))?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.conn()
            .execute("DELETE FROM drafts WHERE key = ?1", params![key])
            .await
            .map_err(|e| StoreError::Query(format!("remove_item: {e}")))?;
        Ok(())
    }
}

// ── Documents ───────────────────────────────────────────────────────────

#[async_trait]
impl DocumentDatabase for LibSqlBackend {
    async fn write(
        &self,
        collection: &str,
        doc_id: &str,
        payload: &Value,
        options: WriteOptions,
    ) -> Result<(), StoreError> {
        let data = if options.merge {
            match self.read(collection, doc_id).await? {
                Some(existing) => merge_documents(existing, payload),
                None => payload.clone(),
            }
        } else {
            payload.clone()
        };
        let body =
            serde_json::to_string(&data).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let seq = self.next_seq(collection).await?;
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "INSERT INTO documents (collection, doc_id, body, seq, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (collection, doc_id) DO UPDATE SET body = ?3, seq = ?4, updated_at = ?5",
                params![collection, doc_id, body, seq, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("write: {e}")))?;
        Ok(())
    }

    async fn read(&self, collection: &str, doc_id: &str) -> Result<Option<Value>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT body FROM documents WHERE collection = ?1 AND doc_id = ?2",
                params![collection, doc_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("read: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let body: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("read: {e}")))?;
                let value = serde_json::from_str(&body)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("read: {e}"))),
        }
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT doc_id, body FROM documents WHERE collection = ?1 ORDER BY seq DESC",
                params![collection],
            )
            .await
            .map_err(|e| StoreError::Query(format!("list: {e}")))?;

        let mut docs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("list: {e}")))?
        {
            let id: String = row
                .get(0)
                .map_err(|e| StoreError::Query(format!("list: {e}")))?;
            let body: String = row
                .get(1)
                .map_err(|e| StoreError::Query(format!("list: {e}")))?;
            let data =
                serde_json::from_str(&body).map_err(|e| StoreError::Serialization(e.to_string()))?;
            docs.push(StoredDocument { id, data });
        }
        Ok(docs)
    }
}
