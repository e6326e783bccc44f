//! Document store.
//!
//! Documents are stored whole as JSON, keyed by the text form of `_id`.
//! Integer and string ids share one key space, so `1` and `"1"` address
//! the same document.

use libsql::params::Params;
use libsql::{Connection, Value, params};
use tracing::{debug, instrument, warn};

use bulkingest_shared::{BulkWriteOutcome, Document, IngestError, RecordId, Result, WriteMode};

use crate::adapter::{BulkIngestible, StoreAdapter};
use crate::edges::single_count;
use crate::{Storage, transport};

/// Which documents a query or deletion covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocFilter {
    All,
    Ids(Vec<RecordId>),
}

impl DocFilter {
    fn sql(&self) -> (String, Params) {
        match self {
            Self::All => ("1 = 1".into(), Params::None),
            Self::Ids(ids) if ids.is_empty() => ("0 = 1".into(), Params::None),
            Self::Ids(ids) => {
                let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
                let values = ids.iter().map(|id| Value::Text(id.to_string())).collect();
                (
                    format!("id IN ({})", placeholders.join(", ")),
                    Params::Positional(values),
                )
            }
        }
    }
}

/// Document view over a [`Storage`].
pub struct DocStore<'a> {
    storage: &'a Storage,
}

impl<'a> DocStore<'a> {
    pub(crate) fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn conn(&self) -> &Connection {
        self.storage.conn()
    }

    /// Delete every document.
    pub async fn remove_all(&self) -> Result<u64> {
        self.delete_many(&DocFilter::All).await
    }
}

impl StoreAdapter for DocStore<'_> {
    type Entity = Document;
    type Filter = DocFilter;

    async fn find_one(&self, key: &RecordId) -> Result<Option<Document>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT body FROM documents WHERE id = ?1",
                params![key.to_string()],
            )
            .await
            .map_err(transport)?;

        match rows.next().await.map_err(transport)? {
            Some(row) => {
                let body: String = row.get(0).map_err(transport)?;
                let doc = serde_json::from_str(&body).map_err(|e| {
                    IngestError::Transport(format!("corrupt document body for '{key}': {e}"))
                })?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    async fn delete_one(&self, key: &RecordId) -> Result<bool> {
        self.storage.check_writable()?;
        let deleted = self
            .conn()
            .execute(
                "DELETE FROM documents WHERE id = ?1",
                params![key.to_string()],
            )
            .await
            .map_err(transport)?;
        Ok(deleted >= 1)
    }

    async fn delete_many(&self, filter: &DocFilter) -> Result<u64> {
        self.storage.check_writable()?;
        let (clause, params) = filter.sql();
        self.conn()
            .execute(&format!("DELETE FROM documents WHERE {clause}"), params)
            .await
            .map_err(transport)
    }

    async fn count(&self, filter: &DocFilter) -> Result<u64> {
        let (clause, params) = filter.sql();
        let mut rows = self
            .conn()
            .query(&format!("SELECT COUNT(*) FROM documents WHERE {clause}"), params)
            .await
            .map_err(transport)?;
        single_count(&mut rows).await
    }
}

impl BulkIngestible for DocStore<'_> {
    const MAX_BATCH_SIZE: usize = 100_000;

    #[instrument(skip_all, fields(items = items.len(), %mode))]
    async fn bulk_write(&self, items: &[Document], mode: WriteMode) -> Result<BulkWriteOutcome> {
        self.storage.check_writable()?;
        let tx = self.conn().transaction().await.map_err(transport)?;

        let outcome = match write_docs(&tx, items, mode).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(e);
            }
        };
        tx.commit().await.map_err(transport)?;

        debug!(
            created = outcome.created,
            updated = outcome.updated,
            rejected = outcome.rejected,
            "document batch committed"
        );
        Ok(outcome)
    }
}

async fn write_docs(
    conn: &Connection,
    items: &[Document],
    mode: WriteMode,
) -> Result<BulkWriteOutcome> {
    let mut outcome = BulkWriteOutcome::default();
    for doc in items {
        let Some(id) = doc.id() else {
            warn!("document without _id rejected");
            outcome.rejected += 1;
            continue;
        };
        let id = id.to_string();
        let body = match serde_json::to_string(doc) {
            Ok(body) => body,
            Err(e) => {
                warn!(%id, error = %e, "document not serializable, rejected");
                outcome.rejected += 1;
                continue;
            }
        };

        match mode {
            WriteMode::Insert => {
                let inserted = conn
                    .execute(
                        "INSERT OR IGNORE INTO documents (id, body) VALUES (?1, ?2)",
                        params![id.as_str(), body.as_str()],
                    )
                    .await
                    .map_err(transport)?;
                if inserted == 0 {
                    outcome.rejected += 1;
                } else {
                    outcome.created += 1;
                }
            }
            WriteMode::Upsert => {
                let updated = conn
                    .execute(
                        "UPDATE documents SET body = ?2 WHERE id = ?1",
                        params![id.as_str(), body.as_str()],
                    )
                    .await
                    .map_err(transport)?;
                if updated > 0 {
                    outcome.updated += 1;
                    continue;
                }
                conn.execute(
                    "INSERT INTO documents (id, body) VALUES (?1, ?2)",
                    params![id.as_str(), body.as_str()],
                )
                .await
                .map_err(transport)?;
                outcome.created += 1;
            }
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_storage;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => Document::from(map),
            other => panic!("not an object: {other}"),
        }
    }

    #[tokio::test]
    async fn upsert_then_find() {
        let storage = test_storage().await;
        let store = storage.docs();

        let outcome = store
            .bulk_write(
                &[doc(json!({"_id": 1, "text": "ab"})), doc(json!({"_id": "b", "text": "c"}))],
                WriteMode::Upsert,
            )
            .await
            .unwrap();
        assert_eq!(outcome, BulkWriteOutcome { created: 2, updated: 0, rejected: 0 });

        let again = store
            .bulk_write(&[doc(json!({"_id": 1, "text": "new"}))], WriteMode::Upsert)
            .await
            .unwrap();
        assert_eq!(again.updated, 1);

        let found = store.find_one(&RecordId::Int(1)).await.unwrap().expect("doc 1");
        assert_eq!(found.get("text"), Some(&json!("new")));
        assert_eq!(found.id(), Some(RecordId::Int(1)));
        assert_eq!(store.count(&DocFilter::All).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn missing_id_is_rejected_not_fatal() {
        let storage = test_storage().await;
        let store = storage.docs();

        let outcome = store
            .bulk_write(
                &[doc(json!({"text": "orphan"})), doc(json!({"_id": "x"}))],
                WriteMode::Upsert,
            )
            .await
            .unwrap();
        assert_eq!(outcome.rejected, 1);
        assert_eq!(outcome.created, 1);
    }

    #[tokio::test]
    async fn insert_rejects_existing_ids() {
        let storage = test_storage().await;
        let store = storage.docs();

        store
            .bulk_write(&[doc(json!({"_id": "a"}))], WriteMode::Insert)
            .await
            .unwrap();
        let outcome = store
            .bulk_write(&[doc(json!({"_id": "a"})), doc(json!({"_id": "b"}))], WriteMode::Insert)
            .await
            .unwrap();
        assert_eq!(outcome, BulkWriteOutcome { created: 1, updated: 0, rejected: 1 });
    }

    #[tokio::test]
    async fn filtered_count_and_delete() {
        let storage = test_storage().await;
        let store = storage.docs();
        store
            .bulk_write(
                &[doc(json!({"_id": "a"})), doc(json!({"_id": "b"})), doc(json!({"_id": 3}))],
                WriteMode::Upsert,
            )
            .await
            .unwrap();

        let some = DocFilter::Ids(vec![RecordId::from("a"), RecordId::Int(3), RecordId::from("zz")]);
        assert_eq!(store.count(&some).await.unwrap(), 2);
        assert_eq!(store.count(&DocFilter::Ids(vec![])).await.unwrap(), 0);

        assert!(store.delete_one(&RecordId::from("b")).await.unwrap());
        assert_eq!(store.delete_many(&some).await.unwrap(), 2);
        assert_eq!(store.remove_all().await.unwrap(), 0);
    }
}
