//! libSQL (embedded) storage layer for bulkingest.
//!
//! The [`Storage`] struct wraps a libSQL database holding graph edges,
//! documents and the import job log. [`EdgeStore`] and [`DocStore`] are
//! borrowed views implementing the [`StoreAdapter`] and [`BulkIngestible`]
//! contracts the ingestion pipeline writes through.
//!
//! **Access rules:**
//! - Importers: read-write via [`Storage::open`]
//! - Inspection: read-only via [`Storage::open_readonly`]

pub mod adapter;
pub mod docs;
pub mod edges;
mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bulkingest_shared::{IngestError, Result, WriteMode};

pub use adapter::{BulkIngestible, KeyOf, StoreAdapter};
pub use docs::{DocFilter, DocStore};
pub use edges::{Direction, EdgeFilter, EdgeStore};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IngestError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(transport)?;

        let conn = db.connect().map_err(transport)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(transport)?;

        let conn = db.connect().map_err(transport)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Edge view over this database.
    pub fn edges(&self) -> EdgeStore<'_> {
        EdgeStore::new(self)
    }

    /// Document view over this database.
    pub fn docs(&self) -> DocStore<'_> {
        DocStore::new(self)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    IngestError::Transport(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    pub(crate) fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(IngestError::Transport(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Import job operations
    // -----------------------------------------------------------------------

    /// Record the start of an import. Returns the generated job ID.
    pub async fn insert_import_job(
        &self,
        kind: &str,
        source: &str,
        mode: WriteMode,
    ) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO import_jobs (id, kind, source, mode, started_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.as_str(), kind, source, mode.to_string(), now.as_str()],
            )
            .await
            .map_err(transport)?;
        Ok(id)
    }

    /// Mark an import job finished and attach its stats.
    pub async fn finish_import_job(&self, job_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE import_jobs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, job_id],
            )
            .await
            .map_err(transport)?;
        Ok(())
    }

    /// List import jobs, most recent first.
    pub async fn list_import_jobs(&self) -> Result<Vec<ImportJob>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, kind, source, mode, started_at, finished_at, stats_json
                 FROM import_jobs ORDER BY started_at DESC, id DESC",
                params![],
            )
            .await
            .map_err(transport)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(transport)? {
            results.push(ImportJob {
                id: row.get::<String>(0).map_err(transport)?,
                kind: row.get::<String>(1).map_err(transport)?,
                source: row.get::<String>(2).map_err(transport)?,
                mode: row.get::<String>(3).map_err(transport)?,
                started_at: row.get::<String>(4).map_err(transport)?,
                finished_at: row.get::<String>(5).ok(),
                stats_json: row.get::<String>(6).ok(),
            });
        }
        Ok(results)
    }
}

/// One row of the import job log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: String,
    /// `edges` or `documents`.
    pub kind: String,
    /// Source path as given on the command line.
    pub source: String,
    pub mode: String,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats_json: Option<String>,
}

/// Map a driver error to a transport failure.
pub(crate) fn transport(e: libsql::Error) -> IngestError {
    IngestError::Transport(e.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Storage;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    pub(crate) async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("bulkingest_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }
}
