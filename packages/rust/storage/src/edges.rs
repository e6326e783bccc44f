//! Graph edge store.
//!
//! Edges are keyed by `(v_from, v_to)`. Each bulk write runs inside one
//! transaction: the whole batch lands or none of it does.

use std::collections::HashSet;

use libsql::params::Params;
use libsql::{Connection, Value, params};
use tracing::{debug, instrument};

use bulkingest_shared::{BulkWriteOutcome, Edge, EdgeKey, Result, WriteMode};

use crate::adapter::{BulkIngestible, StoreAdapter};
use crate::{Storage, transport};

/// Which edges a query or deletion covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeFilter {
    All,
    /// Edges leaving the node.
    From(i64),
    /// Edges entering the node.
    To(i64),
    /// Edges with the node at either end.
    Touching(i64),
}

impl EdgeFilter {
    fn sql(self) -> (&'static str, Params) {
        match self {
            Self::All => ("1 = 1", Params::None),
            Self::From(v) => ("v_from = ?1", Params::Positional(vec![Value::Integer(v)])),
            Self::To(v) => ("v_to = ?1", Params::Positional(vec![Value::Integer(v)])),
            Self::Touching(v) => (
                "(v_from = ?1 OR v_to = ?1)",
                Params::Positional(vec![Value::Integer(v)]),
            ),
        }
    }
}

/// Edge direction relative to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Edge view over a [`Storage`].
pub struct EdgeStore<'a> {
    storage: &'a Storage,
}

impl<'a> EdgeStore<'a> {
    pub(crate) fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn conn(&self) -> &Connection {
        self.storage.conn()
    }

    /// All edges matching `filter`, ordered by key.
    pub async fn find(&self, filter: EdgeFilter) -> Result<Vec<Edge>> {
        let (clause, params) = filter.sql();
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT v_from, v_to, weight, eid FROM edges WHERE {clause}
                     ORDER BY v_from, v_to"
                ),
                params,
            )
            .await
            .map_err(transport)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(transport)? {
            results.push(row_to_edge(&row)?);
        }
        Ok(results)
    }

    /// The edge between `a` and `b` in either direction, preferring `a → b`.
    pub async fn find_edge_or_inv(&self, a: i64, b: i64) -> Result<Option<Edge>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT v_from, v_to, weight, eid FROM edges
                 WHERE (v_from = ?1 AND v_to = ?2) OR (v_from = ?2 AND v_to = ?1)
                 ORDER BY (v_from = ?1) DESC
                 LIMIT 1",
                params![a, b],
            )
            .await
            .map_err(transport)?;

        match rows.next().await.map_err(transport)? {
            Some(row) => Ok(Some(row_to_edge(&row)?)),
            None => Ok(None),
        }
    }

    /// Nodes sharing an edge with any member of `group`, excluding the
    /// group itself.
    pub async fn neighbors_of_group(&self, group: &[i64]) -> Result<HashSet<i64>> {
        if group.is_empty() {
            return Ok(HashSet::new());
        }
        let placeholders: Vec<String> = (1..=group.len()).map(|i| format!("?{i}")).collect();
        let list = placeholders.join(", ");
        let values = group.iter().map(|&v| Value::Integer(v)).collect();
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT v_from, v_to FROM edges WHERE v_from IN ({list}) OR v_to IN ({list})"),
                Params::Positional(values),
            )
            .await
            .map_err(transport)?;

        let mut nodes = HashSet::new();
        while let Some(row) = rows.next().await.map_err(transport)? {
            nodes.insert(row.get::<i64>(0).map_err(transport)?);
            nodes.insert(row.get::<i64>(1).map_err(transport)?);
        }
        for v in group {
            nodes.remove(v);
        }
        Ok(nodes)
    }

    /// Number of distinct nodes appearing at either end of any edge.
    pub async fn count_nodes(&self) -> Result<u64> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM (SELECT v_from AS v FROM edges UNION SELECT v_to FROM edges)",
                params![],
            )
            .await
            .map_err(transport)?;
        single_count(&mut rows).await
    }

    /// Number of edges at `v` in `direction` and the sum of their weights.
    pub async fn degree(&self, v: i64, direction: Direction) -> Result<(u64, f64)> {
        let filter = match direction {
            Direction::Outgoing => EdgeFilter::From(v),
            Direction::Incoming => EdgeFilter::To(v),
            Direction::Both => EdgeFilter::Touching(v),
        };
        let (clause, params) = filter.sql();
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT COUNT(*), COALESCE(SUM(weight), 0.0) FROM edges WHERE {clause}"),
                params,
            )
            .await
            .map_err(transport)?;

        match rows.next().await.map_err(transport)? {
            Some(row) => {
                let count = row.get::<i64>(0).map_err(transport)?;
                let weight = row.get::<f64>(1).unwrap_or(0.0);
                Ok((count as u64, weight))
            }
            None => Ok((0, 0.0)),
        }
    }

    /// Largest explicit edge id, if any edge carries one.
    pub async fn biggest_edge_id(&self) -> Result<Option<i64>> {
        let mut rows = self
            .conn()
            .query("SELECT MAX(eid) FROM edges", params![])
            .await
            .map_err(transport)?;
        match rows.next().await.map_err(transport)? {
            Some(row) => Ok(row.get::<i64>(0).ok()),
            None => Ok(None),
        }
    }

    /// Delete every edge touching `v`.
    pub async fn remove_node(&self, v: i64) -> Result<u64> {
        self.delete_many(&EdgeFilter::Touching(v)).await
    }

    /// Delete every edge.
    pub async fn remove_all(&self) -> Result<u64> {
        self.delete_many(&EdgeFilter::All).await
    }
}

impl StoreAdapter for EdgeStore<'_> {
    type Entity = Edge;
    type Filter = EdgeFilter;

    async fn find_one(&self, key: &EdgeKey) -> Result<Option<Edge>> {
        let mut rows = self
            .conn()
            .query(
                "SELECT v_from, v_to, weight, eid FROM edges WHERE v_from = ?1 AND v_to = ?2",
                params![key.from_id, key.to_id],
            )
            .await
            .map_err(transport)?;

        match rows.next().await.map_err(transport)? {
            Some(row) => Ok(Some(row_to_edge(&row)?)),
            None => Ok(None),
        }
    }

    async fn delete_one(&self, key: &EdgeKey) -> Result<bool> {
        self.storage.check_writable()?;
        let deleted = self
            .conn()
            .execute(
                "DELETE FROM edges WHERE v_from = ?1 AND v_to = ?2",
                params![key.from_id, key.to_id],
            )
            .await
            .map_err(transport)?;
        Ok(deleted >= 1)
    }

    async fn delete_many(&self, filter: &EdgeFilter) -> Result<u64> {
        self.storage.check_writable()?;
        let (clause, params) = filter.sql();
        let deleted = self
            .conn()
            .execute(&format!("DELETE FROM edges WHERE {clause}"), params)
            .await
            .map_err(transport)?;
        Ok(deleted)
    }

    async fn count(&self, filter: &EdgeFilter) -> Result<u64> {
        let (clause, params) = filter.sql();
        let mut rows = self
            .conn()
            .query(&format!("SELECT COUNT(*) FROM edges WHERE {clause}"), params)
            .await
            .map_err(transport)?;
        single_count(&mut rows).await
    }
}

impl BulkIngestible for EdgeStore<'_> {
    /// Transactional writes are kept small.
    const MAX_BATCH_SIZE: usize = 1000;

    #[instrument(skip_all, fields(items = items.len(), %mode))]
    async fn bulk_write(&self, items: &[Edge], mode: WriteMode) -> Result<BulkWriteOutcome> {
        self.storage.check_writable()?;
        let tx = self.conn().transaction().await.map_err(transport)?;

        let outcome = match write_edges(&tx, items, mode).await {
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
            "edge batch committed"
        );
        Ok(outcome)
    }
}

async fn write_edges(conn: &Connection, items: &[Edge], mode: WriteMode) -> Result<BulkWriteOutcome> {
    let mut outcome = BulkWriteOutcome::default();
    for edge in items {
        match mode {
            WriteMode::Insert => {
                let inserted = conn
                    .execute(
                        "INSERT OR IGNORE INTO edges (v_from, v_to, weight, eid)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![edge.from_id, edge.to_id, edge.weight, edge.id],
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
                        "UPDATE edges SET weight = ?3, eid = COALESCE(?4, eid)
                         WHERE v_from = ?1 AND v_to = ?2",
                        params![edge.from_id, edge.to_id, edge.weight, edge.id],
                    )
                    .await
                    .map_err(transport)?;
                if updated > 0 {
                    outcome.updated += 1;
                    continue;
                }
                conn.execute(
                    "INSERT INTO edges (v_from, v_to, weight, eid) VALUES (?1, ?2, ?3, ?4)",
                    params![edge.from_id, edge.to_id, edge.weight, edge.id],
                )
                .await
                .map_err(transport)?;
                outcome.created += 1;
            }
        }
    }
    Ok(outcome)
}

/// Convert a database row to an [`Edge`].
fn row_to_edge(row: &libsql::Row) -> Result<Edge> {
    Ok(Edge {
        from_id: row.get::<i64>(0).map_err(transport)?,
        to_id: row.get::<i64>(1).map_err(transport)?,
        weight: row.get::<f64>(2).map_err(transport)?,
        id: row.get::<i64>(3).ok(),
    })
}

pub(crate) async fn single_count(rows: &mut libsql::Rows) -> Result<u64> {
    match rows.next().await.map_err(transport)? {
        Some(row) => Ok(row.get::<i64>(0).map_err(transport)? as u64),
        None => Ok(0),
    }
}
