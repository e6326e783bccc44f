//! SQL migration definitions for the bulkingest database.
//!
//! Migrations are applied in order on database open. Each migration records
//! its own version in `schema_migrations`.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: edges, documents, import_jobs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Graph edges, keyed by (v_from, v_to)
CREATE TABLE IF NOT EXISTS edges (
    v_from INTEGER NOT NULL,
    v_to   INTEGER NOT NULL,
    weight REAL NOT NULL DEFAULT 1.0,
    eid    INTEGER,
    PRIMARY KEY (v_from, v_to)
);

CREATE INDEX IF NOT EXISTS idx_edges_v_to ON edges(v_to);
CREATE INDEX IF NOT EXISTS idx_edges_eid ON edges(eid);

-- Schemaless documents, body stored as JSON
CREATE TABLE IF NOT EXISTS documents (
    id   TEXT PRIMARY KEY,
    body TEXT NOT NULL
);

-- Import job history
CREATE TABLE IF NOT EXISTS import_jobs (
    id          TEXT PRIMARY KEY,
    kind        TEXT NOT NULL,
    source      TEXT NOT NULL,
    mode        TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

CREATE INDEX IF NOT EXISTS idx_import_jobs_started ON import_jobs(started_at);

INSERT OR IGNORE INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
