//! Ordered schema migration steps.
//!
//! The stored version lives in `PRAGMA user_version`. Steps are applied
//! sequentially from the stored version to [`TARGET_SCHEMA_VERSION`], never
//! skipped, never reordered. Every statement is idempotent (`IF NOT EXISTS`)
//! so a crash between a step and its version bump is safe to re-run.
//!
//! Version 2 was a data-only migration in the application's history and has
//! no shape step here; it is tracked separately by the schema migrator.

use rusqlite::Connection;

use super::error::StoreError;

pub struct SchemaStep {
    pub version: u32,
    pub sql: &'static str,
}

pub const TARGET_SCHEMA_VERSION: u32 = 3;

pub const SCHEMA_STEPS: &[SchemaStep] = &[
    // v1: photos only, ordered by capture time. No project concept yet.
    SchemaStep {
        version: 1,
        sql: r#"
CREATE TABLE IF NOT EXISTS photos (
    id TEXT PRIMARY KEY,
    timestamp INTEGER NOT NULL,
    project_id TEXT,
    record TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_photos_timestamp ON photos(timestamp);
"#,
    },
    // v3: project scoping. Photos gain a project_id index, and the projects
    // collection appears with its own secondary indexes.
    SchemaStep {
        version: 3,
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_photos_project_id ON photos(project_id);

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    record TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_projects_type ON projects(type);
CREATE INDEX IF NOT EXISTS idx_projects_created_at ON projects(created_at);
"#,
    },
];

pub fn current_version(conn: &Connection) -> Result<u32, StoreError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version as u32)
}

/// Apply every step newer than the stored version, bumping the stored
/// version after each one. Called on every connection open, so repositories
/// can never observe a half-upgraded schema.
pub fn apply_pending(conn: &Connection) -> Result<(), StoreError> {
    let stored = current_version(conn)?;
    for step in SCHEMA_STEPS.iter().filter(|s| s.version > stored) {
        tracing::info!(version = step.version, "applying schema migration step");
        conn.execute_batch(step.sql)
            .map_err(|e| StoreError::Migration {
                version: step.version,
                source: Box::new(StoreError::Transaction(e)),
            })?;
        conn.pragma_update(None, "user_version", step.version)
            .map_err(|e| StoreError::Migration {
                version: step.version,
                source: Box::new(StoreError::Transaction(e)),
            })?;
    }
    Ok(())
}
