//! Typed error taxonomy for the storage engine.
//!
//! Callers branch on these variants: quota exhaustion and duplicate keys get
//! distinct recovery messages in the application shell, so they must stay
//! distinguishable by type rather than by message string.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file cannot be opened at all.
    #[error("cannot open database at {path}: {source}")]
    Connection {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// `add` was called with a primary key that already exists.
    #[error("a {collection} record with id {id} already exists")]
    DuplicateKey {
        collection: &'static str,
        id: String,
    },

    /// Persistent storage capacity is exhausted. Not retried automatically.
    #[error("storage quota exhausted while writing to {collection}")]
    QuotaExceeded { collection: &'static str },

    /// The underlying transaction aborted for a reason other than quota or
    /// key collision. Callers may retry the whole operation.
    #[error("transaction failed: {0}")]
    Transaction(#[from] rusqlite::Error),

    /// A record could not be serialized or deserialized.
    #[error("cannot encode or decode {collection} record: {source}")]
    Codec {
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A record violates a collection invariant before it reaches storage.
    #[error("invalid {collection} record: {reason}")]
    InvalidRecord {
        collection: &'static str,
        reason: String,
    },

    /// A schema or data migration step failed. Fatal at startup; the only
    /// sanctioned recovery is the destructive database reset.
    #[error("migration to version {version} failed")]
    Migration {
        version: u32,
        #[source]
        source: Box<StoreError>,
    },

    /// The physical database could not be deleted because another connection
    /// still holds it open. A reset-pending session flag has been set so the
    /// next startup retries the reset.
    #[error("deleting database at {path} blocked by another open connection")]
    BlockedDelete { path: PathBuf },

    /// Filesystem failure outside the database proper (settings area,
    /// session flags, database file removal).
    #[error("i/o failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Map a rusqlite write failure onto the store taxonomy.
///
/// SQLITE_CONSTRAINT on the insert path means the primary key collided;
/// SQLITE_FULL means the database has hit its page limit or the disk is full.
pub(crate) fn classify_write(
    collection: &'static str,
    id: &str,
    err: rusqlite::Error,
) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::DuplicateKey {
                collection,
                id: id.to_owned(),
            }
        }
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::DiskFull => {
            StoreError::QuotaExceeded { collection }
        }
        other => StoreError::Transaction(other),
    }
}
