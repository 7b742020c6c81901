//! Generic durable record storage over SQLite.
//!
//! One [`RecordStore`] instance covers one logical collection (table) in the
//! shared database file. Records are serde-serialized JSON documents stored
//! in a `record` column, with their secondary-index fields denormalized into
//! dedicated indexed columns for equality scans.
//!
//! Every operation opens its own connection and closes it on completion, so
//! independent call sites never coordinate connection lifetimes. Opening a
//! connection applies any pending schema migration steps first, which means
//! no operation can ever run against a stale shape.

use std::marker::PhantomData;
use std::path::PathBuf;

use rusqlite::types::Value;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{classify_write, StoreError};
use super::schema;

/// Static description of a collection: its table name and the secondary-index
/// columns it maintains, in declaration order.
pub struct Collection {
    pub name: &'static str,
    pub indexes: &'static [&'static str],
}

/// A value extracted from a record for one secondary-index column.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    Text(String),
    Integer(i64),
    Null,
}

impl From<IndexValue> for Value {
    fn from(value: IndexValue) -> Self {
        match value {
            IndexValue::Text(s) => Value::Text(s),
            IndexValue::Integer(i) => Value::Integer(i),
            IndexValue::Null => Value::Null,
        }
    }
}

/// A storable record: a serde document with a string primary key and one
/// index value per column named in its [`Collection`].
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn key(&self) -> &str;

    /// Index values aligned with `COLLECTION.indexes`.
    fn index_values(&self) -> Vec<IndexValue>;
}

pub struct RecordStore<R> {
    db_path: PathBuf,
    _record: PhantomData<R>,
}

impl<R> Clone for RecordStore<R> {
    fn clone(&self) -> Self {
        Self {
            db_path: self.db_path.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> RecordStore<R> {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            _record: PhantomData,
        }
    }

    /// Open a connection, creating the database file and applying pending
    /// schema steps as needed.
    fn open(&self) -> Result<Connection, StoreError> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }
        let conn = Connection::open(&self.db_path).map_err(|e| StoreError::Connection {
            path: self.db_path.clone(),
            source: e,
        })?;
        schema::apply_pending(&conn)?;
        Ok(conn)
    }

    /// Open and immediately close a connection, forcing the schema up to
    /// date without touching any records.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        self.open().map(|_| ())
    }

    /// Insert a new record. Fails with [`StoreError::DuplicateKey`] if the
    /// primary key is already present; the existing record is left intact.
    pub fn add(&self, record: &R) -> Result<(), StoreError> {
        self.write(record, "INSERT")
    }

    /// Insert or replace by primary key.
    pub fn put(&self, record: &R) -> Result<(), StoreError> {
        self.write(record, "INSERT OR REPLACE")
    }

    fn write(&self, record: &R, verb: &str) -> Result<(), StoreError> {
        let conn = self.open()?;
        let json = serde_json::to_string(record).map_err(|e| StoreError::Codec {
            collection: R::COLLECTION.name,
            source: e,
        })?;

        let mut columns = vec!["id"];
        columns.extend_from_slice(R::COLLECTION.indexes);
        columns.push("record");
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "{verb} INTO {} ({}) VALUES ({})",
            R::COLLECTION.name,
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut params = vec![Value::Text(record.key().to_owned())];
        params.extend(record.index_values().into_iter().map(Value::from));
        params.push(Value::Text(json));

        conn.execute(&sql, rusqlite::params_from_iter(params))
            .map_err(|e| classify_write(R::COLLECTION.name, record.key(), e))?;
        Ok(())
    }

    /// Point lookup. An absent key is `Ok(None)`, not an error.
    pub fn get(&self, key: &str) -> Result<Option<R>, StoreError> {
        let conn = self.open()?;
        let sql = format!("SELECT record FROM {} WHERE id = ?1", R::COLLECTION.name);
        let result = conn.query_row(&sql, [key], |row| row.get::<_, String>(0));
        match result {
            Ok(json) => Ok(Some(Self::decode(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Transaction(e)),
        }
    }

    /// Full collection scan. Unordered at this layer; callers sort.
    pub fn get_all(&self) -> Result<Vec<R>, StoreError> {
        let conn = self.open()?;
        let sql = format!("SELECT record FROM {}", R::COLLECTION.name);
        Self::collect(&conn, &sql, [])
    }

    /// Scan restricted to records whose index column equals `value`.
    pub fn get_all_by_index(
        &self,
        index: &'static str,
        value: IndexValue,
    ) -> Result<Vec<R>, StoreError> {
        assert!(
            R::COLLECTION.indexes.contains(&index),
            "{} has no index named {index}",
            R::COLLECTION.name
        );
        let conn = self.open()?;
        let sql = format!(
            "SELECT record FROM {} WHERE {index} = ?1",
            R::COLLECTION.name
        );
        Self::collect(&conn, &sql, [Value::from(value)])
    }

    fn collect<P: rusqlite::Params>(
        conn: &Connection,
        sql: &str,
        params: P,
    ) -> Result<Vec<R>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;
        let mut records = Vec::new();
        for row in rows {
            records.push(Self::decode(&row?)?);
        }
        Ok(records)
    }

    fn decode(json: &str) -> Result<R, StoreError> {
        serde_json::from_str(json).map_err(|e| StoreError::Codec {
            collection: R::COLLECTION.name,
            source: e,
        })
    }

    /// Remove one record by key. Deleting an absent key succeeds.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.open()?;
        let sql = format!("DELETE FROM {} WHERE id = ?1", R::COLLECTION.name);
        conn.execute(&sql, [key])?;
        Ok(())
    }

    /// Remove every record in the collection.
    pub fn clear(&self) -> Result<(), StoreError> {
        let conn = self.open()?;
        let sql = format!("DELETE FROM {}", R::COLLECTION.name);
        conn.execute(&sql, [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    // A minimal record stored in the photos table shape.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Doc {
        id: String,
        timestamp: i64,
        label: String,
    }

    impl Record for Doc {
        const COLLECTION: Collection = Collection {
            name: "photos",
            indexes: &["timestamp", "project_id"],
        };

        fn key(&self) -> &str {
            &self.id
        }

        fn index_values(&self) -> Vec<IndexValue> {
            vec![
                IndexValue::Integer(self.timestamp),
                IndexValue::Text(self.label.clone()),
            ]
        }
    }

    fn store() -> (TempDir, RecordStore<Doc>) {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path().join("test.db"));
        (dir, store)
    }

    fn doc(id: &str, timestamp: i64, label: &str) -> Doc {
        Doc {
            id: id.to_owned(),
            timestamp,
            label: label.to_owned(),
        }
    }

    #[test]
    fn add_then_get_round_trips() {
        let (_dir, store) = store();
        let d = doc("a", 10, "x");
        store.add(&d).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(d));
    }

    #[test]
    fn get_absent_key_is_none() {
        let (_dir, store) = store();
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn duplicate_add_rejects_and_preserves_original() {
        let (_dir, store) = store();
        let original = doc("a", 10, "x");
        store.add(&original).unwrap();

        let err = store.add(&doc("a", 99, "y")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert_eq!(store.get("a").unwrap(), Some(original));
    }

    #[test]
    fn put_replaces_existing_record() {
        let (_dir, store) = store();
        store.add(&doc("a", 10, "x")).unwrap();
        let replacement = doc("a", 20, "y");
        store.put(&replacement).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(replacement));
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, store) = store();
        store.add(&doc("a", 10, "x")).unwrap();
        store.delete("missing").unwrap();
        assert_eq!(store.get_all().unwrap().len(), 1);
        store.delete("a").unwrap();
        store.delete("a").unwrap();
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn index_scan_returns_only_matching_records() {
        let (_dir, store) = store();
        store.add(&doc("a", 1, "red")).unwrap();
        store.add(&doc("b", 2, "blue")).unwrap();
        store.add(&doc("c", 3, "red")).unwrap();

        let red = store
            .get_all_by_index("project_id", IndexValue::Text("red".into()))
            .unwrap();
        let mut ids: Vec<&str> = red.iter().map(|d| d.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, ["a", "c"]);
    }

    #[test]
    fn clear_empties_the_collection() {
        let (_dir, store) = store();
        store.add(&doc("a", 1, "x")).unwrap();
        store.add(&doc("b", 2, "x")).unwrap();
        store.clear().unwrap();
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    #[should_panic(expected = "no index named")]
    fn unknown_index_is_a_caller_bug() {
        let (_dir, store) = store();
        store.ensure_schema().unwrap();
        let _ = store.get_all_by_index("nope", IndexValue::Null);
    }
}
