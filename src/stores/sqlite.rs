//! SQLite-backed vector store using the `sqlite-vec` extension.
//!
//! Each store binds to one named collection, materialized as a table
//! `chunks_<collection>`. [`clear`](super::VectorStore::clear) drops and
//! recreates that table inside a single transaction, so a rebuild of the same
//! collection replaces its contents entirely and never merges with stale
//! vectors. All statements run on `tokio-rusqlite`'s serialized connection,
//! which keeps rebuilds exclusive with respect to in-flight searches.
//!
//! Embeddings are stored as JSON arrays and compared with
//! `vec_distance_cosine(vec_f32(...), vec_f32(...))`.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use tokio_rusqlite::{Connection, ffi};

use super::{ScoredRecord, StoreError, VectorRecord, VectorStore};

/// Default collection name; mirrors the persisted database this pipeline
/// replaces on every rebuild.
pub const DEFAULT_COLLECTION: &str = "vector_db";

/// Vector store persisted in a SQLite database file.
#[derive(Debug)]
pub struct SqliteVectorStore {
    conn: Connection,
    table: String,
}

impl SqliteVectorStore {
    /// Open (or create) the database at `path` and bind to `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when the collection name is not a
    /// plain identifier, the `sqlite-vec` extension cannot be registered, or
    /// the database cannot be opened.
    pub async fn open(path: impl AsRef<Path>, collection: &str) -> Result<Self, StoreError> {
        register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Self::bind(conn, collection).await
    }

    /// Open an in-memory database bound to `collection`.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`open`](Self::open).
    pub async fn open_in_memory(collection: &str) -> Result<Self, StoreError> {
        register_sqlite_vec()?;
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Self::bind(conn, collection).await
    }

    async fn bind(conn: Connection, collection: &str) -> Result<Self, StoreError> {
        let table = table_name(collection)?;
        // Fail early if the extension did not load into this connection.
        conn.call(|conn| {
            conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Error)
        })
        .await
        .map_err(|err| StoreError::Backend(format!("sqlite-vec unavailable: {err}")))?;

        let create = create_table_sql(&table);
        conn.call(move |conn| {
            conn.execute_batch(&create)
                .map_err(tokio_rusqlite::Error::Error)
        })
        .await
        .map_err(|err| StoreError::Backend(err.to_string()))?;

        Ok(Self { conn, table })
    }

    /// Name of the backing table for this collection.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

fn table_name(collection: &str) -> Result<String, StoreError> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StoreError::Backend(format!(
            "collection name '{collection}' must match [A-Za-z0-9_]+"
        )));
    }
    Ok(format!("chunks_{collection}"))
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
           id TEXT PRIMARY KEY,\
           origin TEXT NOT NULL,\
           unit_index INTEGER NOT NULL,\
           chunk_index INTEGER NOT NULL,\
           content TEXT NOT NULL,\
           metadata TEXT NOT NULL,\
           embedding TEXT NOT NULL\
         );\
         CREATE INDEX IF NOT EXISTS idx_{table}_origin ON {table} (origin);"
    )
}

/// Register `sqlite-vec` as an auto extension, once per process.
fn register_sqlite_vec() -> Result<(), StoreError> {
    static INIT: Once = Once::new();
    static RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let outcome = unsafe {
            type ExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn = transmute::<unsafe extern "C" fn(), ExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc == 0 {
                Ok(())
            } else {
                Err(format!("sqlite-vec registration failed (code {rc})"))
            }
        };
        *RESULT.lock().expect("registration mutex poisoned") = Some(outcome);
    });

    RESULT
        .lock()
        .expect("registration mutex poisoned")
        .clone()
        .expect("registration ran but left no result")
        .map_err(StoreError::Backend)
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let table = self.table.clone();
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let embedding = serde_json::to_string(&record.embedding)
                .map_err(|err| StoreError::Backend(err.to_string()))?;
            rows.push((
                record.id,
                record.origin,
                record.unit_index as i64,
                record.chunk_index as i64,
                record.content,
                record.metadata.to_string(),
                embedding,
            ));
        }
        self.conn
            .call(move |conn| -> tokio_rusqlite::Result<()> {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Error)?;
                {
                    let mut stmt = tx
                        .prepare(&format!(
                            "INSERT OR REPLACE INTO {table} \
                             (id, origin, unit_index, chunk_index, content, metadata, embedding) \
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                        ))
                        .map_err(tokio_rusqlite::Error::Error)?;
                    for (id, origin, unit_index, chunk_index, content, metadata, embedding) in
                        &rows
                    {
                        stmt.execute((
                            id,
                            origin,
                            unit_index,
                            chunk_index,
                            content,
                            metadata,
                            embedding,
                        ))
                        .map_err(tokio_rusqlite::Error::Error)?;
                    }
                }
                tx.commit().map_err(tokio_rusqlite::Error::Error)?;
                Ok(())
            })
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let table = self.table.clone();
        let sql = format!(
            "BEGIN;\
             DROP TABLE IF EXISTS {table};\
             {create}\
             COMMIT;",
            create = create_table_sql(&table)
        );
        self.conn
            .call(move |conn| {
                conn.execute_batch(&sql)
                    .map_err(tokio_rusqlite::Error::Error)
            })
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    async fn nearest(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let table = self.table.clone();
        let query_json = serde_json::to_string(query)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        self.conn
            .call(move |conn| -> tokio_rusqlite::Result<Vec<ScoredRecord>> {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT id, origin, unit_index, chunk_index, content, metadata, \
                                embedding, \
                                vec_distance_cosine(vec_f32(embedding), vec_f32(?1)) AS distance \
                         FROM {table} \
                         ORDER BY distance ASC \
                         LIMIT {limit}"
                    ))
                    .map_err(tokio_rusqlite::Error::Error)?;

                let rows = stmt
                    .query_map([&query_json], |row| {
                        let metadata: String = row.get(5)?;
                        let embedding: String = row.get(6)?;
                        let distance: f32 = row.get(7)?;
                        Ok(ScoredRecord {
                            record: VectorRecord {
                                id: row.get(0)?,
                                origin: row.get(1)?,
                                unit_index: row.get::<_, i64>(2)? as usize,
                                chunk_index: row.get::<_, i64>(3)? as usize,
                                content: row.get(4)?,
                                metadata: serde_json::from_str(&metadata)
                                    .unwrap_or(serde_json::Value::Null),
                                embedding: serde_json::from_str(&embedding)
                                    .unwrap_or_default(),
                            },
                            similarity: 1.0 - distance,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Error)?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Error)?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let table = self.table.clone();
        self.conn
            .call(move |conn| -> tokio_rusqlite::Result<usize> {
                let count: i64 = conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })
                    .map_err(tokio_rusqlite::Error::Error)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, origin: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_owned(),
            origin: origin.to_owned(),
            unit_index: 0,
            chunk_index: 0,
            content: format!("content of {id}"),
            metadata: serde_json::json!({"doc_type": "text"}),
            embedding,
        }
    }

    #[tokio::test]
    async fn roundtrip_and_similarity_order() {
        let store = SqliteVectorStore::open_in_memory("vector_db").await.unwrap();
        store
            .upsert(vec![
                record("a", "one.txt", vec![1.0, 0.0]),
                record("b", "two.txt", vec![0.0, 1.0]),
                record("c", "one.txt", vec![0.9, 0.4]),
            ])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        let hits = store.nearest(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.id, "a");
        assert_eq!(hits[1].record.id, "c");
        assert!(hits[0].similarity >= hits[1].similarity);
        assert_eq!(hits[0].record.origin, "one.txt");
        assert_eq!(hits[0].record.embedding, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn clear_replaces_the_collection() {
        let store = SqliteVectorStore::open_in_memory("vector_db").await.unwrap();
        store
            .upsert(vec![record("stale", "old.txt", vec![1.0, 0.0])])
            .await
            .unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        store
            .upsert(vec![record("fresh", "new.txt", vec![0.0, 1.0])])
            .await
            .unwrap();
        let hits = store.nearest(&[0.0, 1.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, "fresh");
    }

    #[tokio::test]
    async fn empty_collection_searches_cleanly() {
        let store = SqliteVectorStore::open_in_memory("vector_db").await.unwrap();
        assert!(store.nearest(&[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_collection_name_rejected() {
        let err = SqliteVectorStore::open_in_memory("bad name; drop")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.db");
        {
            let store = SqliteVectorStore::open(&path, "vector_db").await.unwrap();
            store
                .upsert(vec![record("kept", "doc.txt", vec![0.5, 0.5])])
                .await
                .unwrap();
        }
        let store = SqliteVectorStore::open(&path, "vector_db").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
