//! Durable vector store on SQLite with the `sqlite-vec` extension.
//!
//! Documents live in a `questions` table; their vectors live in a `vec0`
//! virtual table joined by rowid. Metadata is stored as a JSON column and
//! filtered with `json_extract`.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, ffi};

use crate::index::VectorStore;
use crate::types::{ExtractError, IndexedDocument, Metadata, QueryHit, new_metadata};

/// SQLite-backed question store.
#[derive(Clone)]
pub struct SqliteQuestionStore {
    conn: Connection,
}

impl SqliteQuestionStore {
    /// Open (or create) a store at `path` with vectors of `dimension`.
    pub async fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self, ExtractError> {
        register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| ExtractError::Storage(err.to_string()))?;

        conn.call(move |conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS questions (
                     id TEXT PRIMARY KEY,
                     document TEXT NOT NULL,
                     metadata TEXT NOT NULL DEFAULT '{{}}'
                 );
                 CREATE VIRTUAL TABLE IF NOT EXISTS questions_embeddings
                     USING vec0(embedding float[{dimension}]);"
            ))
            .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await
        .map_err(|err| ExtractError::Storage(err.to_string()))?;

        Ok(Self { conn })
    }
}

fn register_sqlite_vec() -> Result<(), ExtractError> {
    use std::sync::Mutex;

    static INIT: Once = Once::new();
    static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let result = unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!(
                    "failed to register sqlite-vec extension (code {rc})"
                ))
            } else {
                Ok(())
            }
        };
        *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
    });

    INIT_RESULT
        .lock()
        .expect("init result mutex poisoned")
        .clone()
        .expect("init was called but result not set")
        .map_err(ExtractError::Storage)
}

/// Metadata keys are interpolated into `json_extract` paths, so they are
/// restricted to identifier characters.
fn sanitize_key(key: &str) -> Result<&str, tokio_rusqlite::Error> {
    if !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(key)
    } else {
        Err(tokio_rusqlite::Error::Rusqlite(
            rusqlite::Error::InvalidParameterName(format!("bad metadata filter key '{key}'")),
        ))
    }
}

fn filter_param(value: &serde_json::Value) -> rusqlite::types::Value {
    use rusqlite::types::Value;
    match value {
        serde_json::Value::Null => Value::Null,
        // json_extract surfaces JSON booleans as 0/1.
        serde_json::Value::Bool(b) => Value::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else {
                Value::Real(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

fn parse_metadata(raw: &str) -> Metadata {
    serde_json::from_str(raw).unwrap_or_else(|_| new_metadata())
}

#[async_trait]
impl VectorStore for SqliteQuestionStore {
    async fn upsert(&self, entries: Vec<(IndexedDocument, Vec<f32>)>) -> Result<(), ExtractError> {
        if entries.is_empty() {
            return Ok(());
        }
        let rows: Vec<(String, String, String, String)> = entries
            .into_iter()
            .map(|(doc, vector)| {
                let metadata =
                    serde_json::to_string(&doc.metadata).unwrap_or_else(|_| "{}".to_string());
                let vector_json = serde_json::to_string(&vector).unwrap_or_else(|_| "[]".to_string());
                (doc.id, doc.text, metadata, vector_json)
            })
            .collect();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Rusqlite)?;
                for (id, document, metadata, vector_json) in &rows {
                    tx.execute(
                        "INSERT INTO questions (id, document, metadata) VALUES (?1, ?2, ?3)
                         ON CONFLICT(id) DO UPDATE SET document = ?2, metadata = ?3",
                        (id, document, metadata),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                    let rowid: i64 = tx
                        .query_row("SELECT rowid FROM questions WHERE id = ?", [id], |row| {
                            row.get(0)
                        })
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;

                    tx.execute("DELETE FROM questions_embeddings WHERE rowid = ?", [rowid])
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    tx.execute(
                        "INSERT INTO questions_embeddings (rowid, embedding) VALUES (?, vec_f32(?))",
                        (rowid, vector_json),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| ExtractError::Storage(err.to_string()))
    }

    async fn query(
        &self,
        vector: &[f32],
        n: usize,
        filter: Option<&Metadata>,
    ) -> Result<Vec<QueryHit>, ExtractError> {
        let vector_json =
            serde_json::to_string(vector).map_err(|err| ExtractError::Storage(err.to_string()))?;
        let filter = filter.cloned();

        self.conn
            .call(move |conn| {
                let mut clauses = Vec::new();
                let mut params: Vec<rusqlite::types::Value> =
                    vec![rusqlite::types::Value::Text(vector_json)];
                if let Some(filter) = &filter {
                    for (key, value) in filter {
                        let key = sanitize_key(key)?;
                        clauses.push(format!("json_extract(q.metadata, '$.{key}') = ?"));
                        params.push(filter_param(value));
                    }
                }
                let where_sql = if clauses.is_empty() {
                    String::new()
                } else {
                    format!("WHERE {}", clauses.join(" AND "))
                };

                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT q.id, q.document, q.metadata, \
                         vec_distance_cosine(e.embedding, vec_f32(?)) AS distance \
                         FROM questions q \
                         JOIN questions_embeddings e ON q.rowid = e.rowid \
                         {where_sql} \
                         ORDER BY distance ASC \
                         LIMIT {n}"
                    ))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params), |row| {
                        Ok(QueryHit {
                            id: row.get(0)?,
                            document: row.get(1)?,
                            metadata: parse_metadata(&row.get::<_, String>(2)?),
                            distance: row.get(3)?,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut hits = Vec::new();
                for row in rows {
                    hits.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(hits)
            })
            .await
            .map_err(|err| ExtractError::Storage(err.to_string()))
    }

    async fn count(&self) -> Result<usize, ExtractError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM questions", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| ExtractError::Storage(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, text: &str, chapter: u32) -> IndexedDocument {
        let mut metadata = new_metadata();
        metadata.insert("chapter".into(), json!(chapter));
        metadata.insert("topic".into(), json!("probability"));
        IndexedDocument::new(id, text).with_metadata(metadata)
    }

    async fn open_store(dimension: usize) -> (tempfile::TempDir, SqliteQuestionStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteQuestionStore::open(dir.path().join("questions.db"), dimension)
            .await
            .expect("open store");
        (dir, store)
    }

    #[tokio::test]
    async fn upsert_query_count_round_trip() {
        let (_dir, store) = open_store(3).await;
        store
            .upsert(vec![
                (doc("q-1", "find x", 1), vec![1.0, 0.0, 0.0]),
                (doc("q-2", "find y", 1), vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 2);

        let hits = store.query(&[1.0, 0.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "q-1");
        assert!(hits[0].distance < hits[1].distance);
        assert_eq!(hits[0].metadata.get("topic"), Some(&json!("probability")));
    }

    #[tokio::test]
    async fn upsert_replaces_existing_id() {
        let (_dir, store) = open_store(3).await;
        store
            .upsert(vec![(doc("q-1", "old", 1), vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert(vec![(doc("q-1", "new", 2), vec![0.0, 0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let hits = store.query(&[0.0, 0.0, 1.0], 1, None).await.unwrap();
        assert_eq!(hits[0].document, "new");
        assert!(hits[0].distance < 1e-6);
    }

    #[tokio::test]
    async fn metadata_filter_restricts_hits() {
        let (_dir, store) = open_store(3).await;
        store
            .upsert(vec![
                (doc("q-1", "chapter one", 1), vec![1.0, 0.0, 0.0]),
                (doc("q-2", "chapter two", 2), vec![1.0, 0.0, 0.0]),
            ])
            .await
            .unwrap();

        let mut filter = new_metadata();
        filter.insert("chapter".into(), json!(2));
        let hits = store
            .query(&[1.0, 0.0, 0.0], 10, Some(&filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "q-2");
    }

    #[tokio::test]
    async fn malicious_filter_key_is_rejected() {
        let (_dir, store) = open_store(3).await;
        let mut filter = new_metadata();
        filter.insert("chapter') OR 1=1 --".into(), json!(1));
        let err = store
            .query(&[1.0, 0.0, 0.0], 1, Some(&filter))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Storage(_)));
    }
}
