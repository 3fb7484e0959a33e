//! SQLite record store.
//!
//! All collections share one `records` table; fields are stored as JSON text
//! and equality queries go through `json_extract`.

use crate::error::{StoreError, StoreResult};
use crate::traits::{Fields, RecordStore, StoredRecord, encode_record, lookup_field, validate_name};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::instrument;

const IN_MEMORY: &str = ":memory:";

const SCALAR_EQ_QUERY: &str = "SELECT record_key, fields FROM records \
     WHERE collection = ? AND json_extract(fields, ?) = ?";

const PRESENT_QUERY: &str = "SELECT record_key, fields FROM records \
     WHERE collection = ? AND json_type(fields, ?) IS NOT NULL";

/// SQLite-backed record store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    max_record_bytes: usize,
}

impl SqliteStore {
    /// Open (or create) the database at `path`. `:memory:` opens a private
    /// in-process database.
    pub async fn new(path: impl AsRef<Path>, max_record_bytes: usize) -> StoreResult<Self> {
        let path = path.as_ref();

        let opts = if path == Path::new(IN_MEMORY) {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };
        // Prevent transient "database is locked" errors under concurrent access.
        let opts = opts.busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // One connection: SQLite serializes writers anyway, and an in-memory
            // database only lives as long as its connection.
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            max_record_bytes,
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                record_key TEXT NOT NULL,
                fields TEXT NOT NULL,
                PRIMARY KEY (collection, record_key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

/// Translate a dotted field path into a quoted SQLite JSON path.
fn json_path(field_path: &str) -> StoreResult<String> {
    let mut path = String::from("$");
    for segment in field_path.split('.') {
        if segment.is_empty() || segment.contains('"') {
            return Err(StoreError::InvalidKey(format!(
                "unsupported field path: {field_path}"
            )));
        }
        path.push_str(".\"");
        path.push_str(segment);
        path.push('"');
    }
    Ok(path)
}

fn decode_rows(rows: Vec<(String, String)>) -> StoreResult<Vec<StoredRecord>> {
    rows.into_iter()
        .map(|(key, fields)| {
            Ok(StoredRecord {
                key,
                fields: serde_json::from_str(&fields)?,
            })
        })
        .collect()
}

#[async_trait]
impl RecordStore for SqliteStore {
    #[instrument(skip(self, fields), fields(backend = "sqlite"))]
    async fn put(&self, collection: &str, key: &str, fields: Fields) -> StoreResult<()> {
        validate_name(collection)?;
        validate_name(key)?;
        let encoded = encode_record(collection, key, &fields, self.max_record_bytes)?;
        sqlx::query(
            r#"
            INSERT INTO records (collection, record_key, fields)
            VALUES (?, ?, ?)
            ON CONFLICT(collection, record_key) DO UPDATE SET fields = excluded.fields
            "#,
        )
        .bind(collection)
        .bind(key)
        .bind(encoded)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Fields>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT fields FROM records WHERE collection = ? AND record_key = ?")
                .bind(collection)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(fields,)| serde_json::from_str(&fields).map_err(StoreError::from))
            .transpose()
    }

    #[instrument(skip(self, value), fields(backend = "sqlite"))]
    async fn query_eq(
        &self,
        collection: &str,
        field_path: &str,
        value: &Value,
    ) -> StoreResult<Vec<StoredRecord>> {
        let path = json_path(field_path)?;

        // SQL narrows the candidates; exact JSON equality is checked below so
        // every backend agrees on what "equal" means.
        let rows: Vec<(String, String)> = match value {
            Value::String(s) => {
                sqlx::query_as(SCALAR_EQ_QUERY)
                    .bind(collection)
                    .bind(&path)
                    .bind(s)
                    .fetch_all(&self.pool)
                    .await?
            }
            Value::Bool(b) => {
                sqlx::query_as(SCALAR_EQ_QUERY)
                    .bind(collection)
                    .bind(&path)
                    .bind(i64::from(*b))
                    .fetch_all(&self.pool)
                    .await?
            }
            Value::Number(n) => match n.as_i64() {
                Some(i) => {
                    sqlx::query_as(SCALAR_EQ_QUERY)
                        .bind(collection)
                        .bind(&path)
                        .bind(i)
                        .fetch_all(&self.pool)
                        .await?
                }
                None => {
                    sqlx::query_as(PRESENT_QUERY)
                        .bind(collection)
                        .bind(&path)
                        .fetch_all(&self.pool)
                        .await?
                }
            },
            Value::Null | Value::Array(_) | Value::Object(_) => {
                sqlx::query_as(PRESENT_QUERY)
                    .bind(collection)
                    .bind(&path)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut records = decode_rows(rows)?;
        records.retain(|record| lookup_field(&record.fields, field_path) == Some(value));
        Ok(records)
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn delete(&self, collection: &str, key: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM records WHERE collection = ? AND record_key = ?")
            .bind(collection)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn list(&self, collection: &str) -> StoreResult<Vec<StoredRecord>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT record_key, fields FROM records WHERE collection = ?")
                .bind(collection)
                .fetch_all(&self.pool)
                .await?;
        decode_rows(rows)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn max_record_bytes(&self) -> usize {
        self.max_record_bytes
    }

    async fn health_check(&self) -> StoreResult<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_path_quotes_segments() {
        assert_eq!(json_path("documentId").unwrap(), "$.\"documentId\"");
        assert_eq!(
            json_path("ownerRefs.kind").unwrap(),
            "$.\"ownerRefs\".\"kind\""
        );
        assert!(json_path("a..b").is_err());
        assert!(json_path("a\"b").is_err());
    }

    #[tokio::test]
    async fn test_file_database_persists_across_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("records.db");
        {
            let store = SqliteStore::new(&path, 1024 * 1024).await.unwrap();
            let fields = json!({"documentId": "d1"}).as_object().cloned().unwrap();
            store.put("c", "k", fields).await.unwrap();
            store.health_check().await.unwrap();
        }
        let store = SqliteStore::new(&path, 1024 * 1024).await.unwrap();
        let record = store.get("c", "k").await.unwrap().unwrap();
        assert_eq!(record["documentId"], "d1");
    }

    #[tokio::test]
    async fn test_query_eq_distinguishes_types() {
        let store = SqliteStore::new(IN_MEMORY, 1024 * 1024).await.unwrap();
        store
            .put("c", "num", json!({"v": 1}).as_object().cloned().unwrap())
            .await
            .unwrap();
        store
            .put("c", "text", json!({"v": "1"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        store
            .put("c", "flag", json!({"v": true}).as_object().cloned().unwrap())
            .await
            .unwrap();

        let hits = store.query_eq("c", "v", &json!(1)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "num");

        let hits = store.query_eq("c", "v", &json!("1")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "text");

        let hits = store.query_eq("c", "v", &json!(true)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "flag");
    }
}
