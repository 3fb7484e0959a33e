use async_trait::async_trait;
use docvault_storage::error::{StoreError, StoreResult};
use docvault_storage::{Fields, MemoryStore, RecordStore, StoredRecord};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;

type PutFilter = Box<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Memory-backed store with injectable failures and latency.
#[allow(dead_code)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    fail_put: Mutex<Option<PutFilter>>,
    unavailable: AtomicBool,
    query_delay: Mutex<Option<Duration>>,
}

#[allow(dead_code)]
impl FaultyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::default(),
            fail_put: Mutex::new(None),
            unavailable: AtomicBool::new(false),
            query_delay: Mutex::new(None),
        })
    }

    /// Fail every put for which `filter(collection, key)` holds.
    pub fn fail_puts_where(&self, filter: impl Fn(&str, &str) -> bool + Send + Sync + 'static) {
        *self.fail_put.lock().unwrap() = Some(Box::new(filter));
    }

    /// Make every operation fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn delay_queries(&self, delay: Duration) {
        *self.query_delay.lock().unwrap() = Some(delay);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected outage".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn put(&self, collection: &str, key: &str, fields: Fields) -> StoreResult<()> {
        self.check_available()?;
        let fail = self
            .fail_put
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|filter| filter(collection, key));
        if fail {
            return Err(StoreError::Io(std::io::Error::other(format!(
                "injected write failure for {collection}/{key}"
            ))));
        }
        self.inner.put(collection, key, fields).await
    }

    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Fields>> {
        self.check_available()?;
        self.inner.get(collection, key).await
    }

    async fn query_eq(
        &self,
        collection: &str,
        field_path: &str,
        value: &Value,
    ) -> StoreResult<Vec<StoredRecord>> {
        self.check_available()?;
        let delay = *self.query_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.query_eq(collection, field_path, value).await
    }

    async fn delete(&self, collection: &str, key: &str) -> StoreResult<bool> {
        self.check_available()?;
        self.inner.delete(collection, key).await
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<StoredRecord>> {
        self.check_available()?;
        self.inner.list(collection).await
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }

    fn max_record_bytes(&self) -> usize {
        self.inner.max_record_bytes()
    }
}

/// Memory-backed store that logs completed writes and returns query
/// results in reverse key order.
#[allow(dead_code)]
pub struct InstrumentedStore {
    pub inner: MemoryStore,
    pub writes: Mutex<Vec<(String, String)>>,
}

#[allow(dead_code)]
impl InstrumentedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::default(),
            writes: Mutex::new(Vec::new()),
        })
    }

    /// Completed writes as (collection, key), in completion order.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for InstrumentedStore {
    async fn put(&self, collection: &str, key: &str, fields: Fields) -> StoreResult<()> {
        self.inner.put(collection, key, fields).await?;
        self.writes
            .lock()
            .unwrap()
            .push((collection.to_string(), key.to_string()));
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Fields>> {
        self.inner.get(collection, key).await
    }

    async fn query_eq(
        &self,
        collection: &str,
        field_path: &str,
        value: &Value,
    ) -> StoreResult<Vec<StoredRecord>> {
        let mut records = self.inner.query_eq(collection, field_path, value).await?;
        records.sort_by(|a, b| b.key.cmp(&a.key));
        Ok(records)
    }

    async fn delete(&self, collection: &str, key: &str) -> StoreResult<bool> {
        self.inner.delete(collection, key).await
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<StoredRecord>> {
        self.inner.list(collection).await
    }

    fn backend_name(&self) -> &'static str {
        "instrumented"
    }

    fn max_record_bytes(&self) -> usize {
        self.inner.max_record_bytes()
    }
}
