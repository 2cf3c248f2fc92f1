//! Local persistence backend
//!
//! Stores the record as one JSON document per user in a key-value store on
//! this device. Used for people without cloud sync.

use super::PersistenceAdapter;
use crate::error::Result;
use crate::identity::Identity;
use crate::record::ProgressRecord;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Durable key-value storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Key-value storage in the `local_storage` table
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM local_storage WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO local_storage (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Process-local storage, lost on exit
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Persistence adapter over a [`KeyValueStore`]
///
/// Each identity maps to its own key (`progress:{user_id}`).
pub struct LocalAdapter<S> {
    storage: S,
}

impl<S: KeyValueStore> LocalAdapter<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

#[async_trait]
impl<S: KeyValueStore> PersistenceAdapter for LocalAdapter<S> {
    async fn load(&self, identity: &Identity) -> Result<Option<ProgressRecord>> {
        let key = identity.storage_key();
        let Some(text) = self.storage.get(&key).await? else {
            debug!("No local record under {}", key);
            return Ok(None);
        };

        let value: serde_json::Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                warn!("Local record under {} is not valid JSON, ignoring: {}", key, e);
                return Ok(None);
            }
        };

        let record = ProgressRecord::from_stored(&value, sojourn_common::time::now());
        if record.is_none() {
            warn!("Local record under {} is not an object, ignoring", key);
        }
        Ok(record)
    }

    async fn save(&self, identity: &Identity, record: &ProgressRecord) -> Result<()> {
        let text = serde_json::to_string(record)?;
        self.storage.set(&identity.storage_key(), &text).await
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Theme;
    use sojourn_common::db::init_memory_database;

    #[tokio::test]
    async fn test_load_absent_is_none() {
        let adapter = LocalAdapter::new(MemoryKeyValueStore::new());
        assert!(adapter.load(&Identity::anonymous()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_per_identity() {
        let adapter = LocalAdapter::new(MemoryKeyValueStore::new());
        let alice = Identity::signed_in("alice");
        let bob = Identity::signed_in("bob");

        let mut record = ProgressRecord::new(sojourn_common::time::now());
        record.theme = Theme::Sepia;
        record.completed_sections.insert("intro".to_string());
        adapter.save(&alice, &record).await.unwrap();

        assert_eq!(adapter.load(&alice).await.unwrap(), Some(record));
        assert!(adapter.load(&bob).await.unwrap().is_none());
        assert!(adapter.storage().get("progress:alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_json_is_treated_as_absent() {
        let storage = MemoryKeyValueStore::new();
        storage.set("progress:local", "{not json").await.unwrap();
        let adapter = LocalAdapter::new(storage);

        assert!(adapter.load(&Identity::anonymous()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_storage_overwrites_last_write_wins() {
        let pool = init_memory_database().await.unwrap();
        let adapter = LocalAdapter::new(SqliteKeyValueStore::new(pool));
        let identity = Identity::anonymous();

        let mut record = ProgressRecord::new(sojourn_common::time::now());
        adapter.save(&identity, &record).await.unwrap();
        record.completed_days.insert(3);
        adapter.save(&identity, &record).await.unwrap();

        let loaded = adapter.load(&identity).await.unwrap().unwrap();
        assert_eq!(loaded.completed_days.iter().copied().collect::<Vec<_>>(), vec![3]);
    }
}
