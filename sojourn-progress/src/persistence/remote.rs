//! Remote persistence backend
//!
//! The remote store is a record store keyed by user id supporting `get` and
//! a partial `update`. The adapter always sends every field of the record,
//! so a partial update never mixes old and new state.

use super::PersistenceAdapter;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::record::ProgressRecord;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Record store keyed by user id
#[async_trait]
pub trait RecordBackend: Send + Sync {
    /// Stored fields for `user_id`, `None` if no row exists
    async fn get(&self, user_id: &str) -> Result<Option<Map<String, Value>>>;

    /// Overwrite the given fields of the row for `user_id`, creating it if needed
    async fn update(&self, user_id: &str, fields: Map<String, Value>) -> Result<()>;
}

/// Record store reached over HTTP
///
/// - `GET   {base_url}/records/{user_id}` → 200 JSON object, or 404
/// - `PATCH {base_url}/records/{user_id}` with a JSON object of fields
///
/// The user id is always sent as a single percent-encoded path segment.
pub struct HttpRecordBackend {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpRecordBackend {
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url).map_err(|e| {
            Error::InvalidArgument(format!("Invalid remote base URL {}: {}", base_url, e))
        })?;
        if parsed.cannot_be_a_base() {
            return Err(Error::InvalidArgument(format!(
                "Remote base URL {} cannot hold a path",
                base_url
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: parsed,
            api_token,
        })
    }

    fn record_url(&self, user_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("records").push(user_id);
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl RecordBackend for HttpRecordBackend {
    async fn get(&self, user_id: &str) -> Result<Option<Map<String, Value>>> {
        let url = self.record_url(user_id);
        debug!(url = %url, "Fetching remote progress record");

        let response = self.authorize(self.client.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = response.error_for_status()?.json().await?;

        match body {
            Value::Object(fields) => Ok(Some(fields)),
            other => Err(Error::Persistence(format!(
                "remote record for {} is not an object: {}",
                user_id, other
            ))),
        }
    }

    async fn update(&self, user_id: &str, fields: Map<String, Value>) -> Result<()> {
        let url = self.record_url(user_id);
        debug!(url = %url, fields = fields.len(), "Updating remote progress record");

        self.authorize(self.client.patch(url))
            .json(&fields)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// In-process record store with the same partial-update semantics
#[derive(Default)]
pub struct MemoryRecordBackend {
    rows: Mutex<HashMap<String, Map<String, Value>>>,
}

impl MemoryRecordBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a raw row
    pub fn insert_row(&self, user_id: &str, fields: Map<String, Value>) {
        self.rows().insert(user_id.to_string(), fields);
    }

    pub fn row(&self, user_id: &str) -> Option<Map<String, Value>> {
        self.rows().get(user_id).cloned()
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, HashMap<String, Map<String, Value>>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RecordBackend for MemoryRecordBackend {
    async fn get(&self, user_id: &str) -> Result<Option<Map<String, Value>>> {
        Ok(self.row(user_id))
    }

    async fn update(&self, user_id: &str, fields: Map<String, Value>) -> Result<()> {
        let mut rows = self.rows();
        let row = rows.entry(user_id.to_string()).or_default();
        row.extend(fields);
        Ok(())
    }
}

/// Persistence adapter over a remote [`RecordBackend`]
///
/// Requires a signed-in identity: saves for anonymous users fail with
/// [`Error::NotSignedIn`] and loads return `None`.
pub struct RemoteAdapter<B> {
    backend: B,
}

impl<B: RecordBackend> RemoteAdapter<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

/// Map a record to the backend's field names
pub fn to_fields(record: &ProgressRecord) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("schema_version".into(), json!(record.schema_version));
    fields.insert("completed_sections".into(), json!(record.completed_sections));
    fields.insert("completed_days".into(), json!(record.completed_days));
    fields.insert("current_streak".into(), json!(record.current_streak));
    fields.insert("longest_streak".into(), json!(record.longest_streak));
    fields.insert("last_practice_date".into(), json!(record.last_practice_date));
    fields.insert("journal_entries".into(), json!(record.journal_entries));
    fields.insert("bookmarks".into(), json!(record.bookmarks));
    fields.insert("font_size".into(), json!(record.font_size));
    fields.insert("theme".into(), json!(record.theme));
    fields.insert("language".into(), json!(record.language));
    fields.insert("badges".into(), json!(record.badges));
    fields.insert("first_visit".into(), json!(record.first_visit));
    fields.insert("updated_at".into(), json!(sojourn_common::time::now()));
    fields
}

#[async_trait]
impl<B: RecordBackend> PersistenceAdapter for RemoteAdapter<B> {
    async fn load(&self, identity: &Identity) -> Result<Option<ProgressRecord>> {
        if !identity.signed_in {
            debug!("Not signed in, skipping remote load");
            return Ok(None);
        }

        let Some(fields) = self.backend.get(&identity.user_id).await? else {
            return Ok(None);
        };
        Ok(ProgressRecord::from_stored(
            &Value::Object(fields),
            sojourn_common::time::now(),
        ))
    }

    async fn save(&self, identity: &Identity, record: &ProgressRecord) -> Result<()> {
        if !identity.signed_in {
            return Err(Error::NotSignedIn);
        }
        self.backend.update(&identity.user_id, to_fields(record)).await
    }

    fn backend_name(&self) -> &'static str {
        "remote"
    }
}
