//! Persistence Adapters
//!
//! The store is written against [`PersistenceAdapter`] only. Two backends
//! implement it:
//! - [`RemoteAdapter`]: a remote record store keyed by user id
//! - [`LocalAdapter`]: a key-value store on this device (sqlite or memory)
//!
//! Writes go through [`PersistenceWriter`], which serializes them per store
//! and lets the latest snapshot win.

pub mod local;
pub mod remote;
pub mod writer;

pub use local::{KeyValueStore, LocalAdapter, MemoryKeyValueStore, SqliteKeyValueStore};
pub use remote::{HttpRecordBackend, MemoryRecordBackend, RecordBackend, RemoteAdapter};
pub use writer::{PersistenceWriter, WriterStatus};

use crate::error::Result;
use crate::identity::Identity;
use crate::record::ProgressRecord;
use async_trait::async_trait;

/// Durable storage for the Progress Record
///
/// `save` always receives the full record, never a delta. Implementations
/// must not assume they are called from the mutation path: the writer task
/// calls them, and their errors are logged rather than propagated.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Fetch the stored record, `None` if there is none (or it is unusable)
    async fn load(&self, identity: &Identity) -> Result<Option<ProgressRecord>>;

    /// Store the full record
    async fn save(&self, identity: &Identity, record: &ProgressRecord) -> Result<()>;

    /// Short name for logs and events
    fn backend_name(&self) -> &'static str;
}
