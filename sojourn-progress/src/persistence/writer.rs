//! Serialized persistence writer
//!
//! One background task per store performs every save, one at a time, so an
//! older write can never land after a newer one. Submissions go through a
//! `watch` channel: while a save is in flight only the most recent snapshot
//! stays pending and intermediate ones are skipped (latest wins).
//!
//! Failures and timeouts are logged and published on the EventBus. They are
//! never retried here; the next mutation's write carries the full record
//! again.

use super::PersistenceAdapter;
use crate::error::Error;
use crate::identity::Identity;
use crate::record::ProgressRecord;
use sojourn_common::events::{EventBus, SojournEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Outcome of the most recent settled save
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriterStatus {
    /// Highest revision whose save finished, successfully or not
    pub revision: u64,
    /// Error of the most recent save, `None` if it succeeded
    pub last_error: Option<String>,
    /// Total failed or timed-out saves
    pub failures: u64,
}

#[derive(Clone)]
struct Snapshot {
    revision: u64,
    record: Arc<ProgressRecord>,
}

pub struct PersistenceWriter {
    pending_tx: watch::Sender<Option<Snapshot>>,
    settled_rx: watch::Receiver<WriterStatus>,
    backend: &'static str,
}

impl PersistenceWriter {
    /// Start the writer task
    ///
    /// Must be called inside a tokio runtime. `initial_revision` is treated
    /// as already settled.
    pub fn spawn(
        adapter: Arc<dyn PersistenceAdapter>,
        identity: Identity,
        save_timeout: Duration,
        initial_revision: u64,
        bus: Option<EventBus>,
    ) -> Self {
        let (pending_tx, pending_rx) = watch::channel(None);
        let (settled_tx, settled_rx) = watch::channel(WriterStatus {
            revision: initial_revision,
            ..WriterStatus::default()
        });
        let backend = adapter.backend_name();

        tokio::spawn(run_writer(
            adapter,
            identity,
            save_timeout,
            pending_rx,
            settled_tx,
            bus,
        ));
        info!("Persistence writer started ({} backend)", backend);

        Self {
            pending_tx,
            settled_rx,
            backend,
        }
    }

    /// Queue `record` for saving; never blocks
    pub fn submit(&self, revision: u64, record: Arc<ProgressRecord>) {
        self.pending_tx
            .send_replace(Some(Snapshot { revision, record }));
    }

    /// Wait until a save of `revision` (or a later one) has finished
    pub async fn flush(&self, revision: u64) {
        let mut rx = self.settled_rx.clone();
        if rx.wait_for(|status| status.revision >= revision).await.is_err() {
            warn!("Persistence writer stopped before revision {} settled", revision);
        }
    }

    pub fn status(&self) -> WriterStatus {
        self.settled_rx.borrow().clone()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend
    }
}

async fn run_writer(
    adapter: Arc<dyn PersistenceAdapter>,
    identity: Identity,
    save_timeout: Duration,
    mut pending_rx: watch::Receiver<Option<Snapshot>>,
    settled_tx: watch::Sender<WriterStatus>,
    bus: Option<EventBus>,
) {
    let backend = adapter.backend_name();

    while pending_rx.changed().await.is_ok() {
        let Some(snapshot) = pending_rx.borrow_and_update().clone() else {
            continue;
        };

        let error = match tokio::time::timeout(
            save_timeout,
            adapter.save(&identity, &snapshot.record),
        )
        .await
        {
            Ok(Ok(())) => {
                debug!(revision = snapshot.revision, "Saved progress record ({})", backend);
                None
            }
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(Error::Timeout(save_timeout).to_string()),
        };

        if let Some(reason) = &error {
            warn!(
                revision = snapshot.revision,
                "Failed to save progress record to {} backend: {}", backend, reason
            );
            if let Some(bus) = &bus {
                bus.emit_lossy(SojournEvent::PersistenceFailed {
                    user_id: identity.user_id.clone(),
                    backend: backend.to_string(),
                    revision: snapshot.revision,
                    reason: reason.clone(),
                    timestamp: sojourn_common::time::now(),
                });
            }
        }

        settled_tx.send_modify(|status| {
            status.revision = status.revision.max(snapshot.revision);
            if error.is_some() {
                status.failures += 1;
            }
            status.last_error = error;
        });
    }

    debug!("Persistence writer for {} stopped", identity.user_id);
}
