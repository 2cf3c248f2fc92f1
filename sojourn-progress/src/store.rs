//! Progress Store
//!
//! Sole owner of the current [`ProgressRecord`] for one identity. Every
//! mutation runs synchronously under a single lock: it reads the current
//! record, builds the next one, swaps it in and only then dispatches
//! persistence. Callers get their answer immediately; the write trails.
//!
//! Every applied mutation is published as a [`Transition`] carrying both the
//! old and the new snapshot. No-ops publish nothing and write nothing.

use crate::achievements::{self, RuleCategory, RuleContext};
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::persistence::{PersistenceAdapter, PersistenceWriter, WriterStatus};
use crate::record::{FontSize, JournalEntry, JournalEntryType, Language, ProgressRecord, Theme};
use crate::streak::compute_streak;
use sojourn_common::events::{EventBus, MutationKind, SojournEvent};
use sojourn_common::time::{Calendar, Clock};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Buffered transitions per subscriber before it lags
const TRANSITION_CAPACITY: usize = 256;

/// Default bound on a single load or save
pub const DEFAULT_SAVE_TIMEOUT: Duration = Duration::from_secs(5);

/// One applied mutation
#[derive(Debug, Clone)]
pub struct Transition {
    pub revision: u64,
    /// Resets applied so far, this transition included
    pub epoch: u64,
    pub mutation: MutationKind,
    pub old: Arc<ProgressRecord>,
    pub new: Arc<ProgressRecord>,
}

/// Store construction parameters
#[derive(Clone)]
pub struct StoreSettings {
    pub catalog: Catalog,
    pub calendar: Calendar,
    /// Bound on the initial load and on every save
    pub save_timeout: Duration,
    /// Receives `ProgressUpdated` and `PersistenceFailed`
    pub events: Option<EventBus>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            catalog: Catalog::default(),
            calendar: Calendar::utc(),
            save_timeout: DEFAULT_SAVE_TIMEOUT,
            events: None,
        }
    }
}

struct StoreState {
    record: Arc<ProgressRecord>,
    revision: u64,
    epoch: u64,
}

pub struct ProgressStore {
    identity: Identity,
    catalog: Catalog,
    calendar: Calendar,
    clock: Arc<dyn Clock>,
    state: Mutex<StoreState>,
    transitions: broadcast::Sender<Transition>,
    writer: PersistenceWriter,
    events: Option<EventBus>,
}

impl ProgressStore {
    /// Load the record for `identity` and start the persistence writer
    ///
    /// A missing, unreadable or timed-out record starts from defaults. Nothing
    /// is written until the first mutation.
    pub async fn open(
        identity: Identity,
        adapter: Arc<dyn PersistenceAdapter>,
        clock: Arc<dyn Clock>,
        settings: StoreSettings,
    ) -> Self {
        let backend = adapter.backend_name();
        let loaded = match tokio::time::timeout(settings.save_timeout, adapter.load(&identity)).await
        {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                warn!("Failed to load progress for {} from {} backend: {}", identity.user_id, backend, e);
                None
            }
            Err(_) => {
                warn!(
                    "Failed to load progress for {} from {} backend: {}",
                    identity.user_id,
                    backend,
                    Error::Timeout(settings.save_timeout)
                );
                None
            }
        };

        let record = match loaded {
            Some(mut record) => {
                let dropped = record.retain_plan_days(&settings.catalog);
                if dropped > 0 {
                    warn!(
                        "Ignoring {} stored practice days outside the {}-day plan",
                        dropped, settings.catalog.plan_days
                    );
                }
                info!(
                    "Loaded progress for {}: {} sections, {} days, {} badges",
                    identity.user_id,
                    record.completed_sections.len(),
                    record.completed_days.len(),
                    record.badges.len()
                );
                record
            }
            None => {
                info!("No stored progress for {}, starting fresh", identity.user_id);
                ProgressRecord::new(clock.now())
            }
        };

        let writer = PersistenceWriter::spawn(
            adapter,
            identity.clone(),
            settings.save_timeout,
            0,
            settings.events.clone(),
        );
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);

        Self {
            identity,
            catalog: settings.catalog,
            calendar: settings.calendar,
            clock,
            state: Mutex::new(StoreState {
                record: Arc::new(record),
                revision: 0,
                epoch: 0,
            }),
            transitions,
            writer,
            events: settings.events,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Current snapshot
    pub fn record(&self) -> Arc<ProgressRecord> {
        self.lock().record.clone()
    }

    /// Number of mutations applied since `open`
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// Transitions of every mutation applied after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    pub fn writer_status(&self) -> WriterStatus {
        self.writer.status()
    }

    /// Name of the persistence backend in use
    pub fn backend_name(&self) -> &'static str {
        self.writer.backend_name()
    }

    /// Wait until the latest applied revision has been saved or has failed
    pub async fn flush(&self) {
        let revision = self.revision();
        self.writer.flush(revision).await;
    }

    /// Mark a reading section as read
    pub fn complete_section(&self, section_id: &str) -> Arc<ProgressRecord> {
        self.apply(MutationKind::CompleteSection, |record, ctx| {
            if !record.completed_sections.insert(section_id.to_string()) {
                return false;
            }
            achievements::grant(record, RuleCategory::Section, ctx);
            true
        })
    }

    /// Mark a practice-plan day as done and advance the streak
    pub fn complete_day(&self, day: u8) -> Result<Arc<ProgressRecord>> {
        if !self.catalog.is_plan_day(day) {
            return Err(Error::InvalidArgument(format!(
                "day {} is outside the plan (1..={})",
                day, self.catalog.plan_days
            )));
        }

        let today = self.calendar.date_of(self.clock.now());
        Ok(self.apply(MutationKind::CompleteDay, |record, ctx| {
            if !record.completed_days.insert(day) {
                return false;
            }
            let streak = compute_streak(
                record.current_streak,
                record.longest_streak,
                record.last_practice_date,
                today,
            );
            record.current_streak = streak.current;
            record.longest_streak = streak.longest;
            record.last_practice_date = Some(streak.last_practice_date);
            achievements::grant(record, RuleCategory::Day, ctx);
            true
        }))
    }

    /// Append a journal entry; `content` must not be blank
    pub fn add_journal_entry(
        &self,
        entry_type: JournalEntryType,
        content: &str,
    ) -> Result<JournalEntry> {
        if content.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "journal content must not be empty".to_string(),
            ));
        }

        let entry = JournalEntry {
            id: Uuid::new_v4().to_string(),
            date: self.clock.now(),
            entry_type,
            content: content.to_string(),
        };
        self.apply(MutationKind::AddJournalEntry, |record, ctx| {
            record.journal_entries.push(entry.clone());
            achievements::grant(record, RuleCategory::Journal, ctx);
            true
        });
        Ok(entry)
    }

    /// Remove a journal entry by id; unknown ids are ignored
    ///
    /// Badges earned through the entry are kept.
    pub fn delete_journal_entry(&self, entry_id: &str) -> Arc<ProgressRecord> {
        self.apply(MutationKind::DeleteJournalEntry, |record, _| {
            let before = record.journal_entries.len();
            record.journal_entries.retain(|e| e.id != entry_id);
            record.journal_entries.len() != before
        })
    }

    /// Flip the bookmark on `item_id`; returns whether it is now bookmarked
    pub fn toggle_bookmark(&self, item_id: &str) -> bool {
        let record = self.apply(MutationKind::ToggleBookmark, |record, _| {
            if !record.bookmarks.remove(item_id) {
                record.bookmarks.insert(item_id.to_string());
            }
            true
        });
        record.bookmarks.contains(item_id)
    }

    pub fn set_font_size(&self, font_size: FontSize) -> Arc<ProgressRecord> {
        self.apply(MutationKind::SetFontSize, |record, _| {
            record.font_size = font_size;
            true
        })
    }

    pub fn set_theme(&self, theme: Theme) -> Arc<ProgressRecord> {
        self.apply(MutationKind::SetTheme, |record, _| {
            record.theme = theme;
            true
        })
    }

    pub fn set_language(&self, language: Language) -> Arc<ProgressRecord> {
        self.apply(MutationKind::SetLanguage, |record, _| {
            record.language = language;
            true
        })
    }

    /// Replace the record with a fresh default one
    ///
    /// The identity binding, and therefore the storage key, is unchanged.
    pub fn reset_progress(&self) -> Arc<ProgressRecord> {
        let now = self.clock.now();
        self.apply(MutationKind::ResetProgress, |record, _| {
            *record = ProgressRecord::new(now);
            true
        })
    }

    /// Run `change` on a copy of the current record and publish the result
    ///
    /// `change` returns false for a no-op, in which case the current record
    /// is kept untouched.
    fn apply<F>(&self, mutation: MutationKind, change: F) -> Arc<ProgressRecord>
    where
        F: FnOnce(&mut ProgressRecord, &RuleContext<'_>) -> bool,
    {
        let ctx = RuleContext {
            catalog: &self.catalog,
            calendar: &self.calendar,
        };

        let mut state = self.lock();
        let old = state.record.clone();
        let mut next = (*old).clone();
        if !change(&mut next, &ctx) {
            debug!(mutation = %mutation, "No-op mutation for {}", self.identity.user_id);
            return old;
        }

        let new = Arc::new(next);
        state.record = new.clone();
        state.revision += 1;
        if mutation == MutationKind::ResetProgress {
            state.epoch += 1;
        }
        let revision = state.revision;

        // Still under the lock so transitions and writes keep mutation order
        self.writer.submit(revision, new.clone());
        let _ = self.transitions.send(Transition {
            revision,
            epoch: state.epoch,
            mutation,
            old,
            new: new.clone(),
        });
        drop(state);

        debug!(
            mutation = %mutation,
            revision,
            badges = new.badges.len(),
            "Applied mutation for {}",
            self.identity.user_id
        );
        if let Some(events) = &self.events {
            events.emit_lossy(SojournEvent::ProgressUpdated {
                user_id: self.identity.user_id.clone(),
                mutation,
                revision,
                timestamp: self.clock.now(),
            });
        }

        new
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
