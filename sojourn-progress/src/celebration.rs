//! Celebration Notifier
//!
//! Turns store transitions into one-shot celebrations for the presentation
//! layer. The diff itself is the pure [`celebrations_for`]; the
//! [`CelebrationNotifier`] task only feeds its output through a
//! [`CelebrationQueue`] and handles dismissal.
//!
//! When one mutation earns several badges they are all queued and shown one
//! after another in [`BADGE_PRIORITY`] order. Nothing is dropped.

use crate::achievements::{CODE_KEEPER, DEVOTED_WRITER, FIRST_READING, SEVEN_DAYS, SIGN_SEEKER};
use crate::record::ProgressRecord;
use crate::store::Transition;
use serde::Serialize;
use sojourn_common::events::{CelebrationKind, DismissReason, EventBus, MutationKind, SojournEvent};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Display order when several badges arrive together
pub const BADGE_PRIORITY: &[&str] = &[
    CODE_KEEPER,
    SEVEN_DAYS,
    DEVOTED_WRITER,
    SIGN_SEEKER,
    FIRST_READING,
];

/// Badge id, title, message
pub const BADGE_DESCRIPTIONS: &[(&str, &str, &str)] = &[
    (
        FIRST_READING,
        "First Reading",
        "You finished your first reading. The journey has begun.",
    ),
    (
        CODE_KEEPER,
        "Code Keeper",
        "You have read the code. Keep it close on the days ahead.",
    ),
    (
        SEVEN_DAYS,
        "Seven Days",
        "You completed every day of the practice plan.",
    ),
    (
        SIGN_SEEKER,
        "Sign Seeker",
        "Five signs recorded. You are learning to notice.",
    ),
    (
        DEVOTED_WRITER,
        "Devoted Writer",
        "You wrote in your journal on seven different days.",
    ),
];

/// Streak lengths celebrated when first reached
pub const STREAK_MILESTONES: &[(u32, &str, &str)] = &[
    (3, "Three-Day Streak", "Three days of practice in a row."),
    (7, "Seven-Day Streak", "A full week of practice without a break."),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Celebration {
    pub kind: CelebrationKind,
    /// Badge id, or `streak_{n}` for milestones
    pub key: String,
    pub title: String,
    pub message: String,
}

/// What the presentation layer renders
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CelebrationView {
    pub is_visible: bool,
    pub kind: Option<CelebrationKind>,
    pub key: Option<String>,
    pub title: String,
    pub message: String,
}

impl CelebrationView {
    fn showing(celebration: &Celebration) -> Self {
        Self {
            is_visible: true,
            kind: Some(celebration.kind),
            key: Some(celebration.key.clone()),
            title: celebration.title.clone(),
            message: celebration.message.clone(),
        }
    }
}

/// Celebration for a badge id; unknown ids get a generic one
pub fn describe_badge(badge: &str) -> Celebration {
    match BADGE_DESCRIPTIONS.iter().find(|(id, _, _)| *id == badge) {
        Some((_, title, message)) => Celebration {
            kind: CelebrationKind::Badge,
            key: badge.to_string(),
            title: title.to_string(),
            message: message.to_string(),
        },
        None => {
            let title = humanize(badge);
            Celebration {
                kind: CelebrationKind::Badge,
                key: badge.to_string(),
                message: format!("You earned the {} badge.", title),
                title,
            }
        }
    }
}

/// "some_badge" -> "Some Badge"
fn humanize(id: &str) -> String {
    id.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn priority(badge: &str) -> usize {
    BADGE_PRIORITY
        .iter()
        .position(|id| *id == badge)
        .unwrap_or(BADGE_PRIORITY.len())
}

/// Celebrations owed for one transition, in display order
///
/// New badges come first (by priority, unknown ids alphabetically after the
/// known ones), then streak milestones. A reset never celebrates.
pub fn celebrations_for(transition: &Transition) -> Vec<Celebration> {
    if transition.mutation == MutationKind::ResetProgress {
        return Vec::new();
    }
    diff_records(&transition.old, &transition.new)
}

/// Celebrations owed when the transitions between `seen` and `next` were lost
///
/// A reset inside the gap cleared every badge, so everything held after it
/// is new again.
fn celebrations_after_gap(seen: &Transition, next: &Transition) -> Vec<Celebration> {
    if next.mutation == MutationKind::ResetProgress {
        return Vec::new();
    }
    if next.epoch != seen.epoch {
        let cleared = ProgressRecord::new(next.new.first_visit);
        return diff_records(&cleared, &next.new);
    }
    diff_records(&seen.new, &next.new)
}

fn diff_records(old: &ProgressRecord, new: &ProgressRecord) -> Vec<Celebration> {
    let mut badges: Vec<&String> = new.badges.difference(&old.badges).collect();
    // difference() yields ids alphabetically; the stable sort keeps that for ties
    badges.sort_by_key(|badge| priority(badge));

    let mut celebrations: Vec<Celebration> =
        badges.into_iter().map(|badge| describe_badge(badge)).collect();

    for (length, title, message) in STREAK_MILESTONES {
        if old.current_streak < *length && new.current_streak >= *length {
            celebrations.push(Celebration {
                kind: CelebrationKind::Milestone,
                key: format!("streak_{}", length),
                title: title.to_string(),
                message: message.to_string(),
            });
        }
    }
    celebrations
}

/// One visible celebration at a time, the rest waiting in order
#[derive(Debug, Default)]
pub struct CelebrationQueue {
    visible: Option<Celebration>,
    pending: VecDeque<Celebration>,
}

impl CelebrationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, celebrations: impl IntoIterator<Item = Celebration>) {
        self.pending.extend(celebrations);
    }

    /// Show the next pending celebration if nothing is visible
    ///
    /// Returns the celebration that just became visible.
    pub fn show_next(&mut self) -> Option<&Celebration> {
        if self.visible.is_some() {
            return None;
        }
        self.visible = self.pending.pop_front();
        self.visible.as_ref()
    }

    /// Hide the visible celebration, returning it
    pub fn dismiss(&mut self) -> Option<Celebration> {
        self.visible.take()
    }

    pub fn visible(&self) -> Option<&Celebration> {
        self.visible.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn view(&self) -> CelebrationView {
        self.visible
            .as_ref()
            .map(CelebrationView::showing)
            .unwrap_or_default()
    }
}

/// Background task feeding store transitions into a [`CelebrationQueue`]
pub struct CelebrationNotifier {
    view_rx: watch::Receiver<CelebrationView>,
    close_tx: mpsc::UnboundedSender<()>,
}

impl CelebrationNotifier {
    /// Start the notifier
    ///
    /// `transitions` should come from `ProgressStore::subscribe` before any
    /// mutation the caller wants celebrated. `auto_dismiss` of `None` keeps a
    /// celebration visible until [`close`](Self::close).
    pub fn spawn(
        transitions: broadcast::Receiver<Transition>,
        auto_dismiss: Option<Duration>,
        events: Option<EventBus>,
    ) -> Self {
        let (view_tx, view_rx) = watch::channel(CelebrationView::default());
        let (close_tx, close_rx) = mpsc::unbounded_channel();

        tokio::spawn(
            NotifierTask {
                queue: CelebrationQueue::new(),
                deadline: None,
                auto_dismiss,
                view_tx,
                events,
            }
            .run(transitions, close_rx),
        );
        info!("Celebration notifier started (auto-dismiss: {:?})", auto_dismiss);

        Self { view_rx, close_tx }
    }

    /// Current view
    pub fn view(&self) -> CelebrationView {
        self.view_rx.borrow().clone()
    }

    /// Receiver that changes whenever the view does
    pub fn subscribe_view(&self) -> watch::Receiver<CelebrationView> {
        self.view_rx.clone()
    }

    /// Dismiss the visible celebration, if any
    pub fn close(&self) {
        if self.close_tx.send(()).is_err() {
            warn!("Celebration notifier is not running");
        }
    }
}

struct NotifierTask {
    queue: CelebrationQueue,
    deadline: Option<Instant>,
    auto_dismiss: Option<Duration>,
    view_tx: watch::Sender<CelebrationView>,
    events: Option<EventBus>,
}

impl NotifierTask {
    async fn run(
        mut self,
        mut transitions: broadcast::Receiver<Transition>,
        mut close_rx: mpsc::UnboundedReceiver<()>,
    ) {
        let mut store_open = true;
        // Last transition seen, to bridge over transitions lost to lag
        let mut last_seen: Option<Transition> = None;
        let mut lagged = false;

        loop {
            let deadline = self.deadline;
            tokio::select! {
                received = transitions.recv(), if store_open => match received {
                    Ok(transition) => {
                        let celebrations = match last_seen.take() {
                            Some(seen) if lagged => {
                                lagged = false;
                                celebrations_after_gap(&seen, &transition)
                            }
                            _ => celebrations_for(&transition),
                        };
                        last_seen = Some(transition.clone());

                        if !celebrations.is_empty() {
                            debug!(
                                revision = transition.revision,
                                count = celebrations.len(),
                                "Queueing celebrations"
                            );
                            self.queue.enqueue(celebrations);
                            self.show_next();
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Celebration notifier lagged, {} transitions skipped", skipped);
                        lagged = true;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Progress store closed, no more celebrations will be queued");
                        store_open = false;
                    }
                },
                command = close_rx.recv() => match command {
                    Some(()) => self.dismiss(DismissReason::Closed),
                    None => break,
                },
                _ = sleep_until(deadline), if deadline.is_some() => {
                    self.dismiss(DismissReason::Timeout);
                }
            }
        }

        debug!("Celebration notifier stopped");
    }

    fn show_next(&mut self) {
        let Some(celebration) = self.queue.show_next().cloned() else {
            return;
        };
        self.deadline = self.auto_dismiss.map(|after| Instant::now() + after);
        self.view_tx.send_replace(CelebrationView::showing(&celebration));

        info!("Celebrating {}: {}", celebration.key, celebration.title);
        if let Some(events) = &self.events {
            events.emit_lossy(SojournEvent::CelebrationShown {
                kind: celebration.kind,
                key: celebration.key,
                title: celebration.title,
                message: celebration.message,
                pending: self.queue.pending_len(),
                timestamp: sojourn_common::time::now(),
            });
        }
    }

    fn dismiss(&mut self, reason: DismissReason) {
        self.deadline = None;
        let Some(dismissed) = self.queue.dismiss() else {
            return;
        };
        self.view_tx.send_replace(CelebrationView::default());
        debug!(reason = ?reason, "Dismissed celebration {}", dismissed.key);

        if let Some(events) = &self.events {
            events.emit_lossy(SojournEvent::CelebrationDismissed {
                key: dismissed.key,
                reason,
                timestamp: sojourn_common::time::now(),
            });
        }
        self.show_next();
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
