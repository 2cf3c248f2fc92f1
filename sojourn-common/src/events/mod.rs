//! Event types for the Sojourn event system
//!
//! Provides shared event definitions and the EventBus used to fan progress
//! notifications out to SSE clients and logging.

mod progress_types;

pub use progress_types::{CelebrationKind, DismissReason, MutationKind};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Sojourn event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// They describe what happened; the full record is fetched separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SojournEvent {
    /// A store mutation was applied in memory
    ///
    /// Triggers:
    /// - SSE: UI refetches the record
    /// - Persistence: a write of this revision is pending
    ProgressUpdated {
        user_id: String,
        mutation: MutationKind,
        /// Store revision after the mutation
        revision: u64,
        timestamp: DateTime<Utc>,
    },

    /// A celebration became visible
    CelebrationShown {
        kind: CelebrationKind,
        /// Badge id or milestone key
        key: String,
        title: String,
        message: String,
        /// Celebrations still waiting behind this one
        pending: usize,
        timestamp: DateTime<Utc>,
    },

    /// The visible celebration was hidden
    CelebrationDismissed {
        key: String,
        reason: DismissReason,
        timestamp: DateTime<Utc>,
    },

    /// A save did not complete; in-memory state is unaffected
    PersistenceFailed {
        user_id: String,
        backend: String,
        revision: u64,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl SojournEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            SojournEvent::ProgressUpdated { .. } => "ProgressUpdated",
            SojournEvent::CelebrationShown { .. } => "CelebrationShown",
            SojournEvent::CelebrationDismissed { .. } => "CelebrationDismissed",
            SojournEvent::PersistenceFailed { .. } => "PersistenceFailed",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use sojourn_common::events::{EventBus, MutationKind, SojournEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(SojournEvent::ProgressUpdated {
///     user_id: "local".to_string(),
///     mutation: MutationKind::CompleteSection,
///     revision: 1,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SojournEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SojournEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SojournEvent,
    ) -> Result<usize, broadcast::error::SendError<SojournEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SojournEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dismissed(key: &str) -> SojournEvent {
        SojournEvent::CelebrationDismissed {
            key: key.to_string(),
            reason: DismissReason::Closed,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(10);
        assert!(bus.emit(dismissed("a")).is_err());
        // lossy variant must not panic
        bus.emit_lossy(dismissed("a"));
    }

    #[test]
    fn test_multiple_subscribers_each_receive() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.emit(dismissed("first_reading")).unwrap(), 2);

        for rx in [&mut rx1, &mut rx2] {
            assert!(matches!(
                rx.try_recv().unwrap(),
                SojournEvent::CelebrationDismissed { ref key, .. } if key == "first_reading"
            ));
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = SojournEvent::ProgressUpdated {
            user_id: "u1".to_string(),
            mutation: MutationKind::CompleteDay,
            revision: 3,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ProgressUpdated");
        assert_eq!(json["mutation"], "complete_day");
        assert_eq!(json["revision"], 3);
        assert_eq!(event.event_type(), "ProgressUpdated");
    }

    #[test]
    fn test_mutation_kind_display_matches_serde() {
        for kind in [
            MutationKind::CompleteSection,
            MutationKind::ResetProgress,
            MutationKind::SetLanguage,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.to_string());
        }
    }
}
