//! Progress Record
//!
//! A versioned snapshot of one user's advancement and preferences. Records
//! are values: the store replaces the whole record on every mutation and
//! hands out `Arc<ProgressRecord>` snapshots, so a reader never observes a
//! half-applied change.

use crate::catalog::Catalog;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sojourn_common::time::Calendar;
use std::collections::{BTreeSet, HashSet};
use tracing::warn;

/// Shape version written with every record
pub const RECORD_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Default,
    Sepia,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    En,
    #[serde(rename = "pt-BR")]
    PtBr,
}

/// Journal taxonomy, owned by the content catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalEntryType {
    Intention,
    Sign,
    Gratitude,
    Reflection,
}

/// Immutable once created; only deletion is allowed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub entry_type: JournalEntryType,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub schema_version: u32,
    pub completed_sections: BTreeSet<String>,
    pub completed_days: BTreeSet<u8>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_practice_date: Option<NaiveDate>,
    pub journal_entries: Vec<JournalEntry>,
    pub bookmarks: BTreeSet<String>,
    pub font_size: FontSize,
    pub theme: Theme,
    pub language: Language,
    pub badges: BTreeSet<String>,
    /// Set once at creation
    pub first_visit: DateTime<Utc>,
}

impl ProgressRecord {
    /// Default record for a first visit at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            schema_version: RECORD_SCHEMA_VERSION,
            completed_sections: BTreeSet::new(),
            completed_days: BTreeSet::new(),
            current_streak: 0,
            longest_streak: 0,
            last_practice_date: None,
            journal_entries: Vec::new(),
            bookmarks: BTreeSet::new(),
            font_size: FontSize::default(),
            theme: Theme::default(),
            language: Language::default(),
            badges: BTreeSet::new(),
            first_visit: now,
        }
    }

    /// Decode a stored record, one field at a time
    ///
    /// Missing or malformed fields fall back to the defaults of
    /// [`ProgressRecord::new`]; malformed list elements are skipped, as are
    /// journal entries repeating an earlier id. Returns
    /// `None` when `value` is not an object at all. `now` is used as
    /// `first_visit` when the stored one is unusable.
    pub fn from_stored(value: &Value, now: DateTime<Utc>) -> Option<Self> {
        let fields = value.as_object()?;
        let defaults = Self::new(now);

        let current_streak = field(fields, "current_streak").unwrap_or(defaults.current_streak);
        let longest_streak: u32 = field(fields, "longest_streak").unwrap_or(defaults.longest_streak);

        Some(Self {
            schema_version: RECORD_SCHEMA_VERSION,
            completed_sections: list(fields, "completed_sections").into_iter().collect(),
            completed_days: list(fields, "completed_days").into_iter().collect(),
            current_streak,
            longest_streak: longest_streak.max(current_streak),
            last_practice_date: field(fields, "last_practice_date"),
            journal_entries: unique_ids(list(fields, "journal_entries")),
            bookmarks: list(fields, "bookmarks").into_iter().collect(),
            font_size: field(fields, "font_size").unwrap_or(defaults.font_size),
            theme: field(fields, "theme").unwrap_or(defaults.theme),
            language: field(fields, "language").unwrap_or(defaults.language),
            badges: list(fields, "badges").into_iter().collect(),
            first_visit: field(fields, "first_visit").unwrap_or(defaults.first_visit),
        })
    }

    /// Encode as the stored JSON object
    pub fn to_stored(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn journal_count(&self, entry_type: JournalEntryType) -> usize {
        self.journal_entries
            .iter()
            .filter(|e| e.entry_type == entry_type)
            .count()
    }

    /// Number of distinct calendar days with at least one journal entry
    pub fn journal_days(&self, calendar: &Calendar) -> usize {
        self.journal_entries
            .iter()
            .map(|e| calendar.date_of(e.date))
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn has_badge(&self, badge: &str) -> bool {
        self.badges.contains(badge)
    }

    /// Drop completed days outside the catalog's plan, returning how many
    pub fn retain_plan_days(&mut self, catalog: &Catalog) -> usize {
        let before = self.completed_days.len();
        self.completed_days.retain(|day| catalog.is_plan_day(*day));
        before - self.completed_days.len()
    }
}

/// First entry wins when ids repeat
fn unique_ids(entries: Vec<JournalEntry>) -> Vec<JournalEntry> {
    let mut seen = HashSet::new();
    let before = entries.len();
    let unique: Vec<JournalEntry> = entries
        .into_iter()
        .filter(|entry| seen.insert(entry.id.clone()))
        .collect();
    if unique.len() != before {
        warn!(
            "Dropped {} stored journal entries with duplicate ids",
            before - unique.len()
        );
    }
    unique
}

fn field<T: DeserializeOwned>(fields: &Map<String, Value>, key: &str) -> Option<T> {
    let value = fields.get(key)?;
    if value.is_null() {
        return None;
    }
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Stored field '{}' is malformed, using default: {}", key, e);
            None
        }
    }
}

fn list<T: DeserializeOwned>(fields: &Map<String, Value>, key: &str) -> Vec<T> {
    let Some(value) = fields.get(key) else {
        return Vec::new();
    };
    let Some(items) = value.as_array() else {
        if !value.is_null() {
            warn!("Stored field '{}' is not a list, using default", key);
        }
        return Vec::new();
    };

    let parsed: Vec<T> = items
        .iter()
        .filter_map(|item| T::deserialize(item).ok())
        .collect();
    if parsed.len() != items.len() {
        warn!(
            "Stored field '{}': skipped {} malformed element(s)",
            key,
            items.len() - parsed.len()
        );
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_new_record_defaults() {
        let record = ProgressRecord::new(now());
        assert!(record.completed_sections.is_empty());
        assert!(record.completed_days.is_empty());
        assert_eq!(record.current_streak, 0);
        assert_eq!(record.longest_streak, 0);
        assert!(record.last_practice_date.is_none());
        assert!(record.badges.is_empty());
        assert_eq!(record.font_size, FontSize::Medium);
        assert_eq!(record.theme, Theme::Default);
        assert_eq!(record.language, Language::En);
        assert_eq!(record.first_visit, now());
    }

    #[test]
    fn test_stored_shape_uses_wire_names() {
        let mut record = ProgressRecord::new(now());
        record.language = Language::PtBr;
        record.journal_entries.push(JournalEntry {
            id: "j1".to_string(),
            date: now(),
            entry_type: JournalEntryType::Gratitude,
            content: "sunlight".to_string(),
        });

        let stored = record.to_stored().unwrap();
        assert_eq!(stored["language"], "pt-BR");
        assert_eq!(stored["font_size"], "medium");
        assert_eq!(stored["journal_entries"][0]["type"], "gratitude");

        assert_eq!(ProgressRecord::from_stored(&stored, now()), Some(record));
    }

    #[test]
    fn test_non_object_is_absent() {
        assert!(ProgressRecord::from_stored(&json!("garbage"), now()).is_none());
        assert!(ProgressRecord::from_stored(&json!([1, 2]), now()).is_none());
        assert!(ProgressRecord::from_stored(&Value::Null, now()).is_none());
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        // An older record that predates preferences and badges
        let stored = json!({
            "completed_sections": ["intro"],
            "current_streak": 2,
            "longest_streak": 4,
            "last_practice_date": "2024-01-01"
        });

        let record = ProgressRecord::from_stored(&stored, now()).unwrap();
        assert!(record.completed_sections.contains("intro"));
        assert_eq!(record.current_streak, 2);
        assert_eq!(record.longest_streak, 4);
        assert_eq!(record.last_practice_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert!(record.badges.is_empty());
        assert_eq!(record.theme, Theme::Default);
        assert_eq!(record.first_visit, now());
    }

    #[test]
    fn test_malformed_fields_fall_back_individually() {
        let stored = json!({
            "completed_sections": "not-a-list",
            "completed_days": [1, "two", 3, 900],
            "current_streak": -5,
            "theme": "neon",
            "language": "pt-BR",
            "badges": ["first_reading", 7],
            "journal_entries": [
                {"id": "ok", "date": "2024-01-01T10:00:00Z", "type": "sign", "content": "bird"},
                {"id": "bad", "date": "yesterday", "type": "sign", "content": "?"}
            ],
            "unknown_future_field": {"anything": true}
        });

        let record = ProgressRecord::from_stored(&stored, now()).unwrap();
        assert!(record.completed_sections.is_empty());
        assert_eq!(record.completed_days.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(record.current_streak, 0);
        assert_eq!(record.theme, Theme::Default);
        assert_eq!(record.language, Language::PtBr);
        assert_eq!(record.badges.len(), 1);
        assert_eq!(record.journal_entries.len(), 1);
        assert_eq!(record.journal_entries[0].id, "ok");
    }

    #[test]
    fn test_duplicate_journal_ids_keep_first() {
        let stored = json!({
            "journal_entries": [
                {"id": "j1", "date": "2024-01-01T10:00:00Z", "type": "sign", "content": "first"},
                {"id": "j2", "date": "2024-01-02T10:00:00Z", "type": "sign", "content": "other"},
                {"id": "j1", "date": "2024-01-03T10:00:00Z", "type": "sign", "content": "again"}
            ]
        });

        let record = ProgressRecord::from_stored(&stored, now()).unwrap();
        let contents: Vec<&str> = record.journal_entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "other"]);
    }

    #[test]
    fn test_retain_plan_days_drops_out_of_range() {
        let stored = json!({"completed_days": [0, 1, 7, 8, 200]});
        let mut record = ProgressRecord::from_stored(&stored, now()).unwrap();

        assert_eq!(record.retain_plan_days(&Catalog::default()), 3);
        assert_eq!(record.completed_days.iter().copied().collect::<Vec<_>>(), vec![1, 7]);
        assert_eq!(record.retain_plan_days(&Catalog::default()), 0);
    }

    #[test]
    fn test_longest_never_below_current_after_decode() {
        let stored = json!({"current_streak": 5, "longest_streak": 2});
        let record = ProgressRecord::from_stored(&stored, now()).unwrap();
        assert_eq!(record.longest_streak, 5);
    }

    #[test]
    fn test_journal_statistics() {
        let mut record = ProgressRecord::new(now());
        for (day, hour, entry_type) in [
            (1, 8, JournalEntryType::Sign),
            (1, 20, JournalEntryType::Sign),
            (2, 9, JournalEntryType::Gratitude),
        ] {
            record.journal_entries.push(JournalEntry {
                id: format!("{}-{}", day, hour),
                date: Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap(),
                entry_type,
                content: "x".to_string(),
            });
        }

        assert_eq!(record.journal_count(JournalEntryType::Sign), 2);
        assert_eq!(record.journal_count(JournalEntryType::Reflection), 0);
        assert_eq!(record.journal_days(&Calendar::utc()), 2);
        // At UTC+05:00 the 20:00 entry lands on Jan 2
        let shifted = Calendar::with_offset_minutes(300).unwrap();
        assert_eq!(record.journal_days(&shifted), 2);
    }
}
