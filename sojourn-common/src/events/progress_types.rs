//! Progress-related supporting types for events

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which store operation produced a record transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    CompleteSection,
    CompleteDay,
    AddJournalEntry,
    DeleteJournalEntry,
    ToggleBookmark,
    SetFontSize,
    SetTheme,
    SetLanguage,
    ResetProgress,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::CompleteSection => "complete_section",
            MutationKind::CompleteDay => "complete_day",
            MutationKind::AddJournalEntry => "add_journal_entry",
            MutationKind::DeleteJournalEntry => "delete_journal_entry",
            MutationKind::ToggleBookmark => "toggle_bookmark",
            MutationKind::SetFontSize => "set_font_size",
            MutationKind::SetTheme => "set_theme",
            MutationKind::SetLanguage => "set_language",
            MutationKind::ResetProgress => "reset_progress",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a celebration is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CelebrationKind {
    /// A badge was added to the record
    Badge,
    /// A streak threshold was reached
    Milestone,
}

/// Why a visible celebration went away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissReason {
    /// The presentation layer called close()
    Closed,
    /// Auto-dismiss deadline passed
    Timeout,
}
