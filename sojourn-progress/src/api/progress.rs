//! Progress endpoints
//!
//! One route per store operation. Every mutation returns the state it
//! produced so the caller can render without a second round trip.

use super::ApiResult;
use crate::error::Error;
use crate::persistence::WriterStatus;
use crate::record::{FontSize, JournalEntry, JournalEntryType, Language, ProgressRecord, Theme};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct PersistenceStatus {
    pub backend: &'static str,
    /// Highest revision whose save has finished
    pub settled_revision: u64,
    pub failures: u64,
    pub last_error: Option<String>,
}

impl PersistenceStatus {
    fn new(backend: &'static str, status: WriterStatus) -> Self {
        Self {
            backend,
            settled_revision: status.revision,
            failures: status.failures,
            last_error: status.last_error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub user_id: String,
    pub signed_in: bool,
    pub revision: u64,
    pub record: Arc<ProgressRecord>,
    pub persistence: PersistenceStatus,
}

#[derive(Debug, Deserialize)]
pub struct JournalRequest {
    #[serde(rename = "type")]
    pub entry_type: JournalEntryType,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct BookmarkResponse {
    pub item_id: String,
    pub bookmarked: bool,
}

/// Any subset of the display preferences
#[derive(Debug, Default, Deserialize)]
pub struct PreferencesRequest {
    pub font_size: Option<FontSize>,
    pub theme: Option<Theme>,
    pub language: Option<Language>,
}

/// GET /api/progress
pub async fn get_progress(State(state): State<AppState>) -> Json<ProgressResponse> {
    let store = &state.store;
    let identity = store.identity();
    Json(ProgressResponse {
        user_id: identity.user_id.clone(),
        signed_in: identity.signed_in,
        revision: store.revision(),
        record: store.record(),
        persistence: PersistenceStatus::new(store.backend_name(), store.writer_status()),
    })
}

/// POST /api/sections/:id/complete
pub async fn complete_section(
    State(state): State<AppState>,
    Path(section_id): Path<String>,
) -> Json<Arc<ProgressRecord>> {
    Json(state.store.complete_section(&section_id))
}

/// POST /api/days/:day/complete
pub async fn complete_day(
    State(state): State<AppState>,
    Path(day): Path<u8>,
) -> ApiResult<Json<Arc<ProgressRecord>>> {
    Ok(Json(state.store.complete_day(day)?))
}

/// POST /api/journal
pub async fn add_journal_entry(
    State(state): State<AppState>,
    Json(request): Json<JournalRequest>,
) -> ApiResult<(StatusCode, Json<JournalEntry>)> {
    let entry = state
        .store
        .add_journal_entry(request.entry_type, &request.content)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// DELETE /api/journal/:id
///
/// Succeeds whether or not the entry existed.
pub async fn delete_journal_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
) -> StatusCode {
    state.store.delete_journal_entry(&entry_id);
    StatusCode::NO_CONTENT
}

/// POST /api/bookmarks/:id/toggle
pub async fn toggle_bookmark(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Json<BookmarkResponse> {
    let bookmarked = state.store.toggle_bookmark(&item_id);
    Json(BookmarkResponse {
        item_id,
        bookmarked,
    })
}

/// PUT /api/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    Json(request): Json<PreferencesRequest>,
) -> ApiResult<Json<Arc<ProgressRecord>>> {
    if request.font_size.is_none() && request.theme.is_none() && request.language.is_none() {
        return Err(Error::InvalidArgument(
            "expected at least one of font_size, theme, language".to_string(),
        )
        .into());
    }

    let store = &state.store;
    if let Some(font_size) = request.font_size {
        store.set_font_size(font_size);
    }
    if let Some(theme) = request.theme {
        store.set_theme(theme);
    }
    if let Some(language) = request.language {
        store.set_language(language);
    }
    Ok(Json(store.record()))
}

/// POST /api/progress/reset
pub async fn reset_progress(State(state): State<AppState>) -> Json<Arc<ProgressRecord>> {
    Json(state.store.reset_progress())
}
