//! Celebration endpoints
//!
//! The presentation layer polls (or listens on SSE) for the visible
//! celebration and calls close when the user dismisses it.

use crate::celebration::CelebrationView;
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};

/// GET /api/celebration
pub async fn get_celebration(State(state): State<AppState>) -> Json<CelebrationView> {
    Json(state.notifier.view())
}

/// POST /api/celebration/close
///
/// Dismissal happens on the notifier task; the next queued celebration, if
/// any, becomes visible right after.
pub async fn close_celebration(State(state): State<AppState>) -> StatusCode {
    state.notifier.close();
    StatusCode::ACCEPTED
}
