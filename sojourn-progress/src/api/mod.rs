//! HTTP API for the progress engine
//!
//! Thin handlers over the shared [`ProgressStore`](crate::store::ProgressStore)
//! and [`CelebrationNotifier`](crate::celebration::CelebrationNotifier).
//! Mutation endpoints answer with the new in-memory state; persistence is
//! never awaited on the request path.

pub mod celebration;
pub mod health;
pub mod progress;
pub mod sse;

pub use celebration::{close_celebration, get_celebration};
pub use health::health_routes;
pub use progress::{
    add_journal_entry, complete_day, complete_section, delete_journal_entry, get_progress,
    reset_progress, toggle_bookmark, update_preferences,
};
pub use sse::event_stream;

use crate::error::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Error returned by handlers
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            _ => {
                error!("Request failed: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.0.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
