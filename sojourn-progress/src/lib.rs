//! sojourn-progress library - progress & achievement engine
//!
//! Tracks a reader's sections, practice days, journal and bookmarks; derives
//! streaks and badges; persists the record best-effort; and raises one
//! celebration per newly reached achievement.

use axum::Router;
use sojourn_common::events::EventBus;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod achievements;
pub mod api;
pub mod catalog;
pub mod celebration;
pub mod error;
pub mod identity;
pub mod persistence;
pub mod record;
pub mod store;
pub mod streak;

pub use error::{Error, Result};

use celebration::CelebrationNotifier;
use store::ProgressStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ProgressStore>,
    pub notifier: Arc<CelebrationNotifier>,
    /// Source of the `/events` SSE stream
    pub events: EventBus,
}

impl AppState {
    pub fn new(
        store: Arc<ProgressStore>,
        notifier: Arc<CelebrationNotifier>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            notifier,
            events,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post, put};

    let routes = Router::new()
        .route("/api/progress", get(api::get_progress))
        .route("/api/progress/reset", post(api::reset_progress))
        .route("/api/sections/:id/complete", post(api::complete_section))
        .route("/api/days/:day/complete", post(api::complete_day))
        .route("/api/journal", post(api::add_journal_entry))
        .route("/api/journal/:id", delete(api::delete_journal_entry))
        .route("/api/bookmarks/:id/toggle", post(api::toggle_bookmark))
        .route("/api/preferences", put(api::update_preferences))
        .route("/api/celebration", get(api::get_celebration))
        .route("/api/celebration/close", post(api::close_celebration))
        .route("/events", get(api::event_stream));

    Router::new()
        .merge(routes)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
