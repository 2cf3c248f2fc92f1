//! Integration tests for sojourn-progress API endpoints
//!
//! Tests cover:
//! - Health endpoint
//! - Progress read and every mutation route
//! - Input validation (400 responses)
//! - Celebration view and close

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use sojourn_common::events::EventBus;
use sojourn_common::time::ManualClock;
use sojourn_progress::celebration::CelebrationNotifier;
use sojourn_progress::identity::Identity;
use sojourn_progress::persistence::{LocalAdapter, MemoryKeyValueStore};
use sojourn_progress::store::{ProgressStore, StoreSettings};
use sojourn_progress::{build_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: in-memory store, notifier without auto-dismiss
async fn setup_app() -> (axum::Router, Arc<ProgressStore>) {
    let events = EventBus::new(64);
    let store = Arc::new(
        ProgressStore::open(
            Identity::signed_in("reader-1"),
            Arc::new(LocalAdapter::new(MemoryKeyValueStore::new())),
            Arc::new(ManualClock::at_date(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            )),
            StoreSettings {
                events: Some(events.clone()),
                ..StoreSettings::default()
            },
        )
        .await,
    );
    let notifier = Arc::new(CelebrationNotifier::spawn(
        store.subscribe(),
        None,
        Some(events.clone()),
    ));
    let app = build_router(AppState::new(store.clone(), notifier, events));
    (app, store)
}

/// Test helper: Create request without body
fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: Create request with JSON body
fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Test helper: Poll the celebration endpoint until `predicate` holds
async fn wait_for_celebration(app: &axum::Router, predicate: impl Fn(&Value) -> bool) -> Value {
    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(test_request("GET", "/api/celebration"))
            .await
            .unwrap();
        let body = extract_json(response.into_body()).await;
        if predicate(&body) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("celebration never matched");
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = setup_app().await;

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "sojourn-progress");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_get_progress_fresh_record() {
    let (app, _) = setup_app().await;

    let response = app
        .oneshot(test_request("GET", "/api/progress"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["user_id"], "reader-1");
    assert_eq!(body["signed_in"], true);
    assert_eq!(body["revision"], 0);
    assert_eq!(body["record"]["current_streak"], 0);
    assert_eq!(body["record"]["font_size"], "medium");
    assert_eq!(body["record"]["language"], "en");
    assert_eq!(body["persistence"]["backend"], "local");
}

#[tokio::test]
async fn test_complete_section_grants_badges() {
    let (app, store) = setup_app().await;

    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/sections/code/complete"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let badges = body["badges"].as_array().unwrap();
    assert!(badges.contains(&json!("code_keeper")));
    assert!(badges.contains(&json!("first_reading")));

    // Repeating is a no-op
    app.oneshot(test_request("POST", "/api/sections/code/complete"))
        .await
        .unwrap();
    assert_eq!(store.revision(), 1);
}

#[tokio::test]
async fn test_complete_day_validates_range() {
    let (app, _) = setup_app().await;

    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/days/1/complete"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["current_streak"], 1);
    assert_eq!(body["last_practice_date"], "2024-01-01");

    let response = app
        .oneshot(test_request("POST", "/api/days/9/complete"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"].as_str().unwrap().contains("outside the plan"));
}

#[tokio::test]
async fn test_journal_create_and_delete() {
    let (app, store) = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/journal",
            json!({"type": "gratitude", "content": "warm tea"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let entry = extract_json(response.into_body()).await;
    assert_eq!(entry["type"], "gratitude");
    assert_eq!(entry["content"], "warm tea");
    let id = entry["id"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(test_request("DELETE", &format!("/api/journal/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
    assert!(store.record().journal_entries.is_empty());
    assert_eq!(store.revision(), 2);
}

#[tokio::test]
async fn test_blank_journal_entry_is_rejected() {
    let (app, store) = setup_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/journal",
            json!({"type": "reflection", "content": "   "}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.revision(), 0);
}

#[tokio::test]
async fn test_toggle_bookmark() {
    let (app, _) = setup_app().await;

    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/bookmarks/meditation-2/toggle"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["item_id"], "meditation-2");
    assert_eq!(body["bookmarked"], true);

    let response = app
        .oneshot(test_request("POST", "/api/bookmarks/meditation-2/toggle"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["bookmarked"], false);
}

#[tokio::test]
async fn test_update_preferences() {
    let (app, _) = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/preferences",
            json!({"theme": "sepia", "language": "pt-BR"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["theme"], "sepia");
    assert_eq!(body["language"], "pt-BR");
    assert_eq!(body["font_size"], "medium");

    let response = app
        .oneshot(json_request("PUT", "/api/preferences", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reset_progress() {
    let (app, store) = setup_app().await;
    store.complete_section("intro");
    store.toggle_bookmark("intro");

    let response = app
        .oneshot(test_request("POST", "/api/progress/reset"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["completed_sections"], json!([]));
    assert_eq!(body["bookmarks"], json!([]));
    assert_eq!(body["badges"], json!([]));
    assert_eq!(store.identity(), &Identity::signed_in("reader-1"));
}

#[tokio::test]
async fn test_celebration_view_and_close() {
    let (app, _) = setup_app().await;

    let body = wait_for_celebration(&app, |_| true).await;
    assert_eq!(body["is_visible"], false);

    app.clone()
        .oneshot(test_request("POST", "/api/sections/code/complete"))
        .await
        .unwrap();

    let body = wait_for_celebration(&app, |v| v["is_visible"] == true).await;
    assert_eq!(body["key"], "code_keeper");
    assert_eq!(body["kind"], "badge");
    assert_eq!(body["title"], "Code Keeper");

    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/celebration/close"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = wait_for_celebration(&app, |v| v["key"] == "first_reading").await;
    assert_eq!(body["is_visible"], true);
}
