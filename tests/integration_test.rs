use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

const USER: &str = "itest-user";

fn get_request(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, user: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn start_session(app: &Router, user: &str) -> Value {
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/exam/sessions",
            Some(user),
            &json!({ "rating": common::TEST_RATING }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    assert_eq!(body["success"], json!(true));
    body["data"].clone()
}

#[tokio::test]
async fn test_health_root() {
    let app = common::create_test_app().await;

    let response = app.oneshot(get_request("/health", None)).await.unwrap();

    assert!(
        response.status() == StatusCode::OK || response.status() == StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn test_health_live() {
    let app = common::create_test_app().await;

    let response = app.oneshot(get_request("/health/live", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_info() {
    let app = common::create_test_app().await;

    let response = app.oneshot(get_request("/health/info", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["service"], json!("checkride-backend"));
}

#[tokio::test]
async fn test_health_database_reports_memory_mode() {
    let app = common::create_test_app().await;

    let response = app
        .oneshot(get_request("/health/database", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["mode"], json!("memory-only"));
    assert_eq!(body["healthy"], json!(false));
}

#[tokio::test]
async fn test_404_not_found() {
    let app = common::create_test_app().await;

    let response = app
        .oneshot(get_request("/nonexistent/path", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_start_requires_identity() {
    let app = common::create_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/exam/sessions",
            None,
            &json!({ "rating": common::TEST_RATING }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!("UNAUTHORIZED"));
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = common::create_test_app().await;

    let response = app
        .oneshot(get_request("/api/exam/sessions/no-such-id", Some(USER)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_is_private_to_its_owner() {
    let app = common::create_test_app().await;
    let session = start_session(&app, "owner-user").await;
    let id = session["id"].as_str().unwrap();

    let response = app
        .oneshot(get_request(
            &format!("/api/exam/sessions/{id}"),
            Some("some-other-user"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_full_session_flow() {
    let app = common::create_test_app().await;

    // Start with a minimal config; mode and difficulty default.
    let session = start_session(&app, USER).await;
    let id = session["id"].as_str().unwrap().to_string();
    assert_eq!(session["status"], json!("active"));
    assert_eq!(session["version"], json!(1));

    // The session is discoverable without knowing its id.
    let response = app
        .clone()
        .oneshot(get_request("/api/exam/sessions/active", Some(USER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["id"], json!(id.clone()));

    // First question comes from the head of the linear queue.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/exam/sessions/{id}/next"),
            Some(USER),
            &json!({ "version": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let turn = json_body(response).await["data"].clone();
    assert_eq!(turn["state"], json!("question"));
    assert_eq!(turn["elementCode"], json!("PA.I.A.K1"));
    assert_eq!(turn["version"], json!(2));
    assert_eq!(turn["isFollowUp"], json!(false));

    // A self-graded pass advances to the next element.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/exam/sessions/{id}/answer"),
            Some(USER),
            &json!({ "version": 2, "selfOutcome": "satisfactory" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let feedback = json_body(response).await["data"].clone();
    assert_eq!(feedback["elementCode"], json!("PA.I.A.K1"));
    assert_eq!(feedback["outcome"], json!("satisfactory"));
    assert_eq!(feedback["followUpGranted"], json!(false));
    assert_eq!(feedback["next"]["state"], json!("question"));
    assert_eq!(feedback["next"]["elementCode"], json!("PA.I.A.K2"));
    assert_eq!(feedback["next"]["version"], json!(3));

    // Ending without a trigger defaults to a user-initiated end, graded
    // against what was asked.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/exam/sessions/{id}/end"),
            Some(USER),
            &json!({ "version": 3 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ended = json_body(response).await["data"].clone();
    assert_eq!(ended["status"], json!("completed"));
    assert_eq!(ended["result"]["grade"], json!("satisfactory"));
    assert_eq!(ended["result"]["askedCount"], json!(1));
}

#[tokio::test]
async fn test_stale_version_is_a_conflict() {
    let app = common::create_test_app().await;
    let session = start_session(&app, "conflict-user").await;
    let id = session["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/exam/sessions/{id}/next"),
            Some("conflict-user"),
            &json!({ "version": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Replaying the original version after the session moved on.
    let response = app
        .oneshot(post_json(
            &format!("/api/exam/sessions/{id}/answer"),
            Some("conflict-user"),
            &json!({ "version": 1, "selfOutcome": "satisfactory" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!("STALE_SESSION"));
}

#[tokio::test]
async fn test_reference_search_requires_a_query() {
    let app = common::create_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/reference/search",
            None,
            &json!({ "query": "   " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reference_search_degrades_without_storage() {
    let app = common::create_test_app().await;

    let response = app
        .oneshot(post_json(
            "/api/reference/search",
            None,
            &json!({ "query": "minimum equipment for day VFR flight" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["results"], json!([]));
    assert!(body["data"]["inferredFilter"].is_object());
}
