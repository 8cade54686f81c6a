// Integration tests for the local control API

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{MockApi, ScriptedDevice};
use interview_capture::session::{driver, EventSink, InterviewSession, Question, SessionConfig};
use interview_capture::{create_router, AppState};
use serde_json::Value;
use tower::ServiceExt;

fn app() -> (axum::Router, tokio::task::JoinHandle<Vec<String>>) {
    let (device, _probe) = ScriptedDevice::new();
    let session = InterviewSession::new(
        SessionConfig {
            session_id: "ctl-1".to_string(),
            ..SessionConfig::default()
        },
        vec![
            Question::new("q1", "Why this role?"),
            Question::new("q2", "Describe a hard bug."),
        ],
        Box::new(device),
        MockApi::new(),
        EventSink::disabled(),
        Box::new(|_| {}),
    );

    let (handle, task) = driver::spawn(session);
    (create_router(AppState::new(handle)), task)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _task) = app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_status_before_start() {
    let (app, _task) = app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/session/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let status = body_json(response).await;
    assert_eq!(status["session_id"], "ctl-1");
    assert_eq!(status["phase"], "awaiting_fullscreen");
    assert_eq!(status["question_count"], 2);
    assert_eq!(status["current_question"]["id"], "q1");
    assert_eq!(status["remaining_secs"], 1200);
}

#[tokio::test]
async fn test_window_event_accepted() {
    let (app, _task) = app();

    let response = app
        .oneshot(post_json("/session/window-event", r#"{"event":"blur"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["command"], "window-event");
}

#[tokio::test]
async fn test_unknown_window_event_rejected() {
    let (app, _task) = app();

    let response = app
        .oneshot(post_json("/session/window-event", r#"{"event":"resize"}"#))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test(start_paused = true)]
async fn test_start_then_status_in_question() {
    let (app, _task) = app();

    let response = app
        .clone()
        .oneshot(post_json("/session/start", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/session/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = body_json(response).await;

    assert_eq!(status["phase"], "in_question");
    assert_eq!(status["dictating"], true);
    assert_eq!(status["recorder"]["is_active"], true);
}

#[tokio::test]
async fn test_commands_after_session_end_are_gone() {
    let (app, task) = app();
    task.abort();
    let _ = task.await;

    let response = app.oneshot(post_json("/session/advance", "")).await.unwrap();

    assert_eq!(response.status(), StatusCode::GONE);
}
