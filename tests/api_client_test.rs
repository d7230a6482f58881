use std::time::Duration;

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

use assessment_client::models::test::ItemPayload;
use assessment_client::models::test_attempt::{AnswerValue, AttemptStatus};
use assessment_client::{ApiClient, TestBackend};

const TOKEN: &str = "student-token";

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

fn client(base: &str) -> ApiClient {
    ApiClient::new(base, TOKEN, Duration::from_secs(5)).expect("client")
}

fn bearer_ok(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(|value| value == format!("Bearer {TOKEN}"))
        .unwrap_or(false)
}

fn unauthorized() -> axum::response::Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "missing bearer token"})),
    )
        .into_response()
}

#[tokio::test]
async fn fetch_test_parses_the_wire_payload() {
    let app = Router::new().route(
        "/api/tests/:slug",
        get(|Path(slug): Path<String>, headers: HeaderMap| async move {
            if !bearer_ok(&headers) {
                return unauthorized();
            }
            if slug != "rust-basics" {
                return (
                    StatusCode::NOT_FOUND,
                    Json(json!({"error": "unknown test"})),
                )
                    .into_response();
            }
            Json(json!({
                "test": {
                    "id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
                    "slug": "rust-basics",
                    "title": "Rust Basics",
                    "description": "Ownership and borrowing.",
                    "duration_minutes": 30,
                    "total_points": 6,
                    "max_attempts": 2,
                    "status": "active",
                    "items": [
                        {
                            "id": 1,
                            "position": 1,
                            "points": 2,
                            "type": "multiple_choice",
                            "question": "What moves ownership?",
                            "options": ["assignment", "borrow", "shadowing"]
                        },
                        {
                            "id": 2,
                            "position": 2,
                            "points": 4,
                            "type": "essay",
                            "prompt": "Explain lifetimes.",
                            "min_words": 50
                        }
                    ]
                },
                "student_stats": {"attempts_used": 1, "best_score": 66.7},
                "can_start_attempt": true,
                "attempts": [
                    {
                        "id": "9b2b9c11-5c4e-4d2c-8a9a-0a4f8c2a1b22",
                        "attempt_number": 1,
                        "status": "graded",
                        "started_at": "2026-08-01T09:00:00Z",
                        "submitted_at": "2026-08-01T09:25:00Z",
                        "total_score": 4.0,
                        "violations_count": 1
                    }
                ]
            }))
            .into_response()
        }),
    );
    let base = serve(app).await;

    let detail = client(&base)
        .fetch_test("rust-basics")
        .await
        .expect("fetch test");

    assert_eq!(detail.test.title, "Rust Basics");
    assert_eq!(detail.test.duration_minutes, Some(30));
    assert_eq!(detail.test.items.len(), 2);
    assert!(matches!(
        detail.test.items[0].payload,
        ItemPayload::MultipleChoice { ref options, .. } if options.len() == 3
    ));
    assert!(matches!(
        detail.test.items[1].payload,
        ItemPayload::Essay { min_words: Some(50), .. }
    ));
    assert!(detail.can_start_attempt);
    assert_eq!(detail.student_stats.expect("stats").attempts_used, 1);
    assert_eq!(detail.attempts.len(), 1);
    assert_eq!(detail.attempts[0].status, AttemptStatus::Graded);
    assert!(detail.attempts[0].submissions.is_empty());
}

#[tokio::test]
async fn api_errors_carry_status_and_server_message() {
    let app = Router::new().route(
        "/api/tests/:slug/attempts",
        post(|| async {
            (
                StatusCode::FORBIDDEN,
                Json(json!({"error": "No attempts remaining"})),
            )
        }),
    );
    let base = serve(app).await;

    let err = client(&base)
        .start_attempt("rust-basics")
        .await
        .expect_err("must fail");

    match err {
        assessment_client::error::Error::Api { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "No attempts remaining");
        }
        other => panic!("unexpected error: {other}"),
    }
    // A plain rejection is not the benign closed-attempt race.
    let err = client(&base)
        .start_attempt("rust-basics")
        .await
        .expect_err("must fail");
    assert!(!err.is_attempt_closed());
}

#[tokio::test]
async fn closed_attempt_conflicts_are_flagged_as_benign() {
    let app = Router::new().route(
        "/api/tests/:slug/attempts/:id/answers",
        post(|| async {
            (
                StatusCode::CONFLICT,
                Json(json!({"error": "Attempt is not in progress"})),
            )
        }),
    );
    let base = serve(app).await;

    let err = client(&base)
        .save_answer(
            "rust-basics",
            Uuid::new_v4(),
            1,
            &AnswerValue::Text("42".to_string()),
        )
        .await
        .expect_err("must fail");

    assert!(err.is_attempt_closed());
}

#[tokio::test]
async fn save_answer_round_trips_the_request_body() {
    let app = Router::new().route(
        "/api/tests/:slug/attempts/:id/answers",
        post(
            |Path((_slug, _id)): Path<(String, Uuid)>, Json(body): Json<Value>| async move {
                if body["item_id"] != json!(7) || body["answer"] != json!("42") {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"error": "unexpected body"})),
                    )
                        .into_response();
                }
                Json(json!({
                    "saved": true,
                    "item_id": 7,
                    "timestamp": "2026-08-07T10:00:00Z"
                }))
                .into_response()
            },
        ),
    );
    let base = serve(app).await;

    client(&base)
        .save_answer(
            "rust-basics",
            Uuid::new_v4(),
            7,
            &AnswerValue::Text("42".to_string()),
        )
        .await
        .expect("save answer");
}

#[tokio::test]
async fn submit_returns_the_graded_attempt() {
    let app = Router::new().route(
        "/api/tests/:slug/attempts/:id/submit",
        post(|Path((_slug, id)): Path<(String, Uuid)>| async move {
            Json(json!({
                "attempt": {
                    "id": id,
                    "attempt_number": 1,
                    "status": "graded",
                    "started_at": "2026-08-07T09:00:00Z",
                    "submitted_at": "2026-08-07T09:30:00Z",
                    "total_score": 5.0,
                    "violations_count": 0,
                    "submissions": [
                        {"item_id": 1, "answer": 2, "score": 2.0},
                        {"item_id": 2, "answer": "ownership", "score": 3.0}
                    ]
                }
            }))
        }),
    );
    let base = serve(app).await;

    let attempt_id = Uuid::new_v4();
    let response = client(&base)
        .submit_attempt("rust-basics", attempt_id)
        .await
        .expect("submit");

    assert_eq!(response.attempt.id, attempt_id);
    assert_eq!(response.attempt.status, AttemptStatus::Graded);
    assert_eq!(response.attempt.total_score, Some(5.0));
    assert_eq!(response.attempt.submissions.len(), 2);
    assert_eq!(
        response.attempt.submissions[0].answer,
        AnswerValue::Choice(2)
    );
}

#[tokio::test]
async fn violation_reports_and_heartbeats_post_fire_and_forget() {
    let app = Router::new()
        .route(
            "/api/tests/:slug/attempts/:id/violations",
            post(|Json(body): Json<Value>| async move {
                if body["type"] != json!("app_background") {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"error": "unexpected violation type"})),
                    )
                        .into_response();
                }
                StatusCode::NO_CONTENT.into_response()
            }),
        )
        .route(
            "/api/tests/:slug/attempts/:id/heartbeat",
            post(|| async { StatusCode::NO_CONTENT }),
        );
    let base = serve(app).await;
    let api = client(&base);
    let attempt_id = Uuid::new_v4();

    let violation = assessment_client::models::violation::Violation::new(
        assessment_client::models::violation::ViolationKind::AppBackground,
        None,
    );
    api.report_violation("rust-basics", attempt_id, &violation)
        .await
        .expect("report violation");
    api.heartbeat("rust-basics", attempt_id)
        .await
        .expect("heartbeat");
}
