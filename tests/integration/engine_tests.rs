//! The goose engine driving the workflow against mock services over HTTP.

use std::time::Duration;

use axum::http::Method;
use orbit_loadtest::{Settings, engine, thresholds};
use serial_test::serial;

use crate::common::{TOKEN_A, TOKEN_B, mock_services};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_engine_runs_workflow_against_services() {
    let (endpoints, log) = mock_services().await;
    let settings = Settings::new(endpoints)
        .with_vus(2)
        .with_duration(Duration::from_secs(1))
        .with_pacing(Duration::ZERO);
    let limits = settings.thresholds.clone();

    let summary = engine::run(settings).await.expect("load test failed to run");

    assert_eq!(summary.checks_failed, 0);
    assert!(summary.checks_passed >= 12, "expected at least one full iteration");
    assert!(
        thresholds::evaluate(&limits, &summary)
            .iter()
            .all(|r| r.passed)
    );

    let calls = log.calls();
    for call in &calls {
        let project_path = ["/api/projects", "/api/boards", "/api/participants", "/api/comments"]
            .iter()
            .any(|p| call.path.starts_with(p));
        let expected_service = if project_path { "project" } else { "user" };
        assert_eq!(call.service, expected_service, "{} {}", call.method, call.path);
    }

    let moves: Vec<_> = calls
        .iter()
        .filter(|c| c.method == Method::PUT && c.path == "/api/boards/b1/move")
        .collect();
    assert!(!moves.is_empty(), "board was never moved");
    assert_eq!(
        moves[0].raw_body.as_deref(),
        Some(r#"{"projectId":"p1","groupByFieldName":"stage","newFieldValue":"in_progress"}"#)
    );
    assert_eq!(
        moves[0].authorization.as_deref(),
        Some(format!("Bearer {}", TOKEN_A).as_str())
    );

    let comment = calls
        .iter()
        .find(|c| c.path == "/api/comments")
        .expect("comment was never posted");
    assert_eq!(
        comment.authorization.as_deref(),
        Some(format!("Bearer {}", TOKEN_B).as_str())
    );

    let token_fetch = calls
        .iter()
        .find(|c| c.path.starts_with("/api/users/test/"))
        .unwrap();
    assert!(token_fetch.authorization.is_none());
}

#[tokio::test]
#[serial]
async fn test_engine_rejects_invalid_settings() {
    let settings = Settings::new(orbit_loadtest::Endpoints::new("users.internal", "http://b"));
    let err = engine::run(settings).await.unwrap_err();
    assert!(matches!(err, orbit_loadtest::LoadTestError::Config(_)));
}
