//! Shared test utilities for integration tests.
//!
//! Two kinds of fake backend: a scripted in-memory [`Transport`] for
//! driving the workflow step by step, and real axum servers standing in
//! for the user and project services when the goose engine is involved.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use orbit_loadtest::api::{ApiRequest, ApiResponse};
use orbit_loadtest::{Endpoints, Transport, TransportError};
use serde_json::{Value, json};

pub const TOKEN_A: &str = "eyJhbGciOiJIUzI1NiJ9.user-a.signature";
pub const TOKEN_B: &str = "eyJhbGciOiJIUzI1NiJ9.user-b.signature";

pub fn endpoints() -> Endpoints {
    Endpoints::new("http://users.test", "http://projects.test")
}

/// A transport whose answers come from a closure over the outgoing request.
pub struct ScriptedTransport<F> {
    respond: F,
    pub sent: Vec<ApiRequest>,
    pub checks: Vec<(&'static str, bool)>,
}

impl<F> ScriptedTransport<F>
where
    F: FnMut(&ApiRequest) -> Result<ApiResponse, TransportError> + Send,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            sent: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn sent_names(&self) -> Vec<&'static str> {
        self.sent.iter().map(|r| r.name).collect()
    }

    pub fn sent_to(&self, path_prefix: &str) -> bool {
        self.sent.iter().any(|r| r.path.starts_with(path_prefix))
    }
}

impl<F> Transport for ScriptedTransport<F>
where
    F: FnMut(&ApiRequest) -> Result<ApiResponse, TransportError> + Send,
{
    async fn send(&mut self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let response = (self.respond)(&request);
        self.sent.push(request);
        response
    }

    fn record_check(&mut self, check: &'static str, passed: bool) {
        self.checks.push((check, passed));
    }
}

/// What well-behaved services answer, keyed by request name.
pub fn happy(request: &ApiRequest) -> Result<ApiResponse, TransportError> {
    let (status, body) = match request.name {
        "createUserA" => (201, r#"{"userId":"u1"}"#),
        "createUserB" => (201, r#"{"userId":"u2"}"#),
        "getAccessTokenA" => (200, TOKEN_A),
        "getAccessTokenB" => (200, TOKEN_B),
        "createWorkspace" => (201, r#"{"workspaceId":"w1"}"#),
        "createProject" => (201, r#"{"data":{"projectId":"p1"}}"#),
        "createBoard" => (201, r#"{"data":{"boardId":"b1"}}"#),
        "inviteUserB" => (200, r#"{"message":"invited"}"#),
        "getProjectMembers" => (200, r#"{"data":[]}"#),
        "addParticipantB" => (201, r#"{"data":{}}"#),
        "createComment" => (201, r#"{"data":{"commentId":"c1"}}"#),
        "moveBoard" => (200, r#"{"data":{}}"#),
        other => panic!("unexpected request {}", other),
    };
    Ok(ApiResponse::new(status, body))
}

/// Parses a request body the scenario built.
pub fn body_json(request: &ApiRequest) -> Value {
    serde_json::from_str(request.body.as_deref().expect("request has no body"))
        .expect("request body is not JSON")
}

/// `happy`, except for the named request.
pub fn happy_except(
    name: &'static str,
    status: u16,
    body: &'static str,
) -> impl FnMut(&ApiRequest) -> Result<ApiResponse, TransportError> + Send {
    move |request| {
        if request.name == name {
            Ok(ApiResponse::new(status, body))
        } else {
            happy(request)
        }
    }
}

/// One call observed by a mock service.
#[derive(Debug, Clone)]
pub struct Call {
    pub service: &'static str,
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    /// Body exactly as it arrived on the wire.
    pub raw_body: Option<String>,
    pub body: Option<Value>,
}

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().expect("call log poisoned").clone()
    }

    fn push(&self, call: Call) {
        self.0.lock().expect("call log poisoned").push(call);
    }
}

#[derive(Clone)]
struct MockState {
    service: &'static str,
    log: CallLog,
}

fn record(state: &MockState, method: Method, uri: &Uri, headers: &HeaderMap, raw_body: Option<String>) {
    let body = raw_body
        .as_deref()
        .map(|raw| serde_json::from_str(raw).expect("mock service got a non-JSON body"));
    state.log.push(Call {
        service: state.service,
        method,
        path: uri.path().to_string(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        raw_body,
        body,
    });
}

async fn create_user(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    raw: String,
) -> (StatusCode, Json<Value>) {
    let user_id = if raw.contains(r#""email":"userA"#) {
        "ua"
    } else {
        "ub"
    };
    record(&state, method, &uri, &headers, Some(raw));
    (StatusCode::CREATED, Json(json!({ "userId": user_id })))
}

async fn test_token(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> String {
    record(&state, method, &uri, &headers, None);
    if user_id == "ua" {
        TOKEN_A.to_string()
    } else {
        TOKEN_B.to_string()
    }
}

async fn created(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    raw: String,
) -> (StatusCode, Json<Value>) {
    let response = match uri.path() {
        "/api/workspaces/create" => json!({ "workspaceId": "w1" }),
        "/api/projects" => json!({ "data": { "projectId": "p1" } }),
        "/api/boards" => json!({ "data": { "boardId": "b1" } }),
        "/api/comments" => json!({ "data": { "commentId": "c1" } }),
        _ => json!({ "data": {} }),
    };
    record(&state, method, &uri, &headers, Some(raw));
    (StatusCode::CREATED, Json(response))
}

async fn ok_with_body(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    raw: String,
) -> Json<Value> {
    record(&state, method, &uri, &headers, Some(raw));
    Json(json!({ "data": {} }))
}

async fn ok_empty(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Json<Value> {
    record(&state, method, &uri, &headers, None);
    Json(json!({ "data": [] }))
}

fn user_service(log: CallLog) -> Router {
    Router::new()
        .route("/api/users", post(create_user))
        .route("/api/users/test/:user_id", get(test_token))
        .route("/api/workspaces/create", post(created))
        .route("/api/workspaces/:id/members/invite", post(ok_with_body))
        .with_state(MockState {
            service: "user",
            log,
        })
}

fn project_service(log: CallLog) -> Router {
    Router::new()
        .route("/api/projects", post(created))
        .route("/api/projects/:id/members", get(ok_empty))
        .route("/api/boards", post(created))
        .route("/api/boards/:id/move", put(ok_with_body))
        .route("/api/participants", post(created))
        .route("/api/comments", post(created))
        .with_state(MockState {
            service: "project",
            log,
        })
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock service");
    let addr = listener.local_addr().expect("mock service has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock service crashed");
    });
    addr
}

/// Starts both mock services on random ports. Every call either service
/// receives lands in the returned log.
pub async fn mock_services() -> (Endpoints, CallLog) {
    let log = CallLog::default();
    let users = serve(user_service(log.clone())).await;
    let projects = serve(project_service(log.clone())).await;
    (
        Endpoints::new(format!("http://{}", users), format!("http://{}", projects)),
        log,
    )
}
