//! Wire layer for the user and project services.
//!
//! The user service answers with ids at the top level of the body
//! (`{"userId": ...}`); the project service wraps created resources in a
//! `data` object (`{"data": {"projectId": ...}}`). Both shapes are kept
//! apart here so a step cannot read an id from the wrong place.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::config::Endpoints;
use crate::error::RequestError;
use crate::identity::{BearerToken, Identity, PROVIDER};

/// A token must be longer than this, after trimming, to be accepted as a JWT.
pub const MIN_TOKEN_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    User,
    Project,
}

impl Service {
    pub fn base_url<'a>(&self, endpoints: &'a Endpoints) -> &'a str {
        match self {
            Service::User => &endpoints.user_api,
            Service::Project => &endpoints.project_api,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Engine-facing request name, e.g. `createUserA`.
    pub name: &'static str,
    pub method: HttpMethod,
    pub path: String,
    pub url: String,
    /// Serialized JSON, sent as is so field order survives.
    pub body: Option<String>,
    /// Full `Authorization` header value.
    pub authorization: Option<String>,
}

impl ApiRequest {
    pub fn new(
        name: &'static str,
        endpoints: &Endpoints,
        service: Service,
        method: HttpMethod,
        path: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let url = format!("{}{}", service.base_url(endpoints), path);
        Self {
            name,
            method,
            path,
            url,
            body: None,
            authorization: None,
        }
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, RequestError> {
        let encoded =
            serde_json::to_string(body).map_err(|e| RequestError::Encode(e.to_string()))?;
        self.body = Some(encoded);
        Ok(self)
    }

    pub fn bearer(mut self, token: Option<&BearerToken>) -> Self {
        self.authorization = token.map(BearerToken::header_value);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

// Request bodies.

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser<'a> {
    pub email: &'a str,
    pub google_id: &'a str,
    pub provider: &'a str,
}

impl<'a> CreateUser<'a> {
    pub fn for_identity(identity: &'a Identity) -> Self {
        Self {
            email: &identity.email,
            google_id: &identity.provider_id,
            provider: PROVIDER,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkspace {
    pub workspace_name: String,
    pub workspace_description: String,
    pub is_public: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject<'a> {
    pub workspace_id: &'a str,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoard<'a> {
    pub project_id: &'a str,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct InviteMember<'a> {
    pub query: &'a str,
    pub role: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddParticipants<'a> {
    pub board_id: &'a str,
    pub user_ids: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComment<'a> {
    pub board_id: &'a str,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveBoard<'a> {
    pub project_id: &'a str,
    pub group_by_field_name: &'a str,
    pub new_field_value: &'a str,
}

// Response extraction.

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractError {
    /// Body is not JSON at all.
    Parse(String),
    /// Body parsed but the field is absent, null, or empty.
    MissingField(&'static str),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::Parse(e) => write!(f, "Failed to parse JSON ({})", e),
            ExtractError::MissingField(field) => write!(f, "Failed to extract '{}'", field),
        }
    }
}

/// Where a created id lives in a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdLocation {
    TopLevel(&'static str),
    Nested(&'static str),
}

impl IdLocation {
    pub fn field(&self) -> &'static str {
        match self {
            IdLocation::TopLevel(field) | IdLocation::Nested(field) => field,
        }
    }

    pub fn extract(&self, body: &str) -> Result<String, ExtractError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| ExtractError::Parse(e.to_string()))?;
        let found = match self {
            IdLocation::TopLevel(field) => value.get(field),
            IdLocation::Nested(field) => value.get("data").and_then(|data| data.get(field)),
        };
        id_string(found).ok_or(ExtractError::MissingField(self.field()))
    }
}

/// Services may hand back numeric ids; both forms are threaded as strings.
fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The test-token endpoint returns the raw JWT as the body. Surrounding
/// whitespace is not part of the token and does not count towards its length.
pub fn accept_token(body: &str) -> Option<BearerToken> {
    let token = body.trim();
    if token.chars().count() > MIN_TOKEN_LEN {
        Some(BearerToken::new(token))
    } else {
        None
    }
}
