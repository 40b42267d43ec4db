//! The twelve steps of the collaboration workflow.
//!
//! Each step knows its own precondition, request, success predicate, and
//! what it captures from the response. The runner in `scenario` only walks
//! them in order.

use std::fmt;

use crate::api::{self, ApiRequest, HttpMethod, IdLocation, Service};
use crate::config::Endpoints;
use crate::error::RequestError;
use crate::identity::Label;
use crate::scenario::ScenarioState;

pub const INVITE_ROLE: &str = "MEMBER";
pub const MOVE_FIELD: &str = "stage";
pub const MOVE_VALUE: &str = "in_progress";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    CreateUserA,
    ObtainTokenA,
    CreateWorkspace,
    CreateProject,
    CreateBoard,
    CreateUserB,
    ObtainTokenB,
    InviteUserB,
    ListProjectMembers,
    AddParticipantB,
    CreateComment,
    MoveBoard,
}

/// Whether a step may run given everything produced so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Ready,
    /// Optional inputs missing: record the step as skipped and carry on.
    Skip(&'static str),
    /// A hard dependency is missing: end the iteration here.
    Halt(&'static str),
}

/// What a successful response feeds forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    UserId(Label, IdLocation),
    Token(Label),
    WorkspaceId(IdLocation),
    ProjectId(IdLocation),
    BoardId(IdLocation),
    CommentId(IdLocation),
    Nothing,
}

impl Step {
    pub const ALL: [Step; 12] = [
        Step::CreateUserA,
        Step::ObtainTokenA,
        Step::CreateWorkspace,
        Step::CreateProject,
        Step::CreateBoard,
        Step::CreateUserB,
        Step::ObtainTokenB,
        Step::InviteUserB,
        Step::ListProjectMembers,
        Step::AddParticipantB,
        Step::CreateComment,
        Step::MoveBoard,
    ];

    pub fn number(&self) -> usize {
        match self {
            Step::CreateUserA => 1,
            Step::ObtainTokenA => 2,
            Step::CreateWorkspace => 3,
            Step::CreateProject => 4,
            Step::CreateBoard => 5,
            Step::CreateUserB => 6,
            Step::ObtainTokenB => 7,
            Step::InviteUserB => 8,
            Step::ListProjectMembers => 9,
            Step::AddParticipantB => 10,
            Step::CreateComment => 11,
            Step::MoveBoard => 12,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Step::CreateUserA => "User A Created",
            Step::ObtainTokenA => "Token A",
            Step::CreateWorkspace => "Create Workspace",
            Step::CreateProject => "Create Project",
            Step::CreateBoard => "Create Board",
            Step::CreateUserB => "User B Created",
            Step::ObtainTokenB => "Token B",
            Step::InviteUserB => "Invite User B",
            Step::ListProjectMembers => "Get Project Members",
            Step::AddParticipantB => "Add Participant B",
            Step::CreateComment => "Comment Created",
            Step::MoveBoard => "Board Moved",
        }
    }

    /// Name of the pass/fail check reported to the load engine.
    pub fn check_name(&self) -> &'static str {
        match self {
            Step::CreateUserA => "1. User A Created",
            Step::ObtainTokenA => "2. Token A Obtained",
            Step::CreateWorkspace => "3. Workspace Created",
            Step::CreateProject => "4. Project Created",
            Step::CreateBoard => "5. Board Created",
            Step::CreateUserB => "6. User B Created",
            Step::ObtainTokenB => "7. Token B Obtained",
            Step::InviteUserB => "8. User B Invited",
            Step::ListProjectMembers => "9. Project Members Retrieved (GET)",
            Step::AddParticipantB => "10. Participant B Added",
            Step::CreateComment => "11. Comment Created",
            Step::MoveBoard => "12. Board Moved",
        }
    }

    /// Request name the engine aggregates latency under.
    pub fn request_name(&self) -> &'static str {
        match self {
            Step::CreateUserA => "createUserA",
            Step::ObtainTokenA => "getAccessTokenA",
            Step::CreateWorkspace => "createWorkspace",
            Step::CreateProject => "createProject",
            Step::CreateBoard => "createBoard",
            Step::CreateUserB => "createUserB",
            Step::ObtainTokenB => "getAccessTokenB",
            Step::InviteUserB => "inviteUserB",
            Step::ListProjectMembers => "getProjectMembers",
            Step::AddParticipantB => "addParticipantB",
            Step::CreateComment => "createComment",
            Step::MoveBoard => "moveBoard",
        }
    }

    /// Status part of the success predicate. Token steps additionally
    /// require an acceptable body, see [`api::accept_token`].
    pub fn accepts(&self, status: u16) -> bool {
        match self {
            Step::CreateUserA
            | Step::CreateUserB
            | Step::CreateWorkspace
            | Step::InviteUserB
            | Step::AddParticipantB => status == 200 || status == 201,
            Step::ObtainTokenA
            | Step::ObtainTokenB
            | Step::ListProjectMembers
            | Step::MoveBoard => status == 200,
            Step::CreateProject | Step::CreateBoard | Step::CreateComment => status == 201,
        }
    }

    pub fn capture(&self) -> Capture {
        match self {
            Step::CreateUserA => Capture::UserId(Label::A, IdLocation::TopLevel("userId")),
            Step::CreateUserB => Capture::UserId(Label::B, IdLocation::TopLevel("userId")),
            Step::ObtainTokenA => Capture::Token(Label::A),
            Step::ObtainTokenB => Capture::Token(Label::B),
            Step::CreateWorkspace => Capture::WorkspaceId(IdLocation::TopLevel("workspaceId")),
            Step::CreateProject => Capture::ProjectId(IdLocation::Nested("projectId")),
            Step::CreateBoard => Capture::BoardId(IdLocation::Nested("boardId")),
            Step::CreateComment => Capture::CommentId(IdLocation::Nested("commentId")),
            Step::InviteUserB
            | Step::ListProjectMembers
            | Step::AddParticipantB
            | Step::MoveBoard => Capture::Nothing,
        }
    }

    pub fn gate(&self, state: &ScenarioState) -> Gate {
        let a = &state.user_a;
        let b = &state.user_b;
        match self {
            Step::CreateUserA | Step::CreateUserB => Gate::Ready,
            Step::ObtainTokenA => require(a.user_id.is_some(), "user A id"),
            Step::CreateWorkspace => require(a.token.is_some(), "token A"),
            Step::CreateProject | Step::InviteUserB => {
                require(state.workspace_id.is_some(), "workspace id")
            }
            Step::CreateBoard | Step::ListProjectMembers => {
                require(state.project_id.is_some(), "project id")
            }
            Step::AddParticipantB => require(state.board_id.is_some(), "board id"),
            Step::ObtainTokenB => {
                if b.user_id.is_some() {
                    Gate::Ready
                } else {
                    Gate::Skip("user B id")
                }
            }
            Step::CreateComment => {
                if b.token.is_some() && state.board_id.is_some() {
                    Gate::Ready
                } else {
                    Gate::Skip("token B or board id")
                }
            }
            Step::MoveBoard => require(
                state.board_id.is_some() && state.project_id.is_some(),
                "board id or project id",
            ),
        }
    }

    /// Builds the HTTP call for this step. Fails with `Missing` when an input
    /// the gate guards is absent.
    pub fn request(
        &self,
        state: &ScenarioState,
        endpoints: &Endpoints,
    ) -> Result<ApiRequest, RequestError> {
        let vu = state.vu;
        let suffix = &state.suffix;
        let token_a = state.user_a.token.as_ref();
        let new = |service, method, path: String| {
            ApiRequest::new(self.request_name(), endpoints, service, method, path)
        };

        let request = match self {
            Step::CreateUserA => new(Service::User, HttpMethod::Post, "/api/users".into())
                .json(&api::CreateUser::for_identity(&state.user_a))?,
            Step::CreateUserB => new(Service::User, HttpMethod::Post, "/api/users".into())
                .json(&api::CreateUser::for_identity(&state.user_b))?,
            Step::ObtainTokenA => {
                let user_id = required(state.user_a.user_id.as_deref(), "user A id")?;
                new(Service::User, HttpMethod::Get, format!("/api/users/test/{}", user_id))
            }
            Step::ObtainTokenB => {
                let user_id = required(state.user_b.user_id.as_deref(), "user B id")?;
                new(Service::User, HttpMethod::Get, format!("/api/users/test/{}", user_id))
            }
            Step::CreateWorkspace => new(
                Service::User,
                HttpMethod::Post,
                "/api/workspaces/create".into(),
            )
            .json(&api::CreateWorkspace {
                workspace_name: format!("WS {} - {}", vu, suffix),
                workspace_description: "Load Test WS".to_string(),
                is_public: true,
            })?
            .bearer(token_a),
            Step::CreateProject => {
                let workspace_id = required(state.workspace_id.as_deref(), "workspace id")?;
                new(Service::Project, HttpMethod::Post, "/api/projects".into())
                    .json(&api::CreateProject {
                        workspace_id,
                        name: format!("Project {} - {}", vu, suffix),
                        description: "Test Project".to_string(),
                    })?
                    .bearer(token_a)
            }
            Step::CreateBoard => {
                let project_id = required(state.project_id.as_deref(), "project id")?;
                new(Service::Project, HttpMethod::Post, "/api/boards".into())
                    .json(&api::CreateBoard {
                        project_id,
                        title: format!("To Do Board - VU {}", vu),
                        content: "Initial task in the project.".to_string(),
                    })?
                    .bearer(token_a)
            }
            Step::InviteUserB => {
                let workspace_id = required(state.workspace_id.as_deref(), "workspace id")?;
                new(
                    Service::User,
                    HttpMethod::Post,
                    format!("/api/workspaces/{}/members/invite", workspace_id),
                )
                .json(&api::InviteMember {
                    query: &state.user_b.email,
                    role: INVITE_ROLE,
                })?
                .bearer(token_a)
            }
            Step::ListProjectMembers => {
                let project_id = required(state.project_id.as_deref(), "project id")?;
                new(
                    Service::Project,
                    HttpMethod::Get,
                    format!("/api/projects/{}/members", project_id),
                )
                .bearer(token_a)
            }
            Step::AddParticipantB => {
                let board_id = required(state.board_id.as_deref(), "board id")?;
                new(Service::Project, HttpMethod::Post, "/api/participants".into())
                    .json(&api::AddParticipants {
                        board_id,
                        user_ids: state.user_b.user_id.as_deref().into_iter().collect(),
                    })?
                    .bearer(token_a)
            }
            Step::CreateComment => {
                let board_id = required(state.board_id.as_deref(), "board id")?;
                let token_b = state
                    .user_b
                    .token
                    .as_ref()
                    .ok_or(RequestError::Missing("token B"))?;
                new(Service::Project, HttpMethod::Post, "/api/comments".into())
                    .json(&api::CreateComment {
                        board_id,
                        content: format!("Hello, from User B {}", vu),
                    })?
                    .bearer(Some(token_b))
            }
            Step::MoveBoard => {
                let board_id = required(state.board_id.as_deref(), "board id")?;
                let project_id = required(state.project_id.as_deref(), "project id")?;
                new(
                    Service::Project,
                    HttpMethod::Put,
                    format!("/api/boards/{}/move", board_id),
                )
                .json(&api::MoveBoard {
                    project_id,
                    group_by_field_name: MOVE_FIELD,
                    new_field_value: MOVE_VALUE,
                })?
                .bearer(token_a)
            }
        };
        Ok(request)
    }
}

fn required<'a>(value: Option<&'a str>, missing: &'static str) -> Result<&'a str, RequestError> {
    value.ok_or(RequestError::Missing(missing))
}

fn require(present: bool, missing: &'static str) -> Gate {
    if present {
        Gate::Ready
    } else {
        Gate::Halt(missing)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {} ({})", self.number(), self.label())
    }
}
