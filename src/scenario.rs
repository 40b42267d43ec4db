//! One iteration of the collaboration workflow.
//!
//! Steps run strictly in order. A missing hard dependency ends the
//! iteration quietly; a missing optional input marks the step skipped.
//! Nothing here returns an error: every failure is logged, recorded as a
//! check, and otherwise only shows up as an id that never got set.

use std::time::Duration;

use tracing::Instrument;

use crate::api::{self, ApiResponse};
use crate::config::{Endpoints, Settings};
use crate::error::RequestError;
use crate::identity::{self, Identity, Label};
use crate::steps::{Capture, Gate, Step};
use crate::transport::Transport;

/// Everything one iteration has produced so far.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioState {
    pub vu: usize,
    pub suffix: String,
    pub user_a: Identity,
    pub user_b: Identity,
    pub workspace_id: Option<String>,
    pub project_id: Option<String>,
    pub board_id: Option<String>,
    pub comment_id: Option<String>,
}

impl ScenarioState {
    pub fn new(vu: usize, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        Self {
            vu,
            user_a: Identity::generate(Label::A, vu, &suffix),
            user_b: Identity::generate(Label::B, vu, &suffix),
            suffix,
            workspace_id: None,
            project_id: None,
            board_id: None,
            comment_id: None,
        }
    }

    fn identity_mut(&mut self, label: Label) -> &mut Identity {
        match label {
            Label::A => &mut self.user_a,
            Label::B => &mut self.user_b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub step: Step,
    pub outcome: StepOutcome,
    /// `None` when no response came back (skipped, or transport error).
    pub status: Option<u16>,
}

/// Where and why an iteration stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Halt {
    pub step: Step,
    pub missing: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub state: ScenarioState,
    pub steps: Vec<StepRecord>,
    pub halted: Option<Halt>,
}

impl IterationReport {
    pub fn outcome(&self, step: Step) -> Option<StepOutcome> {
        self.steps
            .iter()
            .find(|r| r.step == step)
            .map(|r| r.outcome)
    }

    pub fn attempted(&self) -> usize {
        self.count(|o| o != StepOutcome::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| o == StepOutcome::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| o == StepOutcome::Skipped)
    }

    pub fn completed(&self) -> bool {
        self.halted.is_none()
    }

    fn count(&self, pred: impl Fn(StepOutcome) -> bool) -> usize {
        self.steps.iter().filter(|r| pred(r.outcome)).count()
    }
}

/// Runs one iteration for virtual user `vu` with a fresh identity suffix.
pub async fn run_iteration<T: Transport>(
    transport: &mut T,
    settings: &Settings,
    vu: usize,
) -> IterationReport {
    let state = ScenarioState::new(vu, identity::iteration_suffix());
    run_with_state(transport, &settings.endpoints, settings.pacing, state).await
}

pub async fn run_with_state<T: Transport>(
    transport: &mut T,
    endpoints: &Endpoints,
    pacing: Duration,
    state: ScenarioState,
) -> IterationReport {
    let span = tracing::info_span!("iteration", vu = state.vu, suffix = %state.suffix);
    drive(transport, endpoints, pacing, state)
        .instrument(span)
        .await
}

async fn drive<T: Transport>(
    transport: &mut T,
    endpoints: &Endpoints,
    pacing: Duration,
    mut state: ScenarioState,
) -> IterationReport {
    let mut steps = Vec::with_capacity(Step::ALL.len());
    let mut halted = None;
    let vu = state.vu;

    for step in Step::ALL {
        match step.gate(&state) {
            Gate::Ready => {}
            Gate::Skip(missing) => {
                tracing::warn!("VU {}: [SKIP] {} skipped ({} missing).", vu, step, missing);
                steps.push(StepRecord {
                    step,
                    outcome: StepOutcome::Skipped,
                    status: None,
                });
                think(pacing).await;
                continue;
            }
            Gate::Halt(missing) => {
                tracing::debug!("VU {}: stopping before {} ({} missing)", vu, step, missing);
                halted = Some(Halt { step, missing });
                break;
            }
        }

        let request = match step.request(&state, endpoints) {
            Ok(request) => request,
            Err(RequestError::Missing(missing)) => {
                halted = Some(Halt { step, missing });
                break;
            }
            Err(e) => {
                tracing::error!("VU {}: [ERROR] {} not sent. {}", vu, step, e);
                transport.record_check(step.check_name(), false);
                steps.push(StepRecord {
                    step,
                    outcome: StepOutcome::Failed,
                    status: None,
                });
                think(pacing).await;
                continue;
            }
        };

        tracing::debug!("VU {}: -> {} {}", vu, request.method, request.url);
        let record = match transport.send(request).await {
            Ok(response) => {
                let passed = evaluate(step, &mut state, &response);
                transport.record_check(step.check_name(), passed);
                StepRecord {
                    step,
                    outcome: if passed {
                        StepOutcome::Passed
                    } else {
                        StepOutcome::Failed
                    },
                    status: Some(response.status),
                }
            }
            Err(e) => {
                tracing::error!("VU {}: [ERROR] {} failed. {}", vu, step, e);
                transport.record_check(step.check_name(), false);
                StepRecord {
                    step,
                    outcome: StepOutcome::Failed,
                    status: None,
                }
            }
        };
        steps.push(record);
        think(pacing).await;
    }

    IterationReport {
        state,
        steps,
        halted,
    }
}

/// Applies the step's success predicate and captures whatever it produces.
fn evaluate(step: Step, state: &mut ScenarioState, response: &ApiResponse) -> bool {
    let vu = state.vu;
    if !step.accepts(response.status) {
        tracing::error!(
            "VU {}: [ERROR] {} failed. Status: {}. Response: {}",
            vu,
            step,
            response.status,
            response.body
        );
        return false;
    }

    let (location, slot) = match step.capture() {
        Capture::Nothing => return true,
        Capture::Token(label) => {
            return match api::accept_token(&response.body) {
                Some(token) => {
                    state.identity_mut(label).token = Some(token);
                    true
                }
                None => {
                    tracing::error!(
                        "VU {}: [ERROR] {}: Response body was too short. Expected JWT token. Raw Response: {}",
                        vu,
                        step,
                        response.body
                    );
                    false
                }
            };
        }
        Capture::UserId(label, loc) => (loc, &mut state.identity_mut(label).user_id),
        Capture::WorkspaceId(loc) => (loc, &mut state.workspace_id),
        Capture::ProjectId(loc) => (loc, &mut state.project_id),
        Capture::BoardId(loc) => (loc, &mut state.board_id),
        Capture::CommentId(loc) => (loc, &mut state.comment_id),
    };

    match location.extract(&response.body) {
        Ok(id) => *slot = Some(id),
        Err(e) => {
            tracing::error!("VU {}: [ERROR] {}: {}. Response: {}", vu, step, e, response.body);
        }
    }
    // The check is about the status; a missing id only starves later steps.
    true
}

async fn think(pacing: Duration) {
    if !pacing.is_zero() {
        tokio::time::sleep(pacing).await;
    }
}
