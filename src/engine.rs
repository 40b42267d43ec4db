//! Binding to the goose load engine.
//!
//! goose owns virtual users, scheduling, request metrics, and the run
//! report. This module registers the workflow as a single goose
//! transaction (one transaction run = one iteration) and adapts a
//! `GooseUser` to [`Transport`].

use std::fmt;
use std::sync::Arc;

use goose::config::GooseConfiguration;
use goose::metrics::{GooseMetrics, GooseRequestMetric};
use goose::prelude::*;

use crate::api::{ApiRequest, ApiResponse, HttpMethod};
use crate::config::Settings;
use crate::error::{LoadTestResult, TransportError};
use crate::scenario;
use crate::thresholds::RunSummary;
use crate::transport::Transport;

pub const SCENARIO_NAME: &str = "CollaborationWorkflow";

/// Sends requests through a goose user so latency and status land in the
/// engine's metrics under the step's request name.
pub struct GooseTransport<'a> {
    user: &'a mut GooseUser,
    last: Option<(GooseRequestMetric, String)>,
}

impl<'a> GooseTransport<'a> {
    pub fn new(user: &'a mut GooseUser) -> Self {
        Self { user, last: None }
    }
}

fn goose_method(method: HttpMethod) -> GooseMethod {
    match method {
        HttpMethod::Get => GooseMethod::Get,
        HttpMethod::Post => GooseMethod::Post,
        HttpMethod::Put => GooseMethod::Put,
    }
}

impl Transport for GooseTransport<'_> {
    async fn send(&mut self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let method = goose_method(request.method);
        let mut builder = self
            .user
            .get_request_builder(&method, &request.url)
            .map_err(|e| TransportError::Request(e.to_string()))?
            .header("Content-Type", "application/json");
        if let Some(authorization) = &request.authorization {
            builder = builder.header("Authorization", authorization.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let goose_request = GooseRequest::builder()
            .method(method)
            .path(request.url.as_str())
            .name(request.name)
            .set_request_builder(builder)
            .build();

        let goose = self
            .user
            .request(goose_request)
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        match goose.response {
            Ok(response) => {
                let status = response.status().as_u16();
                let (body, result) = read_body(status, response.text().await);
                self.last = Some((goose.request, body));
                result
            }
            Err(e) => {
                self.last = Some((goose.request, String::new()));
                Err(TransportError::Request(e.to_string()))
            }
        }
    }

    fn record_check(&mut self, check: &'static str, passed: bool) {
        let Some((mut metric, body)) = self.last.take() else {
            return;
        };
        // Both return the verdict as a TransactionResult; the iteration
        // carries on regardless, so only the metric update matters.
        if passed {
            let _ = self.user.set_success(&mut metric);
        } else {
            let _ = self.user.set_failure(check, &mut metric, None, Some(body.as_str()));
        }
    }
}

/// Splits a body read into what goes on the request metric and what the
/// scenario sees. A failed read still leaves a metric to mark as failed.
fn read_body<E: fmt::Display>(
    status: u16,
    text: Result<String, E>,
) -> (String, Result<ApiResponse, TransportError>) {
    match text {
        Ok(body) => (body.clone(), Ok(ApiResponse::new(status, body))),
        Err(e) => (String::new(), Err(TransportError::Body(e.to_string()))),
    }
}

async fn collaboration_iteration(user: &mut GooseUser, settings: Arc<Settings>) -> TransactionResult {
    // goose counts users from zero; VU numbers in ids and logs start at one.
    let vu = user.weighted_users_index + 1;
    let mut transport = GooseTransport::new(user);
    let report = scenario::run_iteration(&mut transport, &settings, vu).await;

    tracing::debug!(
        vu,
        attempted = report.attempted(),
        failed = report.failed(),
        skipped = report.skipped(),
        completed = report.completed(),
        "iteration finished"
    );
    Ok(())
}

pub fn collaboration_scenario(settings: Arc<Settings>) -> Scenario {
    let transaction = Transaction::new(Arc::new(move |user| {
        Box::pin(collaboration_iteration(user, Arc::clone(&settings)))
    }))
    .set_name("collaboration iteration");

    scenario!(SCENARIO_NAME).register_transaction(transaction)
}

/// Runs the whole load test and returns what the engine aggregated.
pub async fn run(settings: Settings) -> LoadTestResult<RunSummary> {
    settings.validate()?;

    let hatch_rate = settings.vus.to_string();
    let run_time = settings.duration.as_secs() as usize;
    let host = settings.endpoints.user_api.clone();
    let vus = settings.vus;
    let settings = Arc::new(settings);

    tracing::info!(
        "Starting {} VUs for {}s against {} / {}",
        vus,
        run_time,
        settings.endpoints.user_api,
        settings.endpoints.project_api
    );

    let metrics = GooseAttack::initialize_with_config(GooseConfiguration::default())?
        .register_scenario(collaboration_scenario(Arc::clone(&settings)))
        .set_default(GooseDefault::Host, host.as_str())?
        .set_default(GooseDefault::Users, vus)?
        .set_default(GooseDefault::HatchRate, hatch_rate.as_str())?
        .set_default(GooseDefault::RunTime, run_time)?
        .set_default(GooseDefault::NoResetMetrics, true)?
        .execute()
        .await?;

    Ok(summarize(&metrics))
}

/// Every attempted step is exactly one request with one check, so request
/// success counts double as check counts.
pub fn summarize(metrics: &GooseMetrics) -> RunSummary {
    let mut summary = RunSummary::default();
    for aggregate in metrics.requests.values() {
        summary.checks_passed += aggregate.success_count;
        summary.checks_failed += aggregate.fail_count;
        for (&ms, &count) in &aggregate.raw_data.times {
            *summary.latencies.entry(ms).or_insert(0) += count;
        }
    }
    summary
}
