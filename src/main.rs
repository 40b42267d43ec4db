use argh::FromArgs;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orbit_loadtest::config::{self, Endpoints, Settings};
use orbit_loadtest::thresholds::{self, Thresholds};
use orbit_loadtest::{LoadTestError, engine};

/// k6 reports breached thresholds with this status; CI pipelines key on it.
const THRESHOLDS_BREACHED: u8 = 99;

#[derive(FromArgs, Debug)]
/// Orbit load test: concurrent users creating workspaces, projects and boards, then collaborating on them.
struct Args {
    /// user/identity service base URL (env: USER_API_BASE_URL)
    #[argh(
        option,
        default = "config::env_or(\"USER_API_BASE_URL\", config::DEFAULT_USER_API)"
    )]
    user_api: String,

    /// project/board service base URL (env: PROJECT_API_BASE_URL)
    #[argh(
        option,
        default = "config::env_or(\"PROJECT_API_BASE_URL\", config::DEFAULT_PROJECT_API)"
    )]
    project_api: String,

    /// number of concurrent virtual users (env: LOADTEST_VUS)
    #[argh(
        option,
        short = 'u',
        default = "config::env_parse(\"LOADTEST_VUS\", config::DEFAULT_VUS)"
    )]
    vus: usize,

    /// test duration, e.g. 30s or 5m (env: LOADTEST_DURATION)
    #[argh(
        option,
        short = 'd',
        from_str_fn(config::parse_duration),
        default = "config::env_duration(\"LOADTEST_DURATION\", config::DEFAULT_DURATION)"
    )]
    duration: Duration,

    /// think-time between steps, e.g. 1s or 250ms (env: LOADTEST_PACING)
    #[argh(
        option,
        from_str_fn(config::parse_duration),
        default = "config::env_duration(\"LOADTEST_PACING\", config::DEFAULT_PACING)"
    )]
    pacing: Duration,

    /// threshold such as `http_req_duration:p(95)<500`; repeatable, replaces the defaults
    #[argh(option)]
    threshold: Vec<String>,
}

fn settings_from(args: Args) -> Result<Settings, LoadTestError> {
    let thresholds = if args.threshold.is_empty() {
        Thresholds::default()
    } else {
        Thresholds::parse_all(&args.threshold)?
    };

    let settings = Settings::new(Endpoints::new(args.user_api, args.project_api))
        .with_vus(args.vus)
        .with_duration(args.duration)
        .with_pacing(args.pacing)
        .with_thresholds(thresholds);
    settings.validate()?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orbit_loadtest=info,goose=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Args = argh::from_env();
    let settings = match settings_from(args) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let limits = settings.thresholds.clone();

    let summary = match engine::run(settings).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        "{} requests, {} checks passed, {} failed",
        summary.requests(),
        summary.checks_passed,
        summary.checks_failed
    );

    let mut breached = false;
    for result in thresholds::evaluate(&limits, &summary) {
        match (result.passed, result.observed) {
            (true, Some(value)) => tracing::info!("✓ {} (observed {:.3})", result.threshold, value),
            (true, None) => tracing::warn!("? {} (no samples)", result.threshold),
            (false, value) => {
                breached = true;
                tracing::error!(
                    "✗ {} (observed {:.3})",
                    result.threshold,
                    value.unwrap_or_default()
                );
            }
        }
    }

    if breached {
        ExitCode::from(THRESHOLDS_BREACHED)
    } else {
        ExitCode::SUCCESS
    }
}
