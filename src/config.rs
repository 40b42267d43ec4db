use std::time::Duration;

use crate::error::{LoadTestError, LoadTestResult};
use crate::thresholds::Thresholds;

pub const DEFAULT_USER_API: &str = "http://localhost:8080";
pub const DEFAULT_PROJECT_API: &str = "http://localhost:8081";
pub const DEFAULT_VUS: usize = 3000;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(30);
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

/// Base URLs of the two services under test.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub user_api: String,
    pub project_api: String,
}

impl Endpoints {
    pub fn new(user_api: impl Into<String>, project_api: impl Into<String>) -> Self {
        Self {
            user_api: normalize_base(user_api.into()),
            project_api: normalize_base(project_api.into()),
        }
    }
}

fn normalize_base(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoints: Endpoints,
    pub vus: usize,
    pub duration: Duration,
    /// Think-time inserted after every step that is reached.
    pub pacing: Duration,
    pub thresholds: Thresholds,
}

impl Settings {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            endpoints,
            vus: DEFAULT_VUS,
            duration: DEFAULT_DURATION,
            pacing: DEFAULT_PACING,
            thresholds: Thresholds::default(),
        }
    }

    pub fn with_vus(mut self, vus: usize) -> Self {
        self.vus = vus;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn validate(&self) -> LoadTestResult<()> {
        for (name, url) in [
            ("user API", &self.endpoints.user_api),
            ("project API", &self.endpoints.project_api),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(LoadTestError::Config(format!(
                    "{} base URL must start with http:// or https://, got `{}`",
                    name, url
                )));
            }
        }
        if self.vus == 0 {
            return Err(LoadTestError::Config("vus must be at least 1".to_string()));
        }
        if self.duration.as_secs() == 0 {
            return Err(LoadTestError::Config(
                "duration must be at least 1s".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reads `key` from the environment, falling back to `default`.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Reads and parses `key`, falling back to `default` when unset or unparseable.
pub fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring unparseable {}={:?}", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_duration(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(raw) => parse_duration(&raw).unwrap_or_else(|e| {
            tracing::warn!("Ignoring {}: {}", key, e);
            default
        }),
        Err(_) => default,
    }
}

/// Parses `250ms`, `30s`, `2m`, `1h`, or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration `{}`", raw))?;

    match unit {
        "" | "s" => Ok(Duration::from_secs(value)),
        "ms" => Ok(Duration::from_millis(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        other => Err(format!("unknown duration unit `{}` in `{}`", other, raw)),
    }
}
