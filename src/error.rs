use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadTestError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Load engine error: {0}")]
    Engine(String),

    #[error("Invalid threshold: {0}")]
    Threshold(#[from] ThresholdError),
}

impl From<goose::GooseError> for LoadTestError {
    fn from(err: goose::GooseError) -> Self {
        LoadTestError::Engine(err.to_string())
    }
}

/// Failure to obtain any HTTP response at all (connect, timeout, body read).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

/// Why a step could not build its HTTP call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("{0} missing")]
    Missing(&'static str),

    #[error("Failed to encode request body: {0}")]
    Encode(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThresholdError {
    #[error("expected `<metric>:<expression>`, got `{0}`")]
    MissingMetric(String),

    #[error("unknown metric `{0}`")]
    UnknownMetric(String),

    #[error("cannot parse expression `{0}`")]
    BadExpression(String),
}

pub type LoadTestResult<T> = Result<T, LoadTestError>;
