pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod scenario;
pub mod steps;
pub mod thresholds;
pub mod transport;

pub use config::{Endpoints, Settings};
pub use error::{LoadTestError, LoadTestResult, RequestError, ThresholdError, TransportError};
pub use scenario::{IterationReport, ScenarioState, StepOutcome, run_iteration, run_with_state};
pub use steps::{Gate, Step};
pub use thresholds::{RunSummary, Thresholds};
pub use transport::Transport;
