use std::future::Future;

use crate::api::{ApiRequest, ApiResponse};
use crate::error::TransportError;

/// The scenario's only view of the outside world: something that can issue
/// one HTTP call and something that aggregates named checks.
///
/// The load engine provides the production implementation
/// ([`crate::engine::GooseTransport`]); tests script one in memory.
pub trait Transport: Send {
    fn send(
        &mut self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send;

    /// Records the pass/fail check for the request most recently sent.
    fn record_check(&mut self, check: &'static str, passed: bool);
}
