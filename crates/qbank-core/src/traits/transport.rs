//! HTTP transport trait.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::{Response, TransportRequest};

/// Sends one request and returns whatever the server answered.
///
/// Implementations must return every HTTP status as `Ok`; only failures to
/// obtain a response at all (connection refused, timeout) are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<Response, TransportError>;
}
