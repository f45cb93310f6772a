use async_trait::async_trait;

use super::errors::TransportError;
use super::types::{ApiRequest, ApiResponse};

/// The HTTP capability the flows are built on.
///
/// Implementations only move bytes: they must not interpret the envelope, and any
/// response that arrived (whatever its status) is returned as `Ok`.
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}
