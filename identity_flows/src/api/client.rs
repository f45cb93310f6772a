use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::storage::DevTokenReconciler;

use super::errors::ApiError;
use super::transport::HttpTransport;
use super::types::{ApiRequest, ApiResult, decode_envelope};

/// Query parameter carrying the development session token.
const DEV_SESSION_QUERY_PARAM: &str = "__dev_session__";

/// Typed front door to the identity API shared by every flow.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    dev_tokens: Option<DevTokenReconciler>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            dev_tokens: None,
        }
    }

    /// Attaches the reconciled development session token to every request.
    pub fn with_dev_session(mut self, reconciler: DevTokenReconciler) -> Self {
        self.dev_tokens = Some(reconciler);
        self
    }

    pub fn dev_tokens(&self) -> Option<&DevTokenReconciler> {
        self.dev_tokens.as_ref()
    }

    /// Sends a request and decodes the `data` payload of the envelope.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        let request = self.decorate(request);
        tracing::debug!("{} {}", request.method, request.path);

        let response = self.transport.request(request).await.map_err(|e| {
            tracing::warn!("Transport failure: {}", e);
            ApiError::Transport(e.to_string())
        })?;

        let result = decode_envelope(&response);
        if let Err(e) = &result {
            tracing::debug!("Request failed with status {}: {}", response.status, e);
        }
        result
    }

    fn decorate(&self, request: ApiRequest) -> ApiRequest {
        let Some(reconciler) = &self.dev_tokens else {
            return request;
        };
        match reconciler.reconcile() {
            Ok(Some(token)) => request.query(DEV_SESSION_QUERY_PARAM, token.value),
            Ok(None) => request,
            Err(e) => {
                tracing::warn!("Skipping dev session decoration: {}", e);
                request
            }
        }
    }
}
