use serde_json::{Value, json};

use crate::api::{ApiClient, ApiRequest, ApiResult, endpoints};
use crate::session::Session;

use super::types::{IdentifierType, VerificationStrategy};

/// Asks the backend to deliver a code or magic link for the attempt.
pub(crate) async fn prepare_verification(
    client: &ApiClient,
    attempt_id: &str,
    strategy: VerificationStrategy,
) -> ApiResult<()> {
    tracing::debug!("Preparing {} verification for attempt {}", strategy, attempt_id);
    let request = ApiRequest::post(endpoints::PREPARE_VERIFICATION)
        .query("attempt_identifier", attempt_id)
        .query("strategy", strategy.as_str())
        .query("identifier_type", strategy.identifier_type().as_str());
    let _: Value = client.send(request).await?;
    Ok(())
}

/// Submits an entered code; the backend answers with the updated session.
pub(crate) async fn attempt_verification(
    client: &ApiClient,
    attempt_id: &str,
    identifier_type: IdentifierType,
    code: &str,
) -> ApiResult<Session> {
    tracing::debug!(
        "Attempting {} verification for attempt {}",
        identifier_type.as_str(),
        attempt_id
    );
    let request = ApiRequest::post(endpoints::ATTEMPT_VERIFICATION)
        .query("attempt_identifier", attempt_id)
        .query("identifier_type", identifier_type.as_str())
        .json(json!({ "verification_code": code }));
    client.send(request).await
}
