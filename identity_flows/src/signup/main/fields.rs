use crate::api::{ApiClient, ApiRequest, ApiResult, ValidationError, endpoints};
use crate::config::{DeploymentConfig, ProfileField};
use crate::session::Session;
use crate::signup::types::ProfileData;

/// Checks a fresh sign-up against every field the deployment enables and requires.
pub fn validate_required_fields(
    config: &DeploymentConfig,
    data: &ProfileData,
) -> Result<(), ValidationError> {
    for field in ProfileField::ALL {
        let setting = config.field_setting(field);
        if setting.enabled && setting.required && !data.is_filled(field) {
            return Err(ValidationError::MissingField(field));
        }
    }
    Ok(())
}

/// Checks a continuation against the fields the backend reported missing.
///
/// Only fields that are missing and enabled block; a missing field the deployment
/// disabled is never rendered and never required.
pub fn validate_missing_fields(
    missing: &[ProfileField],
    config: &DeploymentConfig,
    data: &ProfileData,
) -> Result<(), ValidationError> {
    match collectable_fields(missing, config)
        .into_iter()
        .find(|field| !data.is_filled(*field))
    {
        Some(field) => Err(ValidationError::MissingField(field)),
        None => Ok(()),
    }
}

/// Missing fields the user can actually be asked for.
pub(crate) fn collectable_fields(
    missing: &[ProfileField],
    config: &DeploymentConfig,
) -> Vec<ProfileField> {
    missing
        .iter()
        .copied()
        .filter(|field| config.is_field_enabled(*field))
        .collect()
}

/// Posts the collected fields for an attempt that reported missing data.
pub(crate) async fn submit_missing_fields(
    client: &ApiClient,
    attempt_id: &str,
    data: &ProfileData,
) -> ApiResult<Session> {
    tracing::debug!("Submitting missing fields for attempt {}", attempt_id);
    let request = ApiRequest::post(endpoints::OAUTH2_COMPLETE)
        .query("attempt_id", attempt_id)
        .multipart(data.to_form());
    client.send(request).await
}
