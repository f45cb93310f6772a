use url::Url;

use crate::api::{ApiClient, ApiError, ApiRequest, ApiResult, ValidationError, endpoints};
use crate::config::DeploymentConfig;
use crate::oauth2::types::OAuthInitResponse;

/// Asks the backend for the provider URL the browser should be sent to.
///
/// Providers the deployment has not enabled are rejected without a request.
pub async fn init_oauth(
    client: &ApiClient,
    config: &DeploymentConfig,
    provider: &str,
    redirect_uri: &str,
) -> ApiResult<Url> {
    if !config.is_oauth_provider_enabled(provider) {
        return Err(ValidationError::UnsupportedProvider(provider.to_string()).into());
    }

    let request = ApiRequest::post(endpoints::OAUTH2_INIT)
        .query("provider", provider)
        .query("redirect_uri", redirect_uri);
    let response: OAuthInitResponse = client.send(request).await?;

    Url::parse(&response.oauth_url)
        .map_err(|e| ApiError::Decode(format!("Invalid oauth_url from backend: {e}")))
}
