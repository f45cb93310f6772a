use std::sync::Arc;

use identity_flows::{
    DeploymentConfig, FieldSetting, IdentityClient, ProfileField, ReqwestTransport,
};

use super::MockBackend;

/// Configuration matching the mock backend: GitHub enabled, usernames collectable.
pub fn backend_config(backend: &MockBackend) -> DeploymentConfig {
    DeploymentConfig::new(backend.base_url.clone(), "accounts.example.test")
        .with_oauth_provider("github")
        .with_field(
            ProfileField::Username,
            FieldSetting {
                enabled: true,
                required: false,
            },
        )
}

/// An identity client talking to `backend` over real HTTP.
pub fn client_for(backend: &MockBackend) -> IdentityClient {
    let transport =
        ReqwestTransport::new(&backend.base_url).expect("Failed to build reqwest transport");
    IdentityClient::new(backend_config(backend), Arc::new(transport))
}
