//! Deployment configuration shared by every flow in the crate

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::utils::normalize_base_url;

/// Profile fields a deployment may enable, require, or report as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    FirstName,
    LastName,
    Username,
    Email,
    PhoneNumber,
    Password,
}

impl ProfileField {
    pub const ALL: [ProfileField; 6] = [
        ProfileField::FirstName,
        ProfileField::LastName,
        ProfileField::Username,
        ProfileField::Email,
        ProfileField::PhoneNumber,
        ProfileField::Password,
    ];

    /// Name used on the wire and in form bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::FirstName => "first_name",
            ProfileField::LastName => "last_name",
            ProfileField::Username => "username",
            ProfileField::Email => "email",
            ProfileField::PhoneNumber => "phone_number",
            ProfileField::Password => "password",
        }
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileField {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProfileField::ALL
            .into_iter()
            .find(|field| field.as_str() == s.trim())
            .ok_or_else(|| ConfigError::Invalid(format!("Unknown profile field: {s}")))
    }
}

/// Per-field switches from the deployment's user settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldSetting {
    pub enabled: bool,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Base URL of the identity API, e.g. `https://api.example.com/v1/`.
    pub backend_api_url: Url,
    /// Host of the deployment's hosted pages, used as the last redirect fallback.
    pub frontend_host: String,
    pub sign_in_url: Option<String>,
    pub sign_up_url: Option<String>,
    /// Development deployments carry the session in a dev token instead of a
    /// first-party cookie.
    pub development_mode: bool,
    pub profile_fields: BTreeMap<ProfileField, FieldSetting>,
    pub oauth_providers: Vec<String>,
}

impl DeploymentConfig {
    pub fn new(backend_api_url: Url, frontend_host: impl Into<String>) -> Self {
        let mut profile_fields = BTreeMap::new();
        for field in [ProfileField::Email, ProfileField::Password] {
            profile_fields.insert(
                field,
                FieldSetting {
                    enabled: true,
                    required: true,
                },
            );
        }
        Self {
            backend_api_url,
            frontend_host: frontend_host.into(),
            sign_in_url: None,
            sign_up_url: None,
            development_mode: false,
            profile_fields,
            oauth_providers: Vec::new(),
        }
    }

    /// Loads the configuration from `IDENTITY_*` environment variables.
    ///
    /// `IDENTITY_BACKEND_API_URL` and `IDENTITY_FRONTEND_HOST` are mandatory.
    /// Field lists are comma separated, e.g. `IDENTITY_ENABLED_FIELDS=email,username`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = required_var("IDENTITY_BACKEND_API_URL")?;
        let backend_api_url =
            normalize_base_url(&backend).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let mut config = Self::new(backend_api_url, required_var("IDENTITY_FRONTEND_HOST")?);

        config.sign_in_url = env::var("IDENTITY_SIGN_IN_URL").ok();
        config.sign_up_url = env::var("IDENTITY_SIGN_UP_URL").ok();
        config.development_mode = env::var("IDENTITY_DEVELOPMENT_MODE")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        if let Ok(enabled) = env::var("IDENTITY_ENABLED_FIELDS") {
            let required = match env::var("IDENTITY_REQUIRED_FIELDS") {
                Ok(list) => parse_field_list(&list)?,
                Err(_) => Vec::new(),
            };
            config.profile_fields = parse_field_list(&enabled)?
                .into_iter()
                .map(|field| {
                    (
                        field,
                        FieldSetting {
                            enabled: true,
                            required: required.contains(&field),
                        },
                    )
                })
                .collect();
        }

        if let Ok(providers) = env::var("IDENTITY_OAUTH_PROVIDERS") {
            config.oauth_providers = providers
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }

        tracing::debug!(
            "Loaded deployment config: backend={}, development_mode={}",
            config.backend_api_url,
            config.development_mode
        );
        Ok(config)
    }

    pub fn with_field(mut self, field: ProfileField, setting: FieldSetting) -> Self {
        self.profile_fields.insert(field, setting);
        self
    }

    pub fn with_oauth_provider(mut self, provider: impl Into<String>) -> Self {
        self.oauth_providers.push(provider.into());
        self
    }

    pub fn field_setting(&self, field: ProfileField) -> FieldSetting {
        self.profile_fields.get(&field).copied().unwrap_or_default()
    }

    pub fn is_field_enabled(&self, field: ProfileField) -> bool {
        self.field_setting(field).enabled
    }

    pub fn is_oauth_provider_enabled(&self, provider: &str) -> bool {
        self.oauth_providers.iter().any(|p| p == provider)
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name.to_string()))
}

fn parse_field_list(list: &str) -> Result<Vec<ProfileField>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ProfileField::from_str)
        .collect()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
