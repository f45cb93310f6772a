use thiserror::Error;

use crate::config::ProfileField;

use super::types::ServerError;

/// Every failure a flow operation can report.
///
/// Network, envelope, validation, and protocol failures all arrive through this one
/// type so callers handle a single error channel.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiError {
    /// The backend answered with an `errors` envelope
    #[error("Server error: {}", summarize(.0))]
    Server(Vec<ServerError>),

    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success status without a decodable envelope
    #[error("Unexpected HTTP status {status}")]
    Http { status: u16 },

    #[error("Decode error: {0}")]
    Decode(String),

    /// Rejected locally before any request was made
    #[error("Validation error: {0}")]
    Validation(ValidationError),

    /// Malformed callback or link parameters, or an operation issued in the wrong state
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ApiError {
    /// Server error codes carried by this error, in the order the backend sent them.
    pub fn codes(&self) -> Vec<&str> {
        match self {
            Self::Server(errors) => errors.iter().map(|e| e.code.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.codes().contains(&code)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

fn summarize(errors: &[ServerError]) -> String {
    if errors.is_empty() {
        return "no details".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{} ({})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Client-local input problems; these never reach the network.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Verification code is required")]
    EmptyVerificationCode,

    #[error("{0} is required")]
    MissingField(ProfileField),

    #[error("{0} must not be empty")]
    EmptyCredential(&'static str),

    #[error("OAuth provider is not enabled: {0}")]
    UnsupportedProvider(String),

    #[error("A submission is already in progress")]
    SubmissionInFlight,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Invalid request url: {0}")]
    Url(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}
