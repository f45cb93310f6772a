use thiserror::Error;

use crate::api::{ApiError, ServerError};

/// Server errors shown to the user as they are.
///
/// Every other code stays available on the raw [`ApiError`] only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    UserNotFound(String),

    #[error("{0}")]
    UserAlreadySignedIn(String),
}

impl SubmitError {
    pub fn from_server_error(error: &ServerError) -> Option<Self> {
        let message = if error.message.is_empty() {
            error.code.clone()
        } else {
            error.message.clone()
        };
        match error.code.as_str() {
            "InvalidCredentials" => Some(Self::InvalidCredentials(message)),
            "UserNotFound" => Some(Self::UserNotFound(message)),
            "UserAlreadySignedIn" => Some(Self::UserAlreadySignedIn(message)),
            _ => None,
        }
    }

    /// First whitelisted server error in the result, if any.
    pub fn from_api_error(error: &ApiError) -> Option<Self> {
        match error {
            ApiError::Server(errors) => errors.iter().find_map(Self::from_server_error),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials(_) => "InvalidCredentials",
            Self::UserNotFound(_) => "UserNotFound",
            Self::UserAlreadySignedIn(_) => "UserAlreadySignedIn",
        }
    }
}
