use thiserror::Error;

use crate::api::ApiError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OAuth2Error {
    /// The provider redirected back with `error`
    #[error("Provider error: {error}{}", describe(.description))]
    Provider {
        error: String,
        description: Option<String>,
    },

    /// The callback carried a code without the parameters that go with it
    #[error("Malformed callback: {0}")]
    MalformedCallback(String),

    #[error("Code exchange failed: {0}")]
    Exchange(ApiError),
}

fn describe(description: &Option<String>) -> String {
    match description {
        Some(text) => format!(" ({text})"),
        None => String::new(),
    }
}
