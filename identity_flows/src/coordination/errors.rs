//! Error types for the coordination layer

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::storage::StorageError;

/// Errors raised while wiring the flows together
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinationError {
    /// Deployment configuration could not be loaded
    #[error("Config error: {0}")]
    Config(ConfigError),

    /// Development session token storage failed
    #[error("Storage error: {0}")]
    Storage(StorageError),

    /// A request made during coordination failed
    #[error("Api error: {0}")]
    Api(ApiError),
}

impl CoordinationError {
    /// Log the error and return self
    pub fn log(self) -> Self {
        match &self {
            Self::Config(err) => tracing::error!("Config error: {}", err),
            Self::Storage(err) => tracing::error!("Storage error: {}", err),
            Self::Api(err) => tracing::error!("Api error: {}", err),
        }
        self
    }
}

// From implementations log as they convert

impl From<ConfigError> for CoordinationError {
    fn from(err: ConfigError) -> Self {
        let error = Self::Config(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<StorageError> for CoordinationError {
    fn from(err: StorageError) -> Self {
        let error = Self::Storage(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<ApiError> for CoordinationError {
    fn from(err: ApiError) -> Self {
        let error = Self::Api(err);
        tracing::error!("{}", error);
        error
    }
}
