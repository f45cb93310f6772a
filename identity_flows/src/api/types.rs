use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::errors::ApiError;

/// Outcome of every network-backed operation in the crate.
pub type ApiResult<T> = Result<T, ApiError>;

/// One entry of the backend's `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ServerError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Wire envelope: exactly one of `data` or `errors` is populated.
#[derive(Debug, Deserialize)]
struct RawEnvelope<T> {
    data: Option<T>,
    errors: Option<Vec<ServerError>>,
}

/// Decodes a response body into the uniform result shape.
///
/// The envelope discriminant decides the outcome; the status code is only consulted
/// when the body is not an envelope at all.
pub(crate) fn decode_envelope<T: DeserializeOwned>(response: &ApiResponse) -> ApiResult<T> {
    let envelope: RawEnvelope<T> = match serde_json::from_str(&response.body) {
        Ok(envelope) => envelope,
        Err(e) if response.status.is_success() => {
            return Err(ApiError::Decode(format!("Failed to decode envelope: {e}")));
        }
        Err(_) => {
            return Err(ApiError::Http {
                status: response.status.as_u16(),
            });
        }
    };

    match envelope {
        RawEnvelope {
            errors: Some(errors),
            ..
        } if !errors.is_empty() => Err(ApiError::Server(errors)),
        RawEnvelope { data: Some(data), .. } => Ok(data),
        _ => Err(ApiError::Decode(
            "Envelope carries neither data nor errors".to_string(),
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
    Multipart(Vec<(String, String)>),
}

/// Transport-neutral description of one API call, relative to the backend base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    pub fn multipart(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Multipart(fields);
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Paths of the identity API, relative to the backend base URL.
pub(crate) mod endpoints {
    pub(crate) const SIGNIN: &str = "auth/signin";
    pub(crate) const SIGNUP: &str = "auth/signup";
    pub(crate) const PREPARE_VERIFICATION: &str = "auth/prepare-verification";
    pub(crate) const ATTEMPT_VERIFICATION: &str = "auth/attempt-verification";
    pub(crate) const VERIFY_MAGIC_LINK: &str = "auth/verify-magic-link";
    pub(crate) const OAUTH2_INIT: &str = "auth/oauth2/init";
    pub(crate) const OAUTH2_CALLBACK: &str = "auth/oauth2/callback";
    pub(crate) const OAUTH2_COMPLETE: &str = "auth/oauth2/complete";
    pub(crate) const SESSION: &str = "session";
    pub(crate) const SESSION_SWITCH_SIGNIN: &str = "session/switch-sign-in";
    pub(crate) const SESSION_SIGN_OUT: &str = "session/sign-out";
    pub(crate) const SESSION_SWITCH_ORGANIZATION: &str = "session/switch-organization";
    pub(crate) const SESSION_SWITCH_WORKSPACE: &str = "session/switch-workspace";
    pub(crate) const ORGANIZATION_MEMBERSHIPS: &str = "me/organization-memberships";
    pub(crate) const WORKSPACE_MEMBERSHIPS: &str = "me/workspace-memberships";
}
