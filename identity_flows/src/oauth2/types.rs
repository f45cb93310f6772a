use serde::Deserialize;
use url::Url;

use crate::coordination::PendingAttempt;
use crate::session::Session;

use super::errors::OAuth2Error;

/// Authorization response parameters found on the callback URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// What the callback URL asks the handler to do.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CallbackAction {
    Exchange { code: String, state: String },
    Fail(OAuth2Error),
    /// Neither a code nor an error: the page was reached directly.
    Redirect,
}

impl CallbackParams {
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            let value = Some(value.into_owned());
            match key.as_ref() {
                "code" => params.code = value,
                "state" => params.state = value,
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                _ => {}
            }
        }
        params
    }

    pub(crate) fn action(&self) -> CallbackAction {
        if self.error.is_some() || self.error_description.is_some() {
            return CallbackAction::Fail(OAuth2Error::Provider {
                error: self
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown_error".to_string()),
                description: self.error_description.clone(),
            });
        }
        match (&self.code, &self.state) {
            (Some(code), Some(state)) => CallbackAction::Exchange {
                code: code.clone(),
                state: state.clone(),
            },
            (Some(_), None) => CallbackAction::Fail(OAuth2Error::MalformedCallback(
                "state is missing".to_string(),
            )),
            (None, _) => CallbackAction::Redirect,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackStatus {
    Loading,
    Success,
    Error(OAuth2Error),
    /// No authorization response on the URL; usually direct navigation, possibly
    /// a misconfigured redirect.
    Redirecting,
    /// The exchanged session has an attempt that needs profile completion.
    Completion(PendingAttempt),
}

impl CallbackStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Loading)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OAuthCallbackResponse {
    pub(crate) session: Session,
    #[serde(default)]
    pub(crate) redirect_uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OAuthInitResponse {
    pub(crate) oauth_url: String,
}
