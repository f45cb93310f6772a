use url::Url;

use crate::api::{ApiError, ApiRequest, ApiResult, endpoints};

/// Parameters carried by a magic-link landing URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct MagicLinkParams {
    token: String,
    attempt: String,
    redirect_uri: Option<String>,
}

impl MagicLinkParams {
    /// `token` and `attempt` are mandatory; a link without them is rejected before
    /// any request is made.
    pub(super) fn from_url(url: &Url) -> ApiResult<Self> {
        let mut token = None;
        let mut attempt = None;
        let mut redirect_uri = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "token" if !value.is_empty() => token = Some(value.into_owned()),
                "attempt" if !value.is_empty() => attempt = Some(value.into_owned()),
                "redirect_uri" if !value.is_empty() => redirect_uri = Some(value.into_owned()),
                _ => {}
            }
        }

        match (token, attempt) {
            (Some(token), Some(attempt)) => Ok(Self {
                token,
                attempt,
                redirect_uri,
            }),
            (None, _) => Err(ApiError::Protocol(
                "Magic link is missing its token".to_string(),
            )),
            (_, None) => Err(ApiError::Protocol(
                "Magic link is missing its attempt".to_string(),
            )),
        }
    }

    pub(super) fn attempt(&self) -> &str {
        &self.attempt
    }

    pub(super) fn request(&self) -> ApiRequest {
        let request = ApiRequest::get(endpoints::VERIFY_MAGIC_LINK)
            .query("token", self.token.as_str())
            .query("attempt", self.attempt.as_str());
        match &self.redirect_uri {
            Some(uri) => request.query("redirect_uri", uri.as_str()),
            None => request,
        }
    }
}
