use std::sync::Arc;

use tokio::sync::Mutex;
use url::Url;

use crate::api::{ApiClient, ApiRequest, ApiResult, endpoints};
use crate::config::DeploymentConfig;
use crate::coordination::{CompletableAttempt, PendingAttempt};
use crate::oauth2::errors::OAuth2Error;
use crate::oauth2::types::{CallbackAction, CallbackParams, CallbackStatus, OAuthCallbackResponse};
use crate::session::{Session, SessionCache};

/// Consumes the authorization response on the callback URL exactly once.
///
/// One handler per page load. Authorization codes are single use, so only the
/// first call exchanges. Later calls return the current status: `Loading` while
/// the first exchange is still in flight, its outcome once it finished.
#[derive(Clone)]
pub struct OAuthCallbackHandler {
    client: ApiClient,
    config: Arc<DeploymentConfig>,
    session_cache: Option<SessionCache>,
    inner: Arc<Mutex<CallbackInner>>,
}

struct CallbackInner {
    processed: bool,
    status: CallbackStatus,
    session: Option<Session>,
    redirect_uri: Option<String>,
}

impl OAuthCallbackHandler {
    pub fn new(client: ApiClient, config: Arc<DeploymentConfig>) -> Self {
        Self {
            client,
            config,
            session_cache: None,
            inner: Arc::new(Mutex::new(CallbackInner {
                processed: false,
                status: CallbackStatus::Loading,
                session: None,
                redirect_uri: None,
            })),
        }
    }

    pub fn with_session_cache(mut self, cache: SessionCache) -> Self {
        self.session_cache = Some(cache);
        self
    }

    pub async fn handle(&self, url: &Url) -> CallbackStatus {
        {
            let mut inner = self.inner.lock().await;
            if inner.processed {
                tracing::debug!("OAuth callback already processed");
                return inner.status.clone();
            }
            inner.processed = true;
        }

        let status = match CallbackParams::from_url(url).action() {
            CallbackAction::Fail(e) => {
                tracing::warn!("OAuth callback failed before exchange: {}", e);
                CallbackStatus::Error(e)
            }
            CallbackAction::Redirect => {
                tracing::warn!(
                    "OAuth callback reached without code or error; the redirect may be misconfigured"
                );
                CallbackStatus::Redirecting
            }
            CallbackAction::Exchange { code, state } => self.exchange(&code, &state).await,
        };

        self.inner.lock().await.status = status.clone();
        status
    }

    async fn exchange(&self, code: &str, state: &str) -> CallbackStatus {
        let request = ApiRequest::get(endpoints::OAUTH2_CALLBACK)
            .query("code", code)
            .query("state", state);
        let result: ApiResult<OAuthCallbackResponse> = self.client.send(request).await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("OAuth code exchange failed: {}", e);
                return CallbackStatus::Error(OAuth2Error::Exchange(e));
            }
        };

        let pending = pending_attempt(&response.session);
        {
            let mut inner = self.inner.lock().await;
            inner.session = Some(response.session);
            inner.redirect_uri = response.redirect_uri;
        }
        if let Some(cache) = &self.session_cache {
            cache.refetch().await;
        }

        match pending {
            Some(attempt) => {
                tracing::info!("OAuth attempt {} needs completion", attempt.id());
                CallbackStatus::Completion(attempt)
            }
            None => {
                tracing::info!("OAuth sign-in succeeded");
                CallbackStatus::Success
            }
        }
    }

    pub async fn status(&self) -> CallbackStatus {
        self.inner.lock().await.status.clone()
    }

    pub async fn session(&self) -> Option<Session> {
        self.inner.lock().await.session.clone()
    }

    pub async fn redirect_uri(&self) -> Option<String> {
        self.inner.lock().await.redirect_uri.clone()
    }

    /// Where to send the browser once the exchange succeeded.
    ///
    /// `None` unless a session is present, processing finished without a pending
    /// completion, and `auto_redirect` is set. Precedence: the server's
    /// `redirect_uri`, then the configured sign-in URL, then the frontend host.
    pub async fn redirect_target(&self, auto_redirect: bool) -> Option<String> {
        if !auto_redirect {
            return None;
        }
        let inner = self.inner.lock().await;
        if inner.session.is_none() || inner.status != CallbackStatus::Success {
            return None;
        }
        Some(
            inner
                .redirect_uri
                .clone()
                .or_else(|| self.config.sign_in_url.clone())
                .unwrap_or_else(|| frontend_url(&self.config.frontend_host)),
        )
    }
}

/// The attempt the OAuth session still has to finish, sign-in before sign-up.
fn pending_attempt(session: &Session) -> Option<PendingAttempt> {
    if let Some(attempt) = session.latest_signin_attempt() {
        if attempt.needs_completion() {
            return Some(PendingAttempt::Signin(attempt.clone()));
        }
    }
    session
        .latest_signup_attempt()
        .filter(|attempt| attempt.needs_completion())
        .map(|attempt| PendingAttempt::Signup(attempt.clone()))
}

fn frontend_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}
