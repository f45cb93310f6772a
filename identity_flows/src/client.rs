use std::sync::Arc;

use tokio::sync::OnceCell;
use url::Url;

use crate::api::{ApiClient, ApiError, ApiResult, HttpTransport, ReqwestTransport};
use crate::config::DeploymentConfig;
use crate::coordination::{CoordinationError, PendingAttempt, ProfileCompletion};
use crate::oauth2::{OAuthCallbackHandler, init_oauth};
use crate::session::{
    MembershipCache, RefreshHandle, SessionCache, SessionCacheOptions, SessionSnapshot,
};
use crate::signin::SigninFlow;
use crate::signup::SignupFlow;
use crate::storage::DevTokenReconciler;

/// Entry point wiring one deployment's flows to a shared session cache.
///
/// Every flow created here refreshes the same [`SessionCache`] on completion, so
/// all observers converge on one session.
pub struct IdentityClient {
    config: Arc<DeploymentConfig>,
    api: ApiClient,
    session: SessionCache,
    memberships: MembershipCache,
    bootstrap: OnceCell<()>,
}

impl IdentityClient {
    pub fn new(config: DeploymentConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self::build(config, transport, None, SessionCacheOptions::default())
    }

    /// Development deployments carry the session in a reconciled dev token.
    pub fn with_dev_session(
        config: DeploymentConfig,
        transport: Arc<dyn HttpTransport>,
        reconciler: DevTokenReconciler,
    ) -> Self {
        Self::build(
            config,
            transport,
            Some(reconciler),
            SessionCacheOptions::default(),
        )
    }

    pub fn with_options(
        config: DeploymentConfig,
        transport: Arc<dyn HttpTransport>,
        reconciler: Option<DevTokenReconciler>,
        options: SessionCacheOptions,
    ) -> Self {
        Self::build(config, transport, reconciler, options)
    }

    /// Loads the deployment from the environment and talks to it over `reqwest`.
    pub fn from_env(reconciler: Option<DevTokenReconciler>) -> Result<Self, CoordinationError> {
        let config = DeploymentConfig::from_env()?;
        let transport = ReqwestTransport::new(&config.backend_api_url)
            .map_err(|e| CoordinationError::Api(ApiError::Transport(e.to_string())).log())?;
        Ok(Self::build(
            config,
            Arc::new(transport),
            reconciler,
            SessionCacheOptions::default(),
        ))
    }

    fn build(
        config: DeploymentConfig,
        transport: Arc<dyn HttpTransport>,
        reconciler: Option<DevTokenReconciler>,
        options: SessionCacheOptions,
    ) -> Self {
        let mut api = ApiClient::new(transport);
        match reconciler {
            Some(reconciler) if config.development_mode => {
                api = api.with_dev_session(reconciler);
            }
            Some(_) => {
                tracing::warn!("Ignoring dev session storage outside development mode");
            }
            None if config.development_mode => {
                tracing::warn!("Development mode without dev session storage");
            }
            None => {}
        }

        let memberships = MembershipCache::new(api.clone());
        Self {
            config: Arc::new(config),
            session: SessionCache::with_memberships(api.clone(), options, memberships.clone()),
            memberships,
            api,
            bootstrap: OnceCell::new(),
        }
    }

    /// Reconciles the dev session token and loads the first session, once.
    ///
    /// Memberships follow the session: loaded for a signed-in user, empty otherwise.
    ///
    /// Concurrent and repeated calls wait for the same run. A storage failure leaves
    /// the client uninitialized so a later call retries; a failed session fetch
    /// does not, it is reported through the snapshot like any other fetch.
    pub async fn ensure_initialized(&self) -> Result<SessionSnapshot, CoordinationError> {
        self.bootstrap
            .get_or_try_init(|| async {
                if let Some(reconciler) = self.api.dev_tokens() {
                    reconciler.reconcile()?;
                }
                self.session.revalidate().await;
                tracing::debug!("Identity client initialized");
                Ok::<(), CoordinationError>(())
            })
            .await?;
        Ok(self.session.read())
    }

    pub fn is_initialized(&self) -> bool {
        self.bootstrap.initialized()
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &SessionCache {
        &self.session
    }

    pub fn memberships(&self) -> &MembershipCache {
        &self.memberships
    }

    pub fn spawn_background_refresh(&self) -> RefreshHandle {
        self.session.spawn_background_refresh()
    }

    pub fn signin_flow(&self) -> SigninFlow {
        SigninFlow::new(self.api.clone(), self.config.clone())
            .with_session_cache(self.session.clone())
    }

    pub fn signup_flow(&self) -> SignupFlow {
        SignupFlow::new(self.api.clone(), self.config.clone())
            .with_session_cache(self.session.clone())
    }

    /// One handler per callback page load.
    pub fn oauth_callback(&self) -> OAuthCallbackHandler {
        OAuthCallbackHandler::new(self.api.clone(), self.config.clone())
            .with_session_cache(self.session.clone())
    }

    pub fn profile_completion(&self, attempt: PendingAttempt) -> ProfileCompletion {
        ProfileCompletion::new(self.api.clone(), self.config.clone(), attempt)
            .with_session_cache(self.session.clone())
    }

    pub async fn init_oauth(&self, provider: &str, redirect_uri: &str) -> ApiResult<Url> {
        init_oauth(&self.api, &self.config, provider, redirect_uri).await
    }
}
