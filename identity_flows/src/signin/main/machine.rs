use std::sync::Arc;

use tokio::sync::Mutex;
use url::Url;

use crate::api::{ApiClient, ApiError, ApiResult, ValidationError};
use crate::config::DeploymentConfig;
use crate::oauth2::init_oauth;
use crate::session::{Session, SessionCache};
use crate::signin::errors::SubmitError;
use crate::signin::types::{
    SigninAttempt, SigninEvent, SigninState, SigninStep, SigninStrategy, StrategyKind,
};
use crate::signup::collectable_fields;
use crate::verification::{
    ResendTimer, VerificationLatch, VerificationStrategy, attempt_verification,
    prepare_verification, validate_code,
};

use super::magic_link::MagicLinkParams;
use super::strategy::{Dispatch, strategy_table};

/// Drives one sign-in attempt from credential submission to completion.
///
/// Clones share state. The lock is never held across a network call, so state
/// accessors stay responsive while a request is in flight.
#[derive(Clone)]
pub struct SigninFlow {
    client: ApiClient,
    config: Arc<DeploymentConfig>,
    session_cache: Option<SessionCache>,
    inner: Arc<Mutex<FlowInner>>,
}

struct FlowInner {
    state: SigninState,
    attempt: Option<SigninAttempt>,
    strategy: Option<StrategyKind>,
    latch: VerificationLatch,
    timer: ResendTimer,
    code: String,
    in_flight: bool,
    generation: u64,
    submit_error: Option<SubmitError>,
    last_error: Option<ApiError>,
}

/// The attempt a request was issued for, captured before the call.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ticket {
    generation: u64,
    attempt_id: Option<String>,
}

enum Next {
    Done(SigninEvent),
    Complete(Session),
    Prepare {
        ticket: Ticket,
        attempt_id: String,
        step: SigninStep,
        strategy: VerificationStrategy,
    },
}

impl FlowInner {
    fn new(timer: ResendTimer) -> Self {
        Self {
            state: SigninState::Idle,
            attempt: None,
            strategy: None,
            latch: VerificationLatch::new(),
            timer,
            code: String::new(),
            in_flight: false,
            generation: 0,
            submit_error: None,
            last_error: None,
        }
    }

    fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
            attempt_id: self.attempt.as_ref().map(|a| a.id.clone()),
        }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        *ticket == self.ticket()
    }

    fn magic_link(&self) -> bool {
        self.strategy == Some(StrategyKind::EmailMagicLink)
    }

    fn record_error(&mut self, error: &ApiError) {
        self.submit_error = SubmitError::from_api_error(error);
        self.last_error = Some(error.clone());
    }

    fn clear_errors(&mut self) {
        self.submit_error = None;
        self.last_error = None;
    }

    /// Starts a request; fails if another one is still in flight.
    fn begin(&mut self) -> ApiResult<Ticket> {
        if self.in_flight {
            return Err(ValidationError::SubmissionInFlight.into());
        }
        self.in_flight = true;
        self.clear_errors();
        Ok(self.ticket())
    }

    /// Resets everything tied to the current attempt and invalidates in-flight tickets.
    fn reset_attempt(&mut self) {
        self.generation += 1;
        self.attempt = None;
        self.timer.stop();
        self.code.clear();
        self.in_flight = false;
    }
}

impl SigninFlow {
    pub fn new(client: ApiClient, config: Arc<DeploymentConfig>) -> Self {
        Self {
            client,
            config,
            session_cache: None,
            inner: Arc::new(Mutex::new(FlowInner::new(ResendTimer::default()))),
        }
    }

    /// Completion refetches this cache before the completion event is returned.
    pub fn with_session_cache(mut self, cache: SessionCache) -> Self {
        self.session_cache = Some(cache);
        self
    }

    /// Submits first-factor credentials and starts a fresh attempt.
    pub async fn submit(&self, strategy: SigninStrategy) -> ApiResult<SigninEvent> {
        let dispatch = match strategy_table(&strategy) {
            Ok(dispatch) => dispatch,
            Err(e) => return Err(self.reject(e.into()).await),
        };
        let kind = strategy.kind();

        let ticket = {
            let mut inner = self.inner.lock().await;
            if inner.in_flight {
                return Err(ValidationError::SubmissionInFlight.into());
            }
            inner.reset_attempt();
            inner.strategy = Some(kind);
            inner.state = SigninState::Submitted;
            inner.begin()?
        };
        tracing::debug!("Submitting sign-in with {} strategy", kind.as_str());

        match dispatch {
            Dispatch::Signin(request) => {
                let result: ApiResult<Session> = self.client.send(request).await;
                self.settle(ticket, result).await
            }
            Dispatch::OAuth {
                provider,
                redirect_uri,
            } => {
                let result = init_oauth(&self.client, &self.config, &provider, &redirect_uri).await;
                let mut inner = self.inner.lock().await;
                if !inner.is_current(&ticket) {
                    return Ok(SigninEvent::Ignored);
                }
                inner.in_flight = false;
                match result {
                    Ok(url) => {
                        tracing::info!("Redirecting to {} for sign-in", provider);
                        Ok(SigninEvent::Redirect(url))
                    }
                    Err(e) => {
                        inner.record_error(&e);
                        inner.state = SigninState::Idle;
                        Err(e)
                    }
                }
            }
        }
    }

    /// The single transition handler for a session carrying sign-in attempts.
    ///
    /// Adopts the last attempt in `signin_attempts`, then either completes, asks for
    /// missing profile data, or moves to the pending verification step. Reaching an
    /// email or phone step prepares verification at most once per attempt, no matter
    /// how often the same session is delivered.
    pub async fn on_attempt_received(&self, session: Session) -> ApiResult<SigninEvent> {
        let next = {
            let mut inner = self.inner.lock().await;
            self.transition(&mut inner, session)?
        };

        match next {
            Next::Done(event) => Ok(event),
            Next::Complete(session) => {
                if let Some(cache) = &self.session_cache {
                    cache.refetch().await;
                }
                Ok(SigninEvent::Completed(session))
            }
            Next::Prepare {
                ticket,
                attempt_id,
                step,
                strategy,
            } => {
                let result = prepare_verification(&self.client, &attempt_id, strategy).await;
                let mut inner = self.inner.lock().await;
                if !inner.is_current(&ticket) {
                    return Ok(SigninEvent::Ignored);
                }
                match result {
                    Ok(()) => {
                        inner.timer.restart().await;
                        Ok(SigninEvent::VerificationRequired {
                            step,
                            prepared: Some(strategy),
                        })
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Preparing {} for attempt {} failed: {}",
                            strategy,
                            attempt_id,
                            e
                        );
                        inner.record_error(&e);
                        Ok(SigninEvent::VerificationRequired {
                            step,
                            prepared: None,
                        })
                    }
                }
            }
        }
    }

    /// Submits the code for the pending verification step.
    pub async fn submit_verification(&self, code: &str) -> ApiResult<SigninEvent> {
        let code = match validate_code(code) {
            Ok(code) => code,
            Err(e) => return Err(self.reject(e.into()).await),
        };

        let (ticket, attempt_id, identifier_type) = {
            let mut inner = self.inner.lock().await;
            let pending = match (&inner.attempt, inner.state) {
                (Some(attempt), SigninState::VerificationPending(step)) => {
                    Some((attempt.id.clone(), step))
                }
                _ => None,
            };
            let Some((attempt_id, step)) = pending else {
                let e = ApiError::Protocol("No verification is pending".to_string());
                inner.record_error(&e);
                return Err(e);
            };
            let Some(identifier_type) = step.identifier_type() else {
                let e = ApiError::Protocol(format!("Step {step} does not take a code"));
                inner.record_error(&e);
                return Err(e);
            };
            (inner.begin()?, attempt_id, identifier_type)
        };

        let result = attempt_verification(&self.client, &attempt_id, identifier_type, &code).await;
        self.settle(ticket, result).await
    }

    /// Sends the verification code again.
    ///
    /// Returns `Ok(false)` without a request while the cooldown is running or a
    /// submission is in flight. A successful resend clears the entered code and
    /// restarts the cooldown.
    pub async fn resend(&self) -> ApiResult<bool> {
        let (ticket, attempt_id, strategy) = {
            let mut inner = self.inner.lock().await;
            let in_flight = inner.in_flight;
            if !inner.timer.can_resend(in_flight).await {
                tracing::debug!("Resend ignored while cooling down or submitting");
                return Ok(false);
            }
            let pending = match (&inner.attempt, inner.state) {
                (Some(attempt), SigninState::VerificationPending(step)) => step
                    .verification_strategy(inner.magic_link())
                    .map(|strategy| (attempt.id.clone(), strategy)),
                _ => None,
            };
            let Some((attempt_id, strategy)) = pending else {
                let e = ApiError::Protocol("Nothing to resend for the current step".to_string());
                inner.record_error(&e);
                return Err(e);
            };
            (inner.begin()?, attempt_id, strategy)
        };

        let result = prepare_verification(&self.client, &attempt_id, strategy).await;
        let mut inner = self.inner.lock().await;
        if !inner.is_current(&ticket) {
            return Ok(false);
        }
        inner.in_flight = false;
        match result {
            Ok(()) => {
                inner.code.clear();
                inner.timer.restart().await;
                Ok(true)
            }
            Err(e) => {
                inner.record_error(&e);
                Err(e)
            }
        }
    }

    /// Completes a sign-in from a magic-link landing URL.
    pub async fn verify_magic_link(&self, url: &Url) -> ApiResult<SigninEvent> {
        let params = match MagicLinkParams::from_url(url) {
            Ok(params) => params,
            Err(e) => return Err(self.reject(e).await),
        };

        let ticket = {
            let mut inner = self.inner.lock().await;
            if inner.in_flight {
                return Err(ValidationError::SubmissionInFlight.into());
            }
            inner.reset_attempt();
            inner.strategy = Some(StrategyKind::EmailMagicLink);
            inner.state = SigninState::Submitted;
            inner.begin()?
        };
        tracing::debug!("Verifying magic link for attempt {}", params.attempt());

        let result: ApiResult<Session> = self.client.send(params.request()).await;
        self.settle(ticket, result).await
    }

    /// Abandons the current attempt ("use other methods", "back").
    ///
    /// Responses still in flight for it are ignored when they arrive.
    pub async fn discard(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == SigninState::Completed {
            return;
        }
        inner.reset_attempt();
        inner.clear_errors();
        inner.state = SigninState::Discarded;
        tracing::debug!("Sign-in attempt discarded");
    }

    /// Stops timers and detaches in-flight requests without changing the state.
    pub async fn unmount(&self) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.in_flight = false;
        inner.timer.stop();
    }

    pub async fn state(&self) -> SigninState {
        self.inner.lock().await.state
    }

    pub async fn attempt(&self) -> Option<SigninAttempt> {
        self.inner.lock().await.attempt.clone()
    }

    /// Whitelisted error for display, if the last failure had one.
    pub async fn submit_error(&self) -> Option<SubmitError> {
        self.inner.lock().await.submit_error.clone()
    }

    /// The raw last failure, whitelisted or not.
    pub async fn last_error(&self) -> Option<ApiError> {
        self.inner.lock().await.last_error.clone()
    }

    pub async fn code(&self) -> String {
        self.inner.lock().await.code.clone()
    }

    pub async fn set_code(&self, code: impl Into<String>) {
        self.inner.lock().await.code = code.into();
    }

    pub async fn is_in_flight(&self) -> bool {
        self.inner.lock().await.in_flight
    }

    pub async fn resend_remaining(&self) -> u32 {
        self.inner.lock().await.timer.remaining().await
    }

    pub async fn can_resend(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.timer.can_resend(inner.in_flight).await
    }

    async fn reject(&self, error: ApiError) -> ApiError {
        tracing::debug!("Rejected locally: {}", error);
        self.inner.lock().await.last_error = Some(error.clone());
        error
    }

    /// Applies a response to the attempt it was issued for, or drops it.
    async fn settle(&self, ticket: Ticket, result: ApiResult<Session>) -> ApiResult<SigninEvent> {
        {
            let mut inner = self.inner.lock().await;
            if !inner.is_current(&ticket) {
                tracing::debug!("Ignoring response for a sign-in attempt that is gone");
                return Ok(SigninEvent::Ignored);
            }
            inner.in_flight = false;
            if let Err(e) = &result {
                inner.record_error(e);
                if inner.state == SigninState::Submitted {
                    inner.state = SigninState::Idle;
                }
            }
        }
        self.on_attempt_received(result?).await
    }

    fn transition(&self, inner: &mut FlowInner, session: Session) -> ApiResult<Next> {
        let Some(attempt) = session.latest_signin_attempt().cloned() else {
            if session.is_signed_in() {
                return Ok(self.complete(inner, session));
            }
            let e = ApiError::Protocol("Session carries no sign-in attempt".to_string());
            inner.record_error(&e);
            return Err(e);
        };

        if attempt.completed {
            return Ok(self.complete(inner, session));
        }

        inner.attempt = Some(attempt.clone());

        let collect = collectable_fields(&attempt.missing_fields, &self.config);
        if !collect.is_empty() {
            inner.state = SigninState::Submitted;
            tracing::debug!("Attempt {} is missing {:?}", attempt.id, collect);
            return Ok(Next::Done(SigninEvent::ProfileIncomplete(collect)));
        }

        let Some(step) = attempt.current_step else {
            inner.state = SigninState::Submitted;
            return Ok(Next::Done(SigninEvent::Pending));
        };
        inner.state = SigninState::VerificationPending(step);

        match step.verification_strategy(inner.magic_link()) {
            Some(strategy) if inner.latch.try_fire(&attempt.id, strategy) => Ok(Next::Prepare {
                ticket: inner.ticket(),
                attempt_id: attempt.id,
                step,
                strategy,
            }),
            _ => Ok(Next::Done(SigninEvent::VerificationRequired {
                step,
                prepared: None,
            })),
        }
    }

    fn complete(&self, inner: &mut FlowInner, session: Session) -> Next {
        tracing::info!("Sign-in completed for session {}", session.id);
        inner.reset_attempt();
        inner.state = SigninState::Completed;
        Next::Complete(session)
    }
}
