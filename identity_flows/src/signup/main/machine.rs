use std::sync::Arc;

use tokio::sync::Mutex;

use crate::api::{ApiClient, ApiError, ApiRequest, ApiResult, ValidationError, endpoints};
use crate::config::{DeploymentConfig, ProfileField};
use crate::session::{Session, SessionCache};
use crate::signin::SubmitError;
use crate::signup::types::{
    ProfileData, SignupAttempt, SignupEvent, SignupResponse, SignupState, SignupStep,
};
use crate::verification::{
    ResendTimer, VerificationLatch, VerificationStrategy, attempt_verification,
    prepare_verification, validate_code,
};

use super::fields::{
    collectable_fields, submit_missing_fields, validate_missing_fields, validate_required_fields,
};

/// Drives one sign-up attempt: profile submission, missing fields, verification.
///
/// Attempts created here and attempts arriving pre-populated from an OAuth
/// provider (see [`SignupFlow::adopt_attempt`]) go through the same transitions.
#[derive(Clone)]
pub struct SignupFlow {
    client: ApiClient,
    config: Arc<DeploymentConfig>,
    session_cache: Option<SessionCache>,
    inner: Arc<Mutex<FlowInner>>,
}

struct FlowInner {
    state: SignupState,
    attempt: Option<SignupAttempt>,
    latch: VerificationLatch,
    timer: ResendTimer,
    code: String,
    in_flight: bool,
    generation: u64,
    submit_error: Option<SubmitError>,
    last_error: Option<ApiError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Ticket {
    generation: u64,
    attempt_id: Option<String>,
}

enum Next {
    Done(SignupEvent),
    /// Carries the session when the response already included one.
    Complete(Option<Session>),
    Prepare {
        ticket: Ticket,
        attempt_id: String,
        step: SignupStep,
        strategy: VerificationStrategy,
    },
}

impl FlowInner {
    fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
            attempt_id: self.attempt.as_ref().map(|a| a.id.clone()),
        }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        *ticket == self.ticket()
    }

    fn record_error(&mut self, error: &ApiError) {
        self.submit_error = SubmitError::from_api_error(error);
        self.last_error = Some(error.clone());
    }

    fn begin(&mut self) -> ApiResult<Ticket> {
        if self.in_flight {
            return Err(ValidationError::SubmissionInFlight.into());
        }
        self.in_flight = true;
        self.submit_error = None;
        self.last_error = None;
        Ok(self.ticket())
    }

    fn reset_attempt(&mut self) {
        self.generation += 1;
        self.attempt = None;
        self.timer.stop();
        self.code.clear();
        self.in_flight = false;
    }
}

impl SignupFlow {
    pub fn new(client: ApiClient, config: Arc<DeploymentConfig>) -> Self {
        Self {
            client,
            config,
            session_cache: None,
            inner: Arc::new(Mutex::new(FlowInner {
                state: SignupState::Idle,
                attempt: None,
                latch: VerificationLatch::new(),
                timer: ResendTimer::default(),
                code: String::new(),
                in_flight: false,
                generation: 0,
                submit_error: None,
                last_error: None,
            })),
        }
    }

    pub fn with_session_cache(mut self, cache: SessionCache) -> Self {
        self.session_cache = Some(cache);
        self
    }

    /// Submits a new sign-up after checking the fields the deployment requires.
    pub async fn submit(&self, data: &ProfileData) -> ApiResult<SignupEvent> {
        if let Err(e) = validate_required_fields(&self.config, data) {
            return Err(self.reject(e.into()).await);
        }

        let ticket = {
            let mut inner = self.inner.lock().await;
            if inner.in_flight {
                return Err(ValidationError::SubmissionInFlight.into());
            }
            inner.reset_attempt();
            inner.state = SignupState::Submitted;
            inner.begin()?
        };
        tracing::debug!("Submitting sign-up");

        let request = ApiRequest::post(endpoints::SIGNUP).form(data.to_form());
        let result: ApiResult<SignupResponse> = self.client.send(request).await;
        match self.accept(ticket, result).await? {
            Some(response) => self.advance(Some(response.sign_in_attempt), None).await,
            None => Ok(SignupEvent::Ignored),
        }
    }

    /// Takes over an attempt that was started elsewhere, e.g. by an OAuth provider.
    pub async fn adopt_attempt(&self, session: Session) -> ApiResult<SignupEvent> {
        {
            let mut inner = self.inner.lock().await;
            inner.reset_attempt();
            inner.state = SignupState::Submitted;
        }
        self.on_attempt_received(session).await
    }

    /// The single transition handler, mirroring the sign-in machine.
    pub async fn on_attempt_received(&self, session: Session) -> ApiResult<SignupEvent> {
        let attempt = session.latest_signup_attempt().cloned();
        self.advance(attempt, Some(session)).await
    }

    async fn advance(
        &self,
        attempt: Option<SignupAttempt>,
        session: Option<Session>,
    ) -> ApiResult<SignupEvent> {
        let next = {
            let mut inner = self.inner.lock().await;
            self.transition(&mut inner, attempt, session)?
        };

        match next {
            Next::Done(event) => Ok(event),
            Next::Complete(Some(session)) => {
                if let Some(cache) = &self.session_cache {
                    cache.refetch().await;
                }
                Ok(SignupEvent::Completed(session))
            }
            Next::Complete(None) => Ok(SignupEvent::Completed(self.fetch_session().await?)),
            Next::Prepare {
                ticket,
                attempt_id,
                step,
                strategy,
            } => {
                let result = prepare_verification(&self.client, &attempt_id, strategy).await;
                let mut inner = self.inner.lock().await;
                if !inner.is_current(&ticket) {
                    return Ok(SignupEvent::Ignored);
                }
                match result {
                    Ok(()) => {
                        inner.timer.restart().await;
                        Ok(SignupEvent::VerificationRequired {
                            step,
                            prepared: Some(strategy),
                        })
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Preparing {} for sign-up {} failed: {}",
                            strategy,
                            attempt_id,
                            e
                        );
                        inner.record_error(&e);
                        Ok(SignupEvent::VerificationRequired {
                            step,
                            prepared: None,
                        })
                    }
                }
            }
        }
    }

    /// Sends the fields the current attempt reported missing.
    pub async fn complete_fields(&self, data: &ProfileData) -> ApiResult<SignupEvent> {
        let (ticket, attempt_id, missing) = {
            let mut inner = self.inner.lock().await;
            let Some(attempt) = inner.attempt.clone() else {
                let e = ApiError::Protocol("No sign-up attempt to complete".to_string());
                inner.record_error(&e);
                return Err(e);
            };
            if let Err(e) = validate_missing_fields(&attempt.missing_fields, &self.config, data) {
                let e = ApiError::from(e);
                inner.last_error = Some(e.clone());
                return Err(e);
            }
            (inner.begin()?, attempt.id, attempt.missing_fields)
        };

        let result = submit_missing_fields(&self.client, &attempt_id, &data.only(&missing)).await;
        self.settle(ticket, result).await
    }

    pub async fn submit_verification(&self, code: &str) -> ApiResult<SignupEvent> {
        let code = match validate_code(code) {
            Ok(code) => code,
            Err(e) => return Err(self.reject(e.into()).await),
        };

        let (ticket, attempt_id, step) = {
            let mut inner = self.inner.lock().await;
            let pending = match (&inner.attempt, inner.state) {
                (Some(attempt), SignupState::VerificationPending(step)) => {
                    Some((attempt.id.clone(), step))
                }
                _ => None,
            };
            let Some((attempt_id, step)) = pending else {
                let e = ApiError::Protocol("No verification is pending".to_string());
                inner.record_error(&e);
                return Err(e);
            };
            (inner.begin()?, attempt_id, step)
        };

        let result =
            attempt_verification(&self.client, &attempt_id, step.identifier_type(), &code).await;
        self.settle(ticket, result).await
    }

    /// Same cooldown rules as sign-in: a no-op until the countdown reached zero.
    pub async fn resend(&self) -> ApiResult<bool> {
        let (ticket, attempt_id, strategy) = {
            let mut inner = self.inner.lock().await;
            let in_flight = inner.in_flight;
            if !inner.timer.can_resend(in_flight).await {
                return Ok(false);
            }
            let pending = match (&inner.attempt, inner.state) {
                (Some(attempt), SignupState::VerificationPending(step)) => step
                    .verification_strategy()
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

    pub async fn discard(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == SignupState::Completed {
            return;
        }
        inner.reset_attempt();
        inner.submit_error = None;
        inner.last_error = None;
        inner.state = SignupState::Discarded;
    }

    pub async fn unmount(&self) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.in_flight = false;
        inner.timer.stop();
    }

    pub async fn state(&self) -> SignupState {
        self.inner.lock().await.state
    }

    pub async fn attempt(&self) -> Option<SignupAttempt> {
        self.inner.lock().await.attempt.clone()
    }

    /// Missing fields of the current attempt that the form should render.
    pub async fn fields_to_collect(&self) -> Vec<ProfileField> {
        let inner = self.inner.lock().await;
        match &inner.attempt {
            Some(attempt) => collectable_fields(&attempt.missing_fields, &self.config),
            None => Vec::new(),
        }
    }

    pub async fn submit_error(&self) -> Option<SubmitError> {
        self.inner.lock().await.submit_error.clone()
    }

    pub async fn last_error(&self) -> Option<ApiError> {
        self.inner.lock().await.last_error.clone()
    }

    pub async fn code(&self) -> String {
        self.inner.lock().await.code.clone()
    }

    pub async fn set_code(&self, code: impl Into<String>) {
        self.inner.lock().await.code = code.into();
    }

    pub async fn resend_remaining(&self) -> u32 {
        self.inner.lock().await.timer.remaining().await
    }

    async fn reject(&self, error: ApiError) -> ApiError {
        tracing::debug!("Rejected locally: {}", error);
        self.inner.lock().await.last_error = Some(error.clone());
        error
    }

    /// Releases the in-flight guard; `Ok(None)` when the attempt is gone.
    async fn accept<T>(&self, ticket: Ticket, result: ApiResult<T>) -> ApiResult<Option<T>> {
        let mut inner = self.inner.lock().await;
        if !inner.is_current(&ticket) {
            tracing::debug!("Ignoring response for a sign-up attempt that is gone");
            return Ok(None);
        }
        inner.in_flight = false;
        if let Err(e) = &result {
            inner.record_error(e);
            if inner.state == SignupState::Submitted && inner.attempt.is_none() {
                inner.state = SignupState::Idle;
            }
        }
        result.map(Some)
    }

    async fn settle(&self, ticket: Ticket, result: ApiResult<Session>) -> ApiResult<SignupEvent> {
        match self.accept(ticket, result).await? {
            Some(session) => self.on_attempt_received(session).await,
            None => Ok(SignupEvent::Ignored),
        }
    }

    /// Session after an attempt completed without one in the response.
    async fn fetch_session(&self) -> ApiResult<Session> {
        let Some(cache) = &self.session_cache else {
            return self.client.send(ApiRequest::get(endpoints::SESSION)).await;
        };
        let snapshot = cache.refetch().await;
        if let Some(e) = snapshot.error {
            return Err(e);
        }
        snapshot
            .session
            .ok_or_else(|| ApiError::Protocol("No session after sign-up".to_string()))
    }

    fn transition(
        &self,
        inner: &mut FlowInner,
        attempt: Option<SignupAttempt>,
        session: Option<Session>,
    ) -> ApiResult<Next> {
        let Some(attempt) = attempt else {
            if let Some(session) = session.filter(Session::is_signed_in) {
                return Ok(self.complete(inner, Some(session)));
            }
            let e = ApiError::Protocol("Response carries no sign-up attempt".to_string());
            inner.record_error(&e);
            return Err(e);
        };

        if attempt.completed {
            return Ok(self.complete(inner, session));
        }

        inner.attempt = Some(attempt.clone());

        let collect = collectable_fields(&attempt.missing_fields, &self.config);
        if !collect.is_empty() {
            inner.state = SignupState::Submitted;
            return Ok(Next::Done(SignupEvent::FieldsRequired(collect)));
        }

        let Some(step) = attempt.current_step else {
            inner.state = SignupState::Submitted;
            return Ok(Next::Done(SignupEvent::Pending));
        };
        inner.state = SignupState::VerificationPending(step);

        match step.verification_strategy() {
            Some(strategy) if inner.latch.try_fire(&attempt.id, strategy) => Ok(Next::Prepare {
                ticket: inner.ticket(),
                attempt_id: attempt.id,
                step,
                strategy,
            }),
            _ => Ok(Next::Done(SignupEvent::VerificationRequired {
                step,
                prepared: None,
            })),
        }
    }

    fn complete(&self, inner: &mut FlowInner, session: Option<Session>) -> Next {
        match &session {
            Some(session) => tracing::info!("Sign-up completed for session {}", session.id),
            None => tracing::info!("Sign-up completed"),
        }
        inner.reset_attempt();
        inner.state = SignupState::Completed;
        Next::Complete(session)
    }
}
