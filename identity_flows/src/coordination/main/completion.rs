use std::sync::Arc;

use tokio::sync::Mutex;

use crate::api::{ApiClient, ApiError, ApiResult, ValidationError};
use crate::config::{DeploymentConfig, ProfileField};
use crate::coordination::types::{
    AttemptKind, CompletableAttempt, CompletionEvent, PendingAttempt,
};
use crate::session::{Session, SessionCache};
use crate::signup::{ProfileData, collectable_fields, submit_missing_fields, validate_missing_fields};
use crate::verification::{
    self, IdentifierType, ResendTimer, VerificationLatch, VerificationStrategy, validate_code,
};

/// Finishes an attempt that stopped on missing profile fields or a pending
/// verification, whichever flow it came from.
///
/// Field checks and code checks are the ones the sign-up and sign-in machines use;
/// automatic verification dispatch goes through the same per-attempt latch.
#[derive(Clone)]
pub struct ProfileCompletion {
    client: ApiClient,
    config: Arc<DeploymentConfig>,
    session_cache: Option<SessionCache>,
    inner: Arc<Mutex<CompletionInner>>,
}

struct CompletionInner {
    attempt: PendingAttempt,
    latch: VerificationLatch,
    timer: ResendTimer,
    in_flight: bool,
    generation: u64,
    last_error: Option<ApiError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Ticket {
    generation: u64,
    attempt_id: String,
}

enum Next {
    Done(CompletionEvent),
    Complete(Session),
    Prepare {
        ticket: Ticket,
        attempt_id: String,
        identifier_type: IdentifierType,
        strategy: VerificationStrategy,
    },
}

impl CompletionInner {
    fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
            attempt_id: self.attempt.id().to_string(),
        }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        *ticket == self.ticket()
    }

    fn begin(&mut self) -> ApiResult<Ticket> {
        if self.in_flight {
            return Err(ValidationError::SubmissionInFlight.into());
        }
        self.in_flight = true;
        self.last_error = None;
        Ok(self.ticket())
    }

    fn fail(&mut self, error: ApiError) -> ApiError {
        self.last_error = Some(error.clone());
        error
    }
}

impl ProfileCompletion {
    pub fn new(client: ApiClient, config: Arc<DeploymentConfig>, attempt: PendingAttempt) -> Self {
        Self {
            client,
            config,
            session_cache: None,
            inner: Arc::new(Mutex::new(CompletionInner {
                attempt,
                latch: VerificationLatch::new(),
                timer: ResendTimer::default(),
                in_flight: false,
                generation: 0,
                last_error: None,
            })),
        }
    }

    pub fn with_session_cache(mut self, cache: SessionCache) -> Self {
        self.session_cache = Some(cache);
        self
    }

    pub async fn kind(&self) -> AttemptKind {
        self.inner.lock().await.attempt.kind()
    }

    pub async fn title(&self) -> &'static str {
        self.kind().await.title()
    }

    pub async fn attempt(&self) -> PendingAttempt {
        self.inner.lock().await.attempt.clone()
    }

    pub async fn fields_to_collect(&self) -> Vec<ProfileField> {
        let inner = self.inner.lock().await;
        collectable_fields(inner.attempt.missing_fields(), &self.config)
    }

    pub async fn last_error(&self) -> Option<ApiError> {
        self.inner.lock().await.last_error.clone()
    }

    pub async fn resend_remaining(&self) -> u32 {
        self.inner.lock().await.timer.remaining().await
    }

    /// Stops the resend countdown and detaches in-flight requests.
    pub async fn unmount(&self) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.in_flight = false;
        inner.timer.stop();
    }

    /// Evaluates the handed-over attempt, preparing verification if it waits on one.
    pub async fn start(&self) -> ApiResult<CompletionEvent> {
        let next = {
            let mut inner = self.inner.lock().await;
            self.evaluate(&mut inner)
        };
        self.run(next).await
    }

    /// Applies a session returned by any completion request.
    pub async fn on_attempt_received(&self, session: Session) -> ApiResult<CompletionEvent> {
        let next = {
            let mut inner = self.inner.lock().await;
            let latest = match inner.attempt.kind() {
                AttemptKind::Signin => session
                    .latest_signin_attempt()
                    .cloned()
                    .map(PendingAttempt::Signin),
                AttemptKind::Signup => session
                    .latest_signup_attempt()
                    .cloned()
                    .map(PendingAttempt::Signup),
            };
            match latest {
                Some(attempt) if !attempt.is_completed() => {
                    inner.attempt = attempt;
                    self.evaluate(&mut inner)
                }
                Some(_) => Next::Complete(session),
                None if session.is_signed_in() => Next::Complete(session),
                None => {
                    return Err(inner.fail(ApiError::Protocol(
                        "Session carries no attempt to complete".to_string(),
                    )));
                }
            }
        };
        self.run(next).await
    }

    /// Submits the missing fields; only missing and enabled fields are required.
    pub async fn complete(&self, data: &ProfileData) -> ApiResult<CompletionEvent> {
        let (ticket, missing) = {
            let mut inner = self.inner.lock().await;
            let missing = inner.attempt.missing_fields().to_vec();
            if let Err(e) = validate_missing_fields(&missing, &self.config, data) {
                return Err(inner.fail(e.into()));
            }
            (inner.begin()?, missing)
        };

        let result =
            submit_missing_fields(&self.client, &ticket.attempt_id, &data.only(&missing)).await;
        self.settle(ticket, result).await
    }

    /// Submits the code for the pending verification step.
    pub async fn complete_verification(&self, code: &str) -> ApiResult<CompletionEvent> {
        let (ticket, identifier_type, code) = {
            let mut inner = self.inner.lock().await;
            let code = match validate_code(code) {
                Ok(code) => code,
                Err(e) => return Err(inner.fail(e.into())),
            };
            let Some(identifier_type) = inner.attempt.verification_identifier() else {
                return Err(inner.fail(ApiError::Protocol(
                    "No verification is pending".to_string(),
                )));
            };
            (inner.begin()?, identifier_type, code)
        };

        let result = verification::attempt_verification(
            &self.client,
            &ticket.attempt_id,
            identifier_type,
            &code,
        )
        .await;
        self.settle(ticket, result).await
    }

    /// Sends a code or link on request, subject to the resend cooldown.
    ///
    /// Returns `Ok(false)` without a request while the cooldown is running.
    pub async fn prepare_verification(&self, strategy: VerificationStrategy) -> ApiResult<bool> {
        let ticket = {
            let mut inner = self.inner.lock().await;
            let in_flight = inner.in_flight;
            if !inner.timer.can_resend(in_flight).await {
                return Ok(false);
            }
            inner.begin()?
        };

        let result =
            verification::prepare_verification(&self.client, &ticket.attempt_id, strategy).await;
        let mut inner = self.inner.lock().await;
        if !inner.is_current(&ticket) {
            return Ok(false);
        }
        inner.in_flight = false;
        match result {
            Ok(()) => {
                inner.latch.try_fire(&ticket.attempt_id, strategy);
                inner.timer.restart().await;
                Ok(true)
            }
            Err(e) => Err(inner.fail(e)),
        }
    }

    async fn settle(
        &self,
        ticket: Ticket,
        result: ApiResult<Session>,
    ) -> ApiResult<CompletionEvent> {
        {
            let mut inner = self.inner.lock().await;
            if !inner.is_current(&ticket) {
                tracing::debug!("Ignoring response for an unmounted profile completion");
                return Ok(CompletionEvent::Ignored);
            }
            inner.in_flight = false;
            if let Err(e) = &result {
                inner.last_error = Some(e.clone());
            }
        }
        self.on_attempt_received(result?).await
    }

    fn evaluate(&self, inner: &mut CompletionInner) -> Next {
        let collect = collectable_fields(inner.attempt.missing_fields(), &self.config);
        if !collect.is_empty() {
            return Next::Done(CompletionEvent::FieldsRequired(collect));
        }

        let Some(identifier_type) = inner.attempt.verification_identifier() else {
            return Next::Done(CompletionEvent::Pending);
        };
        let attempt_id = inner.attempt.id().to_string();
        match inner.attempt.verification_strategy() {
            Some(strategy) if inner.latch.try_fire(&attempt_id, strategy) => Next::Prepare {
                ticket: inner.ticket(),
                attempt_id,
                identifier_type,
                strategy,
            },
            _ => Next::Done(CompletionEvent::VerificationRequired {
                identifier_type,
                prepared: None,
            }),
        }
    }

    async fn run(&self, next: Next) -> ApiResult<CompletionEvent> {
        match next {
            Next::Done(event) => Ok(event),
            Next::Complete(session) => {
                tracing::info!("Profile completion finished for session {}", session.id);
                self.inner.lock().await.timer.stop();
                if let Some(cache) = &self.session_cache {
                    cache.refetch().await;
                }
                Ok(CompletionEvent::Completed(session))
            }
            Next::Prepare {
                ticket,
                attempt_id,
                identifier_type,
                strategy,
            } => {
                let result =
                    verification::prepare_verification(&self.client, &attempt_id, strategy).await;
                let mut inner = self.inner.lock().await;
                if !inner.is_current(&ticket) {
                    return Ok(CompletionEvent::Ignored);
                }
                match result {
                    Ok(()) => {
                        inner.timer.restart().await;
                        Ok(CompletionEvent::VerificationRequired {
                            identifier_type,
                            prepared: Some(strategy),
                        })
                    }
                    Err(e) => {
                        tracing::warn!("Preparing {} for attempt {} failed: {}", strategy, attempt_id, e);
                        inner.last_error = Some(e);
                        Ok(CompletionEvent::VerificationRequired {
                            identifier_type,
                            prepared: None,
                        })
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RequestBody, endpoints};
    use crate::config::FieldSetting;
    use crate::signin::{SigninAttempt, SigninStep};
    use crate::signup::SignupAttempt;
    use crate::test_utils::{MockTransport, session_json, test_config};
    use serde_json::json;
    use std::time::Duration;

    fn username_enabled() -> DeploymentConfig {
        test_config().with_field(
            ProfileField::Username,
            FieldSetting {
                enabled: true,
                required: true,
            },
        )
    }

    #[tokio::test]
    async fn test_signup_completion_collects_fields_then_verifies() {
        // Given an OAuth sign-up missing a username
        let transport = MockTransport::new();
        transport.respond_data(
            "POST",
            endpoints::OAUTH2_COMPLETE,
            session_json(json!({
                "signup_attempts": [{"id": "sua_1", "current_step": "verify_email"}]
            })),
        );
        transport.respond_data("POST", endpoints::PREPARE_VERIFICATION, json!({}));
        transport.respond_data(
            "POST",
            endpoints::ATTEMPT_VERIFICATION,
            session_json(json!({
                "active_signin": {"id": "si_1"},
                "signup_attempts": [{"id": "sua_1", "completed": true}]
            })),
        );
        let mut attempt = SignupAttempt::new("sua_1");
        attempt.missing_fields = vec![ProfileField::Username];
        let completion = ProfileCompletion::new(
            ApiClient::new(transport.clone()),
            Arc::new(username_enabled()),
            PendingAttempt::Signup(attempt),
        );
        assert_eq!(completion.title().await, "Complete your account setup");

        // When starting, the username is asked for
        assert_eq!(
            completion.start().await.unwrap(),
            CompletionEvent::FieldsRequired(vec![ProfileField::Username])
        );

        // And an empty username is rejected without a request
        let rejected = completion.complete(&ProfileData::new()).await;
        assert_eq!(
            rejected.unwrap_err(),
            ApiError::Validation(ValidationError::MissingField(ProfileField::Username))
        );
        assert!(transport.requests().is_empty());

        // When the username is supplied, the email step is prepared
        let event = completion
            .complete(&ProfileData::new().with(ProfileField::Username, "ada"))
            .await
            .unwrap();
        assert_eq!(
            event,
            CompletionEvent::VerificationRequired {
                identifier_type: IdentifierType::Email,
                prepared: Some(VerificationStrategy::EmailOtp)
            }
        );
        let complete = transport.requests().into_iter().next().unwrap();
        assert_eq!(complete.query_value("attempt_id"), Some("sua_1"));
        assert_eq!(
            complete.body,
            RequestBody::Multipart(vec![("username".to_string(), "ada".to_string())])
        );

        // Then the code finishes the attempt
        assert!(completion.complete_verification("").await.is_err());
        let done = completion.complete_verification("123456").await.unwrap();
        assert!(matches!(done, CompletionEvent::Completed(ref s) if s.is_signed_in()));
    }

    #[tokio::test]
    async fn test_verification_prepared_once_across_restarts() {
        let transport = MockTransport::new();
        transport.respond_data("POST", endpoints::PREPARE_VERIFICATION, json!({}));
        let attempt = SigninAttempt::new("att_1").with_step(SigninStep::VerifyPhoneOtp);
        let completion = ProfileCompletion::new(
            ApiClient::new(transport.clone()),
            Arc::new(test_config()),
            PendingAttempt::Signin(attempt),
        );

        let first = completion.start().await.unwrap();
        let second = completion.start().await.unwrap();

        assert_eq!(
            first,
            CompletionEvent::VerificationRequired {
                identifier_type: IdentifierType::Phone,
                prepared: Some(VerificationStrategy::PhoneOtp)
            }
        );
        assert_eq!(
            second,
            CompletionEvent::VerificationRequired {
                identifier_type: IdentifierType::Phone,
                prepared: None
            }
        );
        assert_eq!(transport.calls_to(endpoints::PREPARE_VERIFICATION), 1);
        assert_eq!(completion.title().await, "Complete your profile");
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_prepare_respects_cooldown() {
        let transport = MockTransport::new();
        transport.respond_data("POST", endpoints::PREPARE_VERIFICATION, json!({}));
        let attempt = SigninAttempt::new("att_1").with_step(SigninStep::VerifyEmailOtp);
        let completion = ProfileCompletion::new(
            ApiClient::new(transport.clone()),
            Arc::new(test_config()),
            PendingAttempt::Signin(attempt),
        );
        completion.start().await.unwrap();

        let early = completion
            .prepare_verification(VerificationStrategy::EmailOtp)
            .await
            .unwrap();
        assert!(!early);

        tokio::time::sleep(Duration::from_millis(60_500)).await;
        let later = completion
            .prepare_verification(VerificationStrategy::EmailOtp)
            .await
            .unwrap();
        assert!(later);
        assert_eq!(transport.calls_to(endpoints::PREPARE_VERIFICATION), 2);
        assert_eq!(completion.resend_remaining().await, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_after_unmount_is_ignored() {
        // Given a slow completion request
        let transport = MockTransport::new();
        transport.respond_data_delayed(
            "POST",
            endpoints::OAUTH2_COMPLETE,
            Duration::from_millis(500),
            session_json(json!({
                "signup_attempts": [{"id": "sua_1", "current_step": "verify_email"}]
            })),
        );
        let mut attempt = SignupAttempt::new("sua_1");
        attempt.missing_fields = vec![ProfileField::Username];
        let completion = ProfileCompletion::new(
            ApiClient::new(transport.clone()),
            Arc::new(username_enabled()),
            PendingAttempt::Signup(attempt),
        );
        let pending = tokio::spawn({
            let completion = completion.clone();
            async move {
                completion
                    .complete(&ProfileData::new().with(ProfileField::Username, "ada"))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // When the page goes away before it resolves
        completion.unmount().await;
        let event = pending.await.unwrap().unwrap();

        // Then the late response is dropped and no code is dispatched
        assert_eq!(event, CompletionEvent::Ignored);
        assert_eq!(transport.calls_to(endpoints::PREPARE_VERIFICATION), 0);
        assert_eq!(
            completion.fields_to_collect().await,
            vec![ProfileField::Username]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_stops_countdown() {
        let transport = MockTransport::new();
        transport.respond_data("POST", endpoints::PREPARE_VERIFICATION, json!({}));
        let attempt = SigninAttempt::new("att_1").with_step(SigninStep::VerifyEmailOtp);
        let completion = ProfileCompletion::new(
            ApiClient::new(transport.clone()),
            Arc::new(test_config()),
            PendingAttempt::Signin(attempt),
        );
        completion.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5_500)).await;

        completion.unmount().await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(completion.resend_remaining().await, 55);
    }

    #[tokio::test]
    async fn test_disabled_missing_fields_are_skipped() {
        let mut attempt = SignupAttempt::new("sua_1");
        attempt.missing_fields = vec![ProfileField::Username];
        let completion = ProfileCompletion::new(
            ApiClient::new(MockTransport::new()),
            Arc::new(test_config()),
            PendingAttempt::Signup(attempt),
        );

        assert!(completion.fields_to_collect().await.is_empty());
        assert_eq!(completion.start().await.unwrap(), CompletionEvent::Pending);
    }
}
