/// Sign-in flows against the mock backend
///
/// Covers password sign-in, rejected credentials, and the email one-time-code
/// path including the single automatic prepare-verification.
use crate::common::{MockBackend, VALID_CODE, VALID_PASSWORD, client_for};
use identity_flows::{
    SigninEvent, SigninState, SigninStep, SigninStrategy, SubmitError, VerificationStrategy,
};

fn password(password: &str) -> SigninStrategy {
    SigninStrategy::EmailPassword {
        email: "ada@example.test".to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_password_signin_completes_and_updates_session() {
    // Given a signed-out client
    let backend = MockBackend::start().await;
    let client = client_for(&backend);
    let snapshot = client.ensure_initialized().await.unwrap();
    assert!(!snapshot.session.unwrap().is_signed_in());

    // When signing in with the right password
    let flow = client.signin_flow();
    let event = flow.submit(password(VALID_PASSWORD)).await.unwrap();

    // Then the flow completes and the shared cache already holds the new session
    assert!(matches!(event, SigninEvent::Completed(_)));
    assert_eq!(flow.state().await, SigninState::Completed);
    let session = client.session().read().session.unwrap();
    assert!(session.is_signed_in());
    assert_eq!(backend.hits("session"), 2);
}

#[tokio::test]
async fn test_wrong_password_surfaces_submit_error() {
    let backend = MockBackend::start().await;
    let client = client_for(&backend);
    let flow = client.signin_flow();

    let result = flow.submit(password("wrong")).await;

    let error = result.unwrap_err();
    assert!(error.has_code("InvalidCredentials"));
    assert!(matches!(
        flow.submit_error().await,
        Some(SubmitError::InvalidCredentials(_))
    ));
    assert!(!flow.is_in_flight().await);
    assert!(!backend.state(|s| s.signed_in));
}

#[tokio::test]
async fn test_email_otp_prepares_once_and_verifies() {
    // Given an email code sign-in
    let backend = MockBackend::start().await;
    let client = client_for(&backend);
    let flow = client.signin_flow();

    // When submitting the email address
    let event = flow
        .submit(SigninStrategy::EmailOtp {
            email: "ada@example.test".to_string(),
        })
        .await
        .unwrap();

    // Then the code is sent exactly once and the flow waits for it
    assert_eq!(
        event,
        SigninEvent::VerificationRequired {
            step: SigninStep::VerifyEmailOtp,
            prepared: Some(VerificationStrategy::EmailOtp),
        }
    );
    assert_eq!(
        backend.state(|s| s.prepared.clone()),
        vec![("att_otp".to_string(), "email_otp".to_string())]
    );

    // And an immediate resend is refused by the cooldown without a request
    assert!(!flow.resend().await.unwrap());
    assert_eq!(backend.hits("prepare-verification"), 1);

    // When a wrong code is entered the flow stays on the step
    let wrong = flow.submit_verification("000000").await.unwrap_err();
    assert!(wrong.has_code("InvalidVerificationCode"));
    assert_eq!(
        flow.state().await,
        SigninState::VerificationPending(SigninStep::VerifyEmailOtp)
    );

    // And the right code completes the sign-in
    let event = flow.submit_verification(VALID_CODE).await.unwrap();
    assert!(matches!(event, SigninEvent::Completed(_)));
    assert!(client.session().read().session.unwrap().is_signed_in());
    assert_eq!(backend.hits("prepare-verification"), 1);
}

#[tokio::test]
async fn test_oauth_strategy_redirects_to_provider() {
    let backend = MockBackend::start().await;
    let client = client_for(&backend);
    let flow = client.signin_flow();

    let event = flow
        .submit(SigninStrategy::OAuth {
            provider: "github".to_string(),
            redirect_uri: "https://app.example.test/sso-callback".to_string(),
        })
        .await
        .unwrap();

    let SigninEvent::Redirect(url) = event else {
        panic!("expected a provider redirect, got {event:?}");
    };
    assert_eq!(url.host_str(), Some("github.provider.test"));
    assert_eq!(backend.hits("signin"), 0);
}
