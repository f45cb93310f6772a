/// OAuth callback and profile completion against the mock backend
///
/// The backend answers the code exchange with a sign-up attempt that still lacks a
/// username, so the callback hands over to profile completion.
use crate::common::{MockBackend, client_for};
use identity_flows::{
    AttemptKind, CallbackStatus, CompletionEvent, OAuth2Error, PendingAttempt, ProfileData,
    ProfileField,
};
use url::Url;

fn callback(query: &str) -> Url {
    Url::parse(&format!("https://app.example.test/sso-callback{query}")).unwrap()
}

#[tokio::test]
async fn test_callback_exchanges_once_then_completes_profile() {
    // Given a provider redirect back to the callback page
    let backend = MockBackend::start().await;
    let client = client_for(&backend);
    let url = callback("?code=abc&state=st_1");

    // When the page handles the callback twice
    let handler = client.oauth_callback();
    let first = handler.handle(&url).await;
    let second = handler.handle(&url).await;

    // Then the code was exchanged once and completion is requested
    assert_eq!(first, second);
    assert_eq!(backend.state(|s| s.code_exchanges), 1);
    let CallbackStatus::Completion(attempt) = first else {
        panic!("expected profile completion, got {first:?}");
    };
    assert!(matches!(attempt, PendingAttempt::Signup(ref a) if a.id == "sua_1"));
    assert_eq!(handler.redirect_target(true).await, None);

    // When the completion asks for the username and receives it
    let completion = client.profile_completion(attempt);
    assert_eq!(completion.kind().await, AttemptKind::Signup);
    let event = completion.start().await.unwrap();
    assert_eq!(
        event,
        CompletionEvent::FieldsRequired(vec![ProfileField::Username])
    );
    let event = completion
        .complete(&ProfileData::new().with(ProfileField::Username, "ada"))
        .await
        .unwrap();

    // Then the backend got exactly that field and the session is signed in
    assert!(matches!(event, CompletionEvent::Completed(_)));
    let fields = backend.state(|s| s.completed_fields.clone());
    assert_eq!(fields.get("username").map(String::as_str), Some("ada"));
    assert_eq!(fields.len(), 1);
    assert!(client.session().read().session.unwrap().is_signed_in());
}

#[tokio::test]
async fn test_missing_username_is_rejected_locally() {
    let backend = MockBackend::start().await;
    let client = client_for(&backend);
    let handler = client.oauth_callback();
    let CallbackStatus::Completion(attempt) =
        handler.handle(&callback("?code=abc&state=st_1")).await
    else {
        panic!("expected profile completion");
    };
    let completion = client.profile_completion(attempt);

    let result = completion.complete(&ProfileData::new()).await;

    assert!(result.unwrap_err().is_validation());
    assert_eq!(backend.hits("oauth2-complete"), 0);
}

#[tokio::test]
async fn test_provider_error_never_reaches_backend() {
    let backend = MockBackend::start().await;
    let client = client_for(&backend);

    let status = client
        .oauth_callback()
        .handle(&callback("?error=access_denied"))
        .await;

    assert!(matches!(
        status,
        CallbackStatus::Error(OAuth2Error::Provider { ref error, .. }) if error == "access_denied"
    ));
    assert_eq!(backend.hits("oauth2-callback"), 0);
}

#[tokio::test]
async fn test_state_mismatch_is_exchange_error() {
    let backend = MockBackend::start().await;
    let client = client_for(&backend);

    let status = client
        .oauth_callback()
        .handle(&callback("?code=abc&state=forged"))
        .await;

    assert!(matches!(
        status,
        CallbackStatus::Error(OAuth2Error::Exchange(ref e)) if e.has_code("OAuthStateMismatch")
    ));
}

#[tokio::test]
async fn test_init_rejects_disabled_provider_without_request() {
    let backend = MockBackend::start().await;
    let client = client_for(&backend);

    let result = client
        .init_oauth("gitlab", "https://app.example.test/sso-callback")
        .await;

    assert!(result.unwrap_err().is_validation());
    assert_eq!(backend.hits("oauth2-init"), 0);

    let url = client
        .init_oauth("github", "https://app.example.test/sso-callback")
        .await
        .unwrap();
    assert_eq!(url.query(), Some("state=st_1"));
}
