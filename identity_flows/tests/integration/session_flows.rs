/// Session cache, memberships and dev session token against the mock backend
use std::sync::Arc;

use crate::common::{MockBackend, VALID_PASSWORD, backend_config, client_for};
use identity_flows::{
    DEV_SESSION_COOKIE_NAME, DEV_SESSION_STORAGE_KEY, Derived, DevTokenReconciler,
    IdentityClient, KeyValueStore, MemoryStore, ReqwestTransport, SigninStrategy,
};

async fn signed_in_client(backend: &MockBackend) -> IdentityClient {
    let client = client_for(backend);
    client
        .signin_flow()
        .submit(SigninStrategy::EmailPassword {
            email: "ada@example.test".to_string(),
            password: VALID_PASSWORD.to_string(),
        })
        .await
        .unwrap();
    client
}

#[tokio::test]
async fn test_switch_organization_then_sign_out() {
    // Given a signed-in client with loaded memberships
    let backend = MockBackend::start().await;
    let client = signed_in_client(&backend).await;
    client.memberships().refresh().await;
    assert_eq!(
        client.session().active_organization(client.memberships()),
        Derived::NotFound
    );

    // When switching organization
    client.session().switch_organization("org_2").await.unwrap();

    // Then the derived active organization follows the refetched session
    let active = client
        .session()
        .active_organization(client.memberships())
        .found()
        .unwrap();
    assert_eq!(active.organization.name, "Globex");

    // When signing out
    client.session().sign_out(None).await.unwrap();

    // Then the cache reflects the signed-out server state
    let snapshot = client.session().read();
    assert!(!snapshot.loading);
    assert!(!snapshot.session.unwrap().is_signed_in());
    assert_eq!(backend.hits("sign-out"), 1);
}

#[tokio::test]
async fn test_failed_switch_still_refetches() {
    let backend = MockBackend::start().await;
    let client = signed_in_client(&backend).await;
    let before = backend.hits("session");

    let result = client.session().switch_organization("org_404").await;

    assert!(result.unwrap_err().has_code("OrganizationNotFound"));
    assert_eq!(backend.hits("session"), before + 1);
    assert!(client.session().read().session.unwrap().is_signed_in());
}

#[tokio::test]
async fn test_concurrent_revalidations_share_one_request() {
    let backend = MockBackend::start().await;
    let client = client_for(&backend);

    let (a, b, c) = tokio::join!(
        client.session().revalidate(),
        client.session().revalidate(),
        client.session().revalidate()
    );

    assert_eq!(backend.hits("session"), 1);
    assert_eq!(a.session, b.session);
    assert_eq!(b.session, c.session);
}

#[tokio::test]
async fn test_dev_session_token_is_reconciled_and_sent() {
    // Given a development deployment whose cookie was just issued by the server
    let backend = MockBackend::start().await;
    let cookies = Arc::new(MemoryStore::new());
    cookies.set(&DEV_SESSION_COOKIE_NAME, "dev_tok").unwrap();
    let storage = Arc::new(MemoryStore::new());
    let reconciler = DevTokenReconciler::new(cookies, storage.clone());

    let mut config = backend_config(&backend);
    config.development_mode = true;
    let transport = ReqwestTransport::new(&backend.base_url).unwrap();
    let client = IdentityClient::with_dev_session(config, Arc::new(transport), reconciler);

    // When the client initializes
    client.ensure_initialized().await.unwrap();

    // Then the token was mirrored into storage and attached to the session fetch
    assert_eq!(
        storage.get(&DEV_SESSION_STORAGE_KEY).unwrap().as_deref(),
        Some("dev_tok")
    );
    assert_eq!(
        backend.state(|s| s.dev_tokens.clone()),
        vec!["dev_tok".to_string()]
    );
}
