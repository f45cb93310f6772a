use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::{ApiClient, ApiRequest, ApiResult, endpoints};
use crate::session::config::{DEFAULT_REFRESH_INTERVAL, SessionCacheOptions};
use crate::session::types::{
    Derived, OrganizationMembership, Session, SessionSnapshot, WorkspaceMembership,
};

use super::memberships::{MembershipCache, active_organization_in, active_workspace_in};

/// The single source of truth for the current session.
///
/// Cloning is cheap; all clones share one snapshot, so every observer sees the same
/// session. The session is only written here, always as the whole record the server
/// returned.
#[derive(Clone)]
pub struct SessionCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    client: ApiClient,
    options: SessionCacheOptions,
    snapshot: watch::Sender<SessionSnapshot>,
    book: Mutex<FetchBook>,
    dedupe: Mutex<()>,
    memberships: Option<MembershipCache>,
}

/// Sequence bookkeeping that keeps applied sessions monotonic.
#[derive(Debug, Default)]
struct FetchBook {
    issued: u64,
    applied: u64,
    in_flight: usize,
    last_success: Option<Instant>,
}

impl SessionCache {
    pub fn new(client: ApiClient) -> Self {
        Self::with_options(client, SessionCacheOptions::default())
    }

    pub fn with_options(client: ApiClient, options: SessionCacheOptions) -> Self {
        Self::build(client, options, None)
    }

    /// A cache that keeps `memberships` in step with the active sign-in.
    ///
    /// Memberships reload whenever an applied session has a different active
    /// sign-in than the one before, and are emptied when nobody is signed in.
    pub fn with_memberships(
        client: ApiClient,
        options: SessionCacheOptions,
        memberships: MembershipCache,
    ) -> Self {
        Self::build(client, options, Some(memberships))
    }

    fn build(
        client: ApiClient,
        options: SessionCacheOptions,
        memberships: Option<MembershipCache>,
    ) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(CacheInner {
                client,
                options,
                snapshot,
                book: Mutex::new(FetchBook::default()),
                dedupe: Mutex::new(()),
                memberships,
            }),
        }
    }

    pub fn options(&self) -> SessionCacheOptions {
        self.inner.options
    }

    pub fn read(&self) -> SessionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Observers are notified whenever the snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Fetches the session unless a fetch succeeded within the dedupe window.
    ///
    /// Concurrent callers queue behind the first one and reuse its result.
    pub async fn revalidate(&self) -> SessionSnapshot {
        let _guard = self.inner.dedupe.lock().await;
        if self.is_fresh().await {
            tracing::debug!("Session fetched within dedupe window, reusing it");
            return self.read();
        }
        self.fetch().await
    }

    /// Fetches the session unconditionally.
    pub async fn refetch(&self) -> SessionSnapshot {
        self.fetch().await
    }

    /// Runs a mutating server operation, then refetches before returning.
    ///
    /// When this resolves, every observer already sees the post-operation session.
    /// The refetch happens even if the operation failed, since the server may have
    /// applied part of it.
    pub async fn mutate_after<T, F, Fut>(&self, operation: F) -> ApiResult<T>
    where
        F: FnOnce(ApiClient) -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let outcome = operation(self.inner.client.clone()).await;
        if let Err(e) = &outcome {
            tracing::warn!("Session mutation failed: {}", e);
        }
        self.refetch().await;
        outcome
    }

    pub async fn switch_signin(&self, signin_id: &str) -> ApiResult<()> {
        let request =
            ApiRequest::post(endpoints::SESSION_SWITCH_SIGNIN).query("sign_in_id", signin_id);
        self.send_mutation(request).await
    }

    /// Signs out one sign-in, or every sign-in of the session when `signin_id` is `None`.
    pub async fn sign_out(&self, signin_id: Option<&str>) -> ApiResult<()> {
        let mut request = ApiRequest::post(endpoints::SESSION_SIGN_OUT);
        if let Some(id) = signin_id {
            request = request.query("sign_in_id", id);
        }
        self.send_mutation(request).await
    }

    pub async fn switch_organization(&self, organization_id: &str) -> ApiResult<()> {
        let request = ApiRequest::put(endpoints::SESSION_SWITCH_ORGANIZATION)
            .query("organization_id", organization_id);
        self.send_mutation(request).await
    }

    pub async fn switch_workspace(&self, workspace_id: &str) -> ApiResult<()> {
        let request = ApiRequest::put(endpoints::SESSION_SWITCH_WORKSPACE)
            .query("workspace_id", workspace_id);
        self.send_mutation(request).await
    }

    /// Window refocus hook; ignored unless enabled in the options.
    pub async fn on_focus(&self) {
        if self.inner.options.revalidate_on_focus {
            self.revalidate().await;
        }
    }

    /// Network reconnect hook; ignored unless enabled in the options.
    pub async fn on_reconnect(&self) {
        if self.inner.options.revalidate_on_reconnect {
            self.revalidate().await;
        }
    }

    /// Starts the periodic background refresh. Dropping the handle stops it.
    ///
    /// A zero interval is replaced by the 30s default.
    pub fn spawn_background_refresh(&self) -> RefreshHandle {
        let cache = self.clone();
        let mut period = self.inner.options.refresh_interval;
        if period.is_zero() {
            tracing::warn!(
                "Zero session refresh interval, refreshing every {}s instead",
                DEFAULT_REFRESH_INTERVAL.as_secs()
            );
            period = DEFAULT_REFRESH_INTERVAL;
        }
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Skip the immediate first tick; the initial load belongs to bootstrap.
            interval.tick().await;
            loop {
                interval.tick().await;
                tracing::debug!("Background session refresh");
                cache.revalidate().await;
            }
        });
        RefreshHandle { task: Some(task) }
    }

    pub fn active_organization(
        &self,
        memberships: &MembershipCache,
    ) -> Derived<OrganizationMembership> {
        active_organization_in(&self.read(), &memberships.read())
    }

    pub fn active_workspace(&self, memberships: &MembershipCache) -> Derived<WorkspaceMembership> {
        active_workspace_in(&self.read(), &memberships.read())
    }

    async fn send_mutation(&self, request: ApiRequest) -> ApiResult<()> {
        self.mutate_after(|client| async move {
            let _: Value = client.send(request).await?;
            Ok(())
        })
        .await
    }

    async fn is_fresh(&self) -> bool {
        let book = self.inner.book.lock().await;
        book.last_success
            .is_some_and(|at| at.elapsed() < self.inner.options.dedupe_window)
    }

    async fn fetch(&self) -> SessionSnapshot {
        let seq = {
            let mut book = self.inner.book.lock().await;
            book.issued += 1;
            book.in_flight += 1;
            book.issued
        };
        self.inner.snapshot.send_modify(|snapshot| snapshot.loading = true);

        let result: ApiResult<Session> = self
            .inner
            .client
            .send(ApiRequest::get(endpoints::SESSION))
            .await;

        let mut book = self.inner.book.lock().await;
        book.in_flight -= 1;
        let loading = book.in_flight > 0;
        let fresh = seq > book.applied;
        if fresh {
            book.applied = seq;
            if result.is_ok() {
                book.last_success = Some(Instant::now());
            }
        } else {
            tracing::debug!(
                "Dropping session response {} superseded by {}",
                seq,
                book.applied
            );
        }

        let mut signin_change = None;
        self.inner.snapshot.send_modify(|snapshot| {
            snapshot.loading = loading;
            if !fresh {
                return;
            }
            match result {
                Ok(session) => {
                    let before = snapshot.session.as_ref().and_then(active_signin_id);
                    let after = active_signin_id(&session);
                    if before != after || snapshot.session.is_none() {
                        signin_change = Some(after);
                    }
                    snapshot.session = Some(session);
                    snapshot.error = None;
                }
                Err(e) => {
                    tracing::warn!("Session fetch failed, serving last known session: {}", e);
                    snapshot.error = Some(e);
                }
            }
        });
        drop(book);

        if let (Some(memberships), Some(after)) = (&self.inner.memberships, signin_change) {
            match after {
                Some(signin_id) => {
                    tracing::debug!("Active sign-in is now {}, reloading memberships", signin_id);
                    memberships.refresh().await;
                }
                None => memberships.clear(),
            }
        }

        self.read()
    }
}

fn active_signin_id(session: &Session) -> Option<String> {
    session.active_signin.as_ref().map(|signin| signin.id.clone())
}

/// Handle of the background refresh task.
#[derive(Debug)]
pub struct RefreshHandle {
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn stop(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.abort();
    }
}
