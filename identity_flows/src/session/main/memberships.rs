use std::sync::Arc;

use tokio::sync::watch;

use crate::api::{ApiClient, ApiRequest, ApiResult, endpoints};
use crate::session::types::{
    Derived, MembershipSnapshot, OrganizationMembership, SessionSnapshot, WorkspaceMembership,
};

/// Organization and workspace memberships of the active user.
#[derive(Clone)]
pub struct MembershipCache {
    client: ApiClient,
    snapshot: Arc<watch::Sender<MembershipSnapshot>>,
}

impl MembershipCache {
    pub fn new(client: ApiClient) -> Self {
        let (snapshot, _) = watch::channel(MembershipSnapshot::default());
        Self {
            client,
            snapshot: Arc::new(snapshot),
        }
    }

    pub fn read(&self) -> MembershipSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MembershipSnapshot> {
        self.snapshot.subscribe()
    }

    /// Loads both membership lists concurrently.
    ///
    /// A list that fails to load keeps its previous contents and the first
    /// failure is reported in `error`.
    pub async fn refresh(&self) -> MembershipSnapshot {
        self.snapshot.send_modify(|snapshot| snapshot.loading = true);

        let (organizations, workspaces): (
            ApiResult<Vec<OrganizationMembership>>,
            ApiResult<Vec<WorkspaceMembership>>,
        ) = tokio::join!(
            self.client
                .send(ApiRequest::get(endpoints::ORGANIZATION_MEMBERSHIPS)),
            self.client
                .send(ApiRequest::get(endpoints::WORKSPACE_MEMBERSHIPS)),
        );

        self.snapshot.send_modify(|snapshot| {
            snapshot.loading = false;
            snapshot.error = None;
            match organizations {
                Ok(list) => snapshot.organizations = list,
                Err(e) => {
                    tracing::warn!("Failed to load organization memberships: {}", e);
                    snapshot.error = Some(e);
                }
            }
            match workspaces {
                Ok(list) => snapshot.workspaces = list,
                Err(e) => {
                    tracing::warn!("Failed to load workspace memberships: {}", e);
                    snapshot.error.get_or_insert(e);
                }
            }
        });

        self.read()
    }

    /// Marks the memberships loaded and empty, as for a signed-out session.
    pub fn clear(&self) {
        self.snapshot.send_if_modified(|snapshot| {
            let cleared = MembershipSnapshot {
                loading: false,
                ..MembershipSnapshot::default()
            };
            if *snapshot == cleared {
                return false;
            }
            *snapshot = cleared;
            true
        });
    }
}

pub(super) fn active_organization_in(
    session: &SessionSnapshot,
    memberships: &MembershipSnapshot,
) -> Derived<OrganizationMembership> {
    if session.loading || memberships.loading {
        return Derived::Loading;
    }
    let id = session
        .session
        .as_ref()
        .and_then(|s| s.active_signin.as_ref())
        .and_then(|signin| signin.active_organization_membership_id.as_deref());
    match id.and_then(|id| memberships.organizations.iter().find(|m| m.id == id)) {
        Some(membership) => Derived::Found(membership.clone()),
        None => Derived::NotFound,
    }
}

pub(super) fn active_workspace_in(
    session: &SessionSnapshot,
    memberships: &MembershipSnapshot,
) -> Derived<WorkspaceMembership> {
    if session.loading || memberships.loading {
        return Derived::Loading;
    }
    let id = session
        .session
        .as_ref()
        .and_then(|s| s.active_signin.as_ref())
        .and_then(|signin| signin.active_workspace_membership_id.as_deref());
    match id.and_then(|id| memberships.workspaces.iter().find(|m| m.id == id)) {
        Some(membership) => Derived::Found(membership.clone()),
        None => Derived::NotFound,
    }
}
