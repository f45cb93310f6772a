mod config;
mod main;
mod types;

pub use config::{SESSION_DEDUPE_WINDOW, SESSION_REFRESH_INTERVAL, SessionCacheOptions};
pub use main::{MembershipCache, RefreshHandle, SessionCache};
pub use types::{
    Derived, MembershipSnapshot, Organization, OrganizationMembership, Session, SessionSnapshot,
    Signin, User, Workspace, WorkspaceMembership,
};
