use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::signin::SigninAttempt;
use crate::signup::SignupAttempt;

/// The backend's view of who is signed in on this client.
///
/// Only ever replaced wholesale with what the server returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub active_signin: Option<Signin>,
    #[serde(default)]
    pub signins: Vec<Signin>,
    #[serde(default)]
    pub signin_attempts: Option<Vec<SigninAttempt>>,
    #[serde(default)]
    pub signup_attempts: Option<Vec<SignupAttempt>>,
}

impl Session {
    /// The newest sign-in attempt; later entries supersede earlier ones.
    pub fn latest_signin_attempt(&self) -> Option<&SigninAttempt> {
        self.signin_attempts.as_ref()?.last()
    }

    pub fn latest_signup_attempt(&self) -> Option<&SignupAttempt> {
        self.signup_attempts.as_ref()?.last()
    }

    pub fn is_signed_in(&self) -> bool {
        self.active_signin.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signin {
    pub id: String,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub active_organization_membership_id: Option<String>,
    #[serde(default)]
    pub active_workspace_membership_id: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub primary_email_address: Option<String>,
    #[serde(default)]
    pub primary_phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationMembership {
    pub id: String,
    pub organization: Organization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceMembership {
    pub id: String,
    pub workspace: Workspace,
    #[serde(default)]
    pub organization: Option<Organization>,
}

/// What observers of the session cache see.
///
/// `loading` and `error` are independent: a refresh can be in flight while the last
/// failure is still reported and the last good session is still served.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub loading: bool,
    pub session: Option<Session>,
    pub error: Option<ApiError>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            loading: true,
            session: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MembershipSnapshot {
    pub loading: bool,
    pub organizations: Vec<OrganizationMembership>,
    pub workspaces: Vec<WorkspaceMembership>,
    pub error: Option<ApiError>,
}

impl Default for MembershipSnapshot {
    fn default() -> Self {
        Self {
            loading: true,
            organizations: Vec::new(),
            workspaces: Vec::new(),
            error: None,
        }
    }
}

/// A value computed from cached state; `Loading` is never collapsed into `NotFound`.
#[derive(Debug, Clone, PartialEq)]
pub enum Derived<T> {
    Loading,
    Found(T),
    NotFound,
}

impl<T> Derived<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            _ => None,
        }
    }
}
