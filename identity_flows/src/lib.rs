//! identity-flows - Client-side authentication orchestration for a hosted identity backend
//!
//! This crate drives the multi-step flows a front end needs on top of the identity
//! API: sign-in and sign-up attempts with one-time-code or magic-link verification,
//! the OAuth/SSO callback exchange, profile completion, a single shared session
//! cache, and reconciliation of the development session token between a cookie and
//! persistent client storage.
//!
//! Networking goes through the [`HttpTransport`] trait so the same state machines
//! run against [`ReqwestTransport`] in production and scripted transports in tests.

mod api;
mod client;
mod config;
mod coordination;
mod oauth2;
mod session;
mod signin;
mod signup;
mod storage;
mod utils;
mod verification;

#[cfg(test)]
mod test_utils;

pub use api::{
    ApiClient, ApiError, ApiRequest, ApiResponse, ApiResult, HttpTransport, ReqwestTransport,
    RequestBody, ServerError, TransportError, ValidationError,
};

pub use client::IdentityClient;

pub use config::{ConfigError, DeploymentConfig, FieldSetting, ProfileField};

pub use coordination::{
    AttemptKind, CompletableAttempt, CompletionEvent, CoordinationError, PendingAttempt,
    ProfileCompletion,
};

pub use oauth2::{CallbackParams, CallbackStatus, OAuth2Error, OAuthCallbackHandler, init_oauth};

pub use session::{
    Derived, MembershipCache, MembershipSnapshot, Organization, OrganizationMembership,
    RefreshHandle, Session, SessionCache, SessionCacheOptions, SessionSnapshot, Signin, User,
    Workspace, WorkspaceMembership,
};

pub use signin::{
    AuthMethod, SigninAttempt, SigninEvent, SigninFlow, SigninState, SigninStep, SigninStrategy,
    StrategyKind, SubmitError,
};

pub use signup::{
    ProfileData, SignupAttempt, SignupEvent, SignupFlow, SignupResponse, SignupState, SignupStep,
    validate_missing_fields, validate_required_fields,
};

pub use storage::{
    DEV_SESSION_COOKIE_NAME, DEV_SESSION_STORAGE_KEY, DevSessionToken, DevTokenReconciler,
    KeyValueStore, MemoryStore, StorageError, reconcile_tokens,
};

pub use utils::UtilError;

pub use verification::{
    IdentifierType, RESEND_COOLDOWN_SECS, ResendCountdown, VerificationLatch,
    VerificationStrategy,
};
