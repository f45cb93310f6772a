//! Sign-up attempt state machine
//!
//! Same skeleton as sign-in, plus the field rules: a field blocks submission only
//! when the backend reports it missing and the deployment enables it.

mod main;
mod types;

pub use main::{SignupFlow, validate_missing_fields, validate_required_fields};
pub use types::{
    ProfileData, SignupAttempt, SignupEvent, SignupResponse, SignupState, SignupStep,
};

pub(crate) use main::{collectable_fields, submit_missing_fields};
