//! Verification building blocks shared by the sign-in, sign-up and completion flows
//!
//! - `types`: verification strategies and identifier types
//! - `latch`: at-most-once guard for automatic verification dispatch
//! - `countdown`: resend cooldown and its ticker
//! - `dispatch`: the prepare/attempt verification requests

mod countdown;
mod dispatch;
mod latch;
mod types;

pub use countdown::{RESEND_COOLDOWN_SECS, ResendCountdown};
pub use latch::VerificationLatch;
pub use types::{IdentifierType, VerificationStrategy};

pub(crate) use countdown::ResendTimer;
pub(crate) use dispatch::{attempt_verification, prepare_verification};

use crate::api::ValidationError;

/// Normalizes an entered one-time code; blank input never reaches the network.
pub(crate) fn validate_code(code: &str) -> Result<String, ValidationError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ValidationError::EmptyVerificationCode);
    }
    Ok(code.to_string())
}
