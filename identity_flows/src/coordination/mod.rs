//! Coordination between the flows
//!
//! - `types`: the attempt shape shared by sign-in and sign-up
//! - `main`: profile completion for either attempt kind
//! - `errors`: errors raised while wiring the flows together

mod errors;
mod main;
mod types;

pub use errors::CoordinationError;
pub use main::ProfileCompletion;
pub use types::{AttemptKind, CompletableAttempt, CompletionEvent, PendingAttempt};
