//! Sign-in attempt state machine
//!
//! A sign-in goes `Idle -> Submitted -> VerificationPending(step) -> Completed`, and
//! can be discarded at any point before completion. Every strategy funnels into the
//! same transition handler, `SigninFlow::on_attempt_received`.

mod errors;
mod main;
mod types;

pub use errors::SubmitError;
pub use main::SigninFlow;
pub use types::{
    AuthMethod, SigninAttempt, SigninEvent, SigninState, SigninStep, SigninStrategy,
    StrategyKind,
};
