//! OAuth/SSO: starting a provider sign-in and handling the callback

mod errors;
mod main;
mod types;

pub use errors::OAuth2Error;
pub use main::{OAuthCallbackHandler, init_oauth};
pub use types::{CallbackParams, CallbackStatus};
