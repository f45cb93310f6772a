use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ProfileField;
use crate::session::Session;
use crate::verification::{IdentifierType, VerificationStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    #[default]
    Plain,
    Sso,
    Passkey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigninStep {
    VerifyPassword,
    VerifyEmail,
    VerifyEmailOtp,
    VerifyPhone,
    VerifyPhoneOtp,
    VerifyAuthenticator,
    AddSecondFactor,
}

impl SigninStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VerifyPassword => "verify_password",
            Self::VerifyEmail => "verify_email",
            Self::VerifyEmailOtp => "verify_email_otp",
            Self::VerifyPhone => "verify_phone",
            Self::VerifyPhoneOtp => "verify_phone_otp",
            Self::VerifyAuthenticator => "verify_authenticator",
            Self::AddSecondFactor => "add_second_factor",
        }
    }

    /// Strategy to prepare automatically when this step is reached.
    ///
    /// Email steps deliver a magic link instead of a code when the attempt was
    /// started with the magic-link strategy.
    pub fn verification_strategy(&self, magic_link: bool) -> Option<VerificationStrategy> {
        match self {
            Self::VerifyEmail | Self::VerifyEmailOtp if magic_link => {
                Some(VerificationStrategy::EmailMagicLink)
            }
            Self::VerifyEmail | Self::VerifyEmailOtp => Some(VerificationStrategy::EmailOtp),
            Self::VerifyPhone | Self::VerifyPhoneOtp => Some(VerificationStrategy::PhoneOtp),
            Self::VerifyPassword | Self::VerifyAuthenticator | Self::AddSecondFactor => None,
        }
    }

    /// Identifier a submitted code is checked against, if the step takes a code.
    pub fn identifier_type(&self) -> Option<IdentifierType> {
        match self {
            Self::VerifyEmail | Self::VerifyEmailOtp => Some(IdentifierType::Email),
            Self::VerifyPhone | Self::VerifyPhoneOtp => Some(IdentifierType::Phone),
            Self::VerifyAuthenticator => Some(IdentifierType::Authenticator),
            Self::VerifyPassword | Self::AddSecondFactor => None,
        }
    }
}

impl fmt::Display for SigninStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-tracked sign-in process, adopted wholesale from the session payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigninAttempt {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub method: AuthMethod,
    #[serde(default)]
    pub sso_provider: Option<String>,
    #[serde(default)]
    pub current_step: Option<SigninStep>,
    #[serde(default)]
    pub first_method_authenticated: bool,
    #[serde(default)]
    pub second_method_authenticated: bool,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub missing_fields: Vec<ProfileField>,
}

impl SigninAttempt {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            method: AuthMethod::Plain,
            sso_provider: None,
            current_step: None,
            first_method_authenticated: false,
            second_method_authenticated: false,
            completed: false,
            expires_at: None,
            missing_fields: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: SigninStep) -> Self {
        self.current_step = Some(step);
        self
    }
}

/// First-factor credential chosen before submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigninStrategy {
    EmailPassword {
        email: String,
        password: String,
    },
    UsernamePassword {
        username: String,
        password: String,
    },
    EmailOtp {
        email: String,
    },
    PhoneOtp {
        phone_number: String,
    },
    EmailMagicLink {
        email: String,
        redirect_uri: Option<String>,
    },
    OAuth {
        provider: String,
        redirect_uri: String,
    },
}

impl SigninStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::EmailPassword { .. } => StrategyKind::EmailPassword,
            Self::UsernamePassword { .. } => StrategyKind::UsernamePassword,
            Self::EmailOtp { .. } => StrategyKind::EmailOtp,
            Self::PhoneOtp { .. } => StrategyKind::PhoneOtp,
            Self::EmailMagicLink { .. } => StrategyKind::EmailMagicLink,
            Self::OAuth { .. } => StrategyKind::OAuth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    EmailPassword,
    UsernamePassword,
    EmailOtp,
    PhoneOtp,
    EmailMagicLink,
    OAuth,
}

impl StrategyKind {
    /// Value of the `strategy` form field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailPassword => "email_password",
            Self::UsernamePassword => "username_password",
            Self::EmailOtp => "email_otp",
            Self::PhoneOtp => "phone_otp",
            Self::EmailMagicLink => "magic_link",
            Self::OAuth => "oauth",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigninState {
    Idle,
    Submitted,
    VerificationPending(SigninStep),
    Completed,
    Discarded,
}

/// Outcome of a transition, for the caller to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum SigninEvent {
    /// The attempt completed; the caller follows its post-login redirect.
    Completed(Session),
    /// A verification step is pending. `prepared` is the strategy dispatched by this
    /// transition, `None` when nothing was (re)sent.
    VerificationRequired {
        step: SigninStep,
        prepared: Option<VerificationStrategy>,
    },
    /// The backend needs more profile data before the attempt can finish.
    ProfileIncomplete(Vec<ProfileField>),
    /// The browser has to navigate to this URL (OAuth).
    Redirect(Url),
    /// The attempt was adopted and waits for the backend.
    Pending,
    /// The response belonged to an attempt that is no longer current.
    Ignored,
}
