use std::fmt;

use serde::{Deserialize, Serialize};

/// Delivery channel requested from `prepare-verification`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStrategy {
    EmailOtp,
    PhoneOtp,
    #[serde(rename = "email_magiclink")]
    EmailMagicLink,
}

impl VerificationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailOtp => "email_otp",
            Self::PhoneOtp => "phone_otp",
            Self::EmailMagicLink => "email_magiclink",
        }
    }

    pub fn identifier_type(&self) -> IdentifierType {
        match self {
            Self::EmailOtp | Self::EmailMagicLink => IdentifierType::Email,
            Self::PhoneOtp => IdentifierType::Phone,
        }
    }
}

impl fmt::Display for VerificationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which identifier a verification code proves ownership of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierType {
    Email,
    Phone,
    Authenticator,
}

impl IdentifierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Authenticator => "authenticator",
        }
    }
}
