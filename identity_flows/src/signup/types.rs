use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ProfileField;
use crate::session::Session;
use crate::verification::{IdentifierType, VerificationStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignupStep {
    VerifyEmail,
    VerifyPhone,
    VerifyAuthenticator,
}

impl SignupStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VerifyEmail => "verify_email",
            Self::VerifyPhone => "verify_phone",
            Self::VerifyAuthenticator => "verify_authenticator",
        }
    }

    /// Strategy prepared automatically when this step is reached.
    pub fn verification_strategy(&self) -> Option<VerificationStrategy> {
        match self {
            Self::VerifyEmail => Some(VerificationStrategy::EmailOtp),
            Self::VerifyPhone => Some(VerificationStrategy::PhoneOtp),
            Self::VerifyAuthenticator => None,
        }
    }

    pub fn identifier_type(&self) -> IdentifierType {
        match self {
            Self::VerifyEmail => IdentifierType::Email,
            Self::VerifyPhone => IdentifierType::Phone,
            Self::VerifyAuthenticator => IdentifierType::Authenticator,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignupAttempt {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub required_fields: Vec<ProfileField>,
    #[serde(default)]
    pub missing_fields: Vec<ProfileField>,
    #[serde(default)]
    pub current_step: Option<SignupStep>,
    #[serde(default)]
    pub remaining_steps: Vec<SignupStep>,
    #[serde(default)]
    pub completed: bool,
}

impl SignupAttempt {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            first_name: None,
            last_name: None,
            username: None,
            email: None,
            phone_number: None,
            required_fields: Vec::new(),
            missing_fields: Vec::new(),
            current_step: None,
            remaining_steps: Vec::new(),
            completed: false,
        }
    }
}

/// Body returned by `POST /auth/signup`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupResponse {
    pub sign_in_attempt: SignupAttempt,
}

/// Profile values entered by the user, keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileData {
    values: BTreeMap<ProfileField, String>,
}

impl ProfileData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: ProfileField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: ProfileField, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn get(&self, field: ProfileField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// A field counts as filled once it holds something other than whitespace.
    pub fn is_filled(&self, field: ProfileField) -> bool {
        self.get(field).is_some_and(|v| !v.trim().is_empty())
    }

    /// Filled fields as form pairs, in field order.
    pub fn to_form(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(field, value)| (field.as_str().to_string(), value.trim().to_string()))
            .collect()
    }

    /// Filled values restricted to `fields`.
    pub fn only(&self, fields: &[ProfileField]) -> Self {
        Self {
            values: self
                .values
                .iter()
                .filter(|(field, _)| fields.contains(field))
                .map(|(field, value)| (*field, value.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupState {
    Idle,
    Submitted,
    VerificationPending(SignupStep),
    Completed,
    Discarded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignupEvent {
    Completed(Session),
    VerificationRequired {
        step: SignupStep,
        prepared: Option<VerificationStrategy>,
    },
    /// Missing fields the deployment lets the user fill in.
    FieldsRequired(Vec<ProfileField>),
    Pending,
    Ignored,
}
