use crate::config::ProfileField;
use crate::session::Session;
use crate::signin::SigninAttempt;
use crate::signup::SignupAttempt;
use crate::verification::{IdentifierType, VerificationStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptKind {
    Signin,
    Signup,
}

impl AttemptKind {
    /// Heading shown above the completion form.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Signin => "Complete your profile",
            Self::Signup => "Complete your account setup",
        }
    }
}

/// The shape profile completion works on, shared by sign-in and sign-up attempts.
pub trait CompletableAttempt {
    fn id(&self) -> &str;
    fn kind(&self) -> AttemptKind;
    fn missing_fields(&self) -> &[ProfileField];
    /// Strategy to prepare for the pending step, if it is delivered by email or phone.
    fn verification_strategy(&self) -> Option<VerificationStrategy>;
    /// Identifier the pending step verifies, if the step takes a code.
    fn verification_identifier(&self) -> Option<IdentifierType>;
    fn is_completed(&self) -> bool;

    fn needs_completion(&self) -> bool {
        !self.is_completed()
            && (!self.missing_fields().is_empty() || self.verification_identifier().is_some())
    }
}

impl CompletableAttempt for SigninAttempt {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> AttemptKind {
        AttemptKind::Signin
    }

    fn missing_fields(&self) -> &[ProfileField] {
        &self.missing_fields
    }

    fn verification_strategy(&self) -> Option<VerificationStrategy> {
        self.current_step?.verification_strategy(false)
    }

    fn verification_identifier(&self) -> Option<IdentifierType> {
        self.current_step?.identifier_type()
    }

    fn is_completed(&self) -> bool {
        self.completed
    }
}

impl CompletableAttempt for SignupAttempt {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> AttemptKind {
        AttemptKind::Signup
    }

    fn missing_fields(&self) -> &[ProfileField] {
        &self.missing_fields
    }

    fn verification_strategy(&self) -> Option<VerificationStrategy> {
        self.current_step?.verification_strategy()
    }

    fn verification_identifier(&self) -> Option<IdentifierType> {
        self.current_step.map(|step| step.identifier_type())
    }

    fn is_completed(&self) -> bool {
        self.completed
    }
}

/// An attempt handed over for completion.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAttempt {
    Signin(SigninAttempt),
    Signup(SignupAttempt),
}

impl PendingAttempt {
    fn inner(&self) -> &dyn CompletableAttempt {
        match self {
            Self::Signin(attempt) => attempt,
            Self::Signup(attempt) => attempt,
        }
    }
}

impl CompletableAttempt for PendingAttempt {
    fn id(&self) -> &str {
        self.inner().id()
    }

    fn kind(&self) -> AttemptKind {
        self.inner().kind()
    }

    fn missing_fields(&self) -> &[ProfileField] {
        self.inner().missing_fields()
    }

    fn verification_strategy(&self) -> Option<VerificationStrategy> {
        self.inner().verification_strategy()
    }

    fn verification_identifier(&self) -> Option<IdentifierType> {
        self.inner().verification_identifier()
    }

    fn is_completed(&self) -> bool {
        self.inner().is_completed()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionEvent {
    Completed(Session),
    /// Missing fields the deployment lets the user fill in.
    FieldsRequired(Vec<ProfileField>),
    /// `prepared` is the strategy dispatched by this transition, if any.
    VerificationRequired {
        identifier_type: IdentifierType,
        prepared: Option<VerificationStrategy>,
    },
    Pending,
    /// The response arrived after the completion was unmounted.
    Ignored,
}
