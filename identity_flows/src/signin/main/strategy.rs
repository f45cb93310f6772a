use crate::api::{ApiRequest, ValidationError, endpoints};
use crate::signin::types::{SigninStrategy, StrategyKind};

/// What a strategy submits.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Dispatch {
    /// Form post to `/auth/signin`, answered with a session.
    Signin(ApiRequest),
    /// Provider redirect obtained from `/auth/oauth2/init`.
    OAuth {
        provider: String,
        redirect_uri: String,
    },
}

/// Maps each strategy to its submission shape.
pub(super) fn strategy_table(strategy: &SigninStrategy) -> Result<Dispatch, ValidationError> {
    let kind = strategy.kind();
    match strategy {
        SigninStrategy::EmailPassword { email, password } => {
            password_form(kind, ("email", email), password)
        }
        SigninStrategy::UsernamePassword { username, password } => {
            password_form(kind, ("username", username), password)
        }
        SigninStrategy::EmailOtp { email } => identifier_form(kind, ("email", email)),
        SigninStrategy::PhoneOtp { phone_number } => {
            identifier_form(kind, ("phone_number", phone_number))
        }
        SigninStrategy::EmailMagicLink {
            email,
            redirect_uri,
        } => {
            let mut fields = identifier_fields(kind, ("email", email))?;
            if let Some(uri) = redirect_uri {
                fields.push(("redirect_uri".to_string(), uri.clone()));
            }
            Ok(Dispatch::Signin(
                ApiRequest::post(endpoints::SIGNIN).form(fields),
            ))
        }
        SigninStrategy::OAuth {
            provider,
            redirect_uri,
        } => {
            let provider = non_empty("provider", provider)?;
            Ok(Dispatch::OAuth {
                provider,
                redirect_uri: redirect_uri.clone(),
            })
        }
    }
}

fn password_form(
    kind: StrategyKind,
    identifier: (&'static str, &str),
    password: &str,
) -> Result<Dispatch, ValidationError> {
    let mut fields = identifier_fields(kind, identifier)?;
    if password.is_empty() {
        return Err(ValidationError::EmptyCredential("password"));
    }
    fields.push(("password".to_string(), password.to_string()));
    Ok(Dispatch::Signin(
        ApiRequest::post(endpoints::SIGNIN).form(fields),
    ))
}

fn identifier_form(
    kind: StrategyKind,
    identifier: (&'static str, &str),
) -> Result<Dispatch, ValidationError> {
    let fields = identifier_fields(kind, identifier)?;
    Ok(Dispatch::Signin(
        ApiRequest::post(endpoints::SIGNIN).form(fields),
    ))
}

fn identifier_fields(
    kind: StrategyKind,
    (name, value): (&'static str, &str),
) -> Result<Vec<(String, String)>, ValidationError> {
    let value = non_empty(name, value)?;
    Ok(vec![
        ("strategy".to_string(), kind.as_str().to_string()),
        ("identifier".to_string(), value),
    ])
}

fn non_empty(name: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyCredential(name));
    }
    Ok(value.to_string())
}
