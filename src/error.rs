//! Error taxonomy shared by the identity gateways and the auth controller.

use thiserror::Error;

use crate::utils::timeout::Timeout;

/// Failures surfaced by auth operations.
///
/// The `Display` output is the human-readable message stored in
/// `AuthState::error` and shown by forms.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Wrong email or password.
    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// The account exists but its email address has not been verified yet.
    #[error("Email not confirmed")]
    EmailNotConfirmed,

    /// Sign-up for an email that is already registered.
    #[error("User already registered")]
    AccountExists,

    /// Input rejected before or by the backend (malformed email, weak password...).
    #[error("{0}")]
    Validation(String),

    /// A deadline elapsed before the gateway answered.
    #[error("The identity service did not respond in time")]
    Timeout,

    /// The gateway could not be reached or answered with garbage.
    #[error("Network error: {0}")]
    Network(String),

    /// Any other gateway failure, carrying the backend message verbatim.
    #[error("{0}")]
    Unknown(String),
}

impl AuthError {
    /// True when the UI should offer the resend-confirmation action.
    pub fn is_email_not_confirmed(&self) -> bool {
        matches!(self, AuthError::EmailNotConfirmed)
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::EmailNotConfirmed => "email_not_confirmed",
            AuthError::AccountExists => "account_exists",
            AuthError::Validation(_) => "validation",
            AuthError::Timeout => "timeout",
            AuthError::Network(_) => "network",
            AuthError::Unknown(_) => "unknown",
        }
    }
}

impl From<Timeout> for AuthError {
    fn from(_: Timeout) -> Self {
        AuthError::Timeout
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthError::Timeout
        } else {
            AuthError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_messages_are_human_readable() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid login credentials"
        );
        assert_eq!(AuthError::EmailNotConfirmed.to_string(), "Email not confirmed");
        assert_eq!(
            AuthError::Unknown("database is on fire".into()).to_string(),
            "database is on fire"
        );
    }

    #[test]
    fn test_only_email_not_confirmed_offers_resend() {
        assert!(AuthError::EmailNotConfirmed.is_email_not_confirmed());
        assert!(!AuthError::InvalidCredentials.is_email_not_confirmed());
        assert!(!AuthError::Timeout.is_email_not_confirmed());
    }

    #[test]
    fn test_timeout_converts() {
        let err: AuthError = Timeout(Duration::from_millis(5)).into();
        assert_eq!(err, AuthError::Timeout);
        assert_eq!(err.kind(), "timeout");
    }
}
