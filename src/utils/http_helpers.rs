use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::AuthError;
use crate::guard::GuardOutcome;
use crate::notifications::NotificationError;

/// A general purpose HTTP error type that can be converted into an `IntoResponse`.
#[derive(Debug)]
pub struct HTTPError {
    status: StatusCode,
    message: String,
    email_not_confirmed: bool,
}

impl HTTPError {
    /// Creates a new HTTP error with the given status code and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        HTTPError {
            status,
            message: message.into(),
            email_not_confirmed: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Converts our `HTTPError` into a JSON response. The `email_not_confirmed`
/// flag tells clients to offer the resend-confirmation action.
impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        let body = if self.email_not_confirmed {
            json!({ "error": self.message, "email_not_confirmed": true })
        } else {
            json!({ "error": self.message })
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AuthError> for HTTPError {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::EmailNotConfirmed => StatusCode::FORBIDDEN,
            AuthError::AccountExists => StatusCode::CONFLICT,
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AuthError::Network(_) => StatusCode::BAD_GATEWAY,
            AuthError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        HTTPError {
            status,
            message: err.to_string(),
            email_not_confirmed: err.is_email_not_confirmed(),
        }
    }
}

impl From<NotificationError> for HTTPError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound(_) => HTTPError::new(StatusCode::NOT_FOUND, err.to_string()),
        }
    }
}

/// Maps a guard decision onto the protected handler's result.
impl<T> From<GuardOutcome<T>> for Result<T, HTTPError> {
    fn from(outcome: GuardOutcome<T>) -> Self {
        match outcome {
            GuardOutcome::Allowed(content) => Ok(content),
            GuardOutcome::Loading => Err(HTTPError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Session is still loading",
            )),
            GuardOutcome::LoginRequired => Err(HTTPError::new(
                StatusCode::UNAUTHORIZED,
                "You must be logged in to view this page",
            )),
            GuardOutcome::Forbidden => Err(HTTPError::new(
                StatusCode::FORBIDDEN,
                "You do not have permission to view this page",
            )),
        }
    }
}

/// Runs a guard decision through the HTTP mapping, for use with `?`.
pub fn guarded<T>(outcome: GuardOutcome<T>) -> Result<T, HTTPError> {
    outcome.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_status_mapping() {
        let cases = [
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::EmailNotConfirmed, StatusCode::FORBIDDEN),
            (AuthError::AccountExists, StatusCode::CONFLICT),
            (AuthError::Validation("bad".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AuthError::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (AuthError::Network("down".into()), StatusCode::BAD_GATEWAY),
            (AuthError::Unknown("?".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(HTTPError::from(err).status(), status);
        }
    }

    #[test]
    fn test_only_unconfirmed_email_sets_flag() {
        assert!(HTTPError::from(AuthError::EmailNotConfirmed).email_not_confirmed);
        assert!(!HTTPError::from(AuthError::InvalidCredentials).email_not_confirmed);
    }

    #[test]
    fn test_guard_outcome_mapping() {
        let allowed: Result<u8, HTTPError> = GuardOutcome::Allowed(1).into();
        assert_eq!(allowed.unwrap(), 1);

        let loading: Result<u8, HTTPError> = GuardOutcome::Loading.into();
        assert_eq!(loading.unwrap_err().status(), StatusCode::SERVICE_UNAVAILABLE);

        let login: Result<u8, HTTPError> = GuardOutcome::LoginRequired.into();
        assert_eq!(login.unwrap_err().status(), StatusCode::UNAUTHORIZED);

        let forbidden: Result<u8, HTTPError> = GuardOutcome::Forbidden.into();
        assert_eq!(forbidden.unwrap_err().status(), StatusCode::FORBIDDEN);
    }
}
