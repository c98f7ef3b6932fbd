//! Declarative access checks over an [`AuthState`] snapshot.

use serde::{Deserialize, Serialize};

use crate::controller::AuthState;

/// What a protected view needs before its content may be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Requirement {
    Authenticated,
    Admin,
}

/// Result of a guard check. Content is only ever handed back in `Allowed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome<T> {
    Loading,
    LoginRequired,
    Forbidden,
    Allowed(T),
}

impl<T> GuardOutcome<T> {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardOutcome::Allowed(_))
    }

    pub fn allowed(self) -> Option<T> {
        match self {
            GuardOutcome::Allowed(content) => Some(content),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessGuard {
    require_admin: bool,
}

impl AccessGuard {
    pub fn new(require_admin: bool) -> Self {
        AccessGuard { require_admin }
    }

    pub fn authenticated() -> Self {
        Self::new(false)
    }

    pub fn admin() -> Self {
        Self::new(true)
    }

    pub fn requirement(&self) -> Requirement {
        if self.require_admin {
            Requirement::Admin
        } else {
            Requirement::Authenticated
        }
    }

    /// Decides whether `content` may be rendered for `state`.
    ///
    /// An admin check never degrades into a login prompt: anonymous visitors
    /// of an admin view are told they are forbidden.
    pub fn check<T>(&self, state: &AuthState, content: T) -> GuardOutcome<T> {
        if state.loading {
            return GuardOutcome::Loading;
        }
        if self.require_admin {
            return if state.is_admin {
                GuardOutcome::Allowed(content)
            } else {
                GuardOutcome::Forbidden
            };
        }
        if state.user.is_none() {
            return GuardOutcome::LoginRequired;
        }
        GuardOutcome::Allowed(content)
    }
}

impl From<Requirement> for AccessGuard {
    fn from(requirement: Requirement) -> Self {
        AccessGuard::new(requirement == Requirement::Admin)
    }
}
