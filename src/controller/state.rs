use serde::Serialize;

use crate::models::Session;

/// Snapshot of the auth state machine.
///
/// Invariants maintained by the controller: `is_admin` is false whenever
/// `user` is `None`, and `error` is cleared when an operation starts.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<Session>,
    pub loading: bool,
    pub error: Option<String>,
    pub is_admin: bool,
    pub email_not_confirmed: bool,
}

/// Coarse state derived from a snapshot.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Loading,
    Authenticated,
    Anonymous,
    Error,
}

impl AuthState {
    /// State at controller creation, before the first session lookup settles.
    pub fn initial() -> Self {
        AuthState {
            user: None,
            loading: true,
            error: None,
            is_admin: false,
            email_not_confirmed: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn phase(&self) -> AuthPhase {
        if self.loading {
            AuthPhase::Loading
        } else if self.user.is_some() {
            AuthPhase::Authenticated
        } else if self.error.is_some() {
            AuthPhase::Error
        } else {
            AuthPhase::Anonymous
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::initial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            user_id: "u-1".to_string(),
            email: None,
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_initial_state_is_loading_and_anonymous() {
        let state = AuthState::initial();
        assert!(state.loading);
        assert!(!state.is_authenticated());
        assert!(!state.is_admin);
        assert_eq!(state.phase(), AuthPhase::Loading);
    }

    #[test]
    fn test_phase_after_settling() {
        let mut state = AuthState {
            loading: false,
            ..AuthState::initial()
        };
        assert_eq!(state.phase(), AuthPhase::Anonymous);

        state.error = Some("Invalid login credentials".to_string());
        assert_eq!(state.phase(), AuthPhase::Error);

        state.user = Some(session());
        assert_eq!(state.phase(), AuthPhase::Authenticated);
    }
}
