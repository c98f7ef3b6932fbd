//! Client-side auth orchestration: the process-wide `AuthState` and the
//! controller that owns every write to it.

pub mod auth_controller;
pub mod state;

pub use auth_controller::AuthController;
pub use state::{AuthPhase, AuthState};
