// Re-exports so the rest of the crate can "use crate::config::*".
pub mod config;
pub mod logging;

pub use config::*;
pub use logging::*;
