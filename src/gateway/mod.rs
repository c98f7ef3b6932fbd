pub mod base;
pub mod memory_gateway;
pub mod supabase_gateway;

// Re-export so callers can "use crate::gateway::{IdentityGateway, create_gateway}".
pub use base::{create_gateway, GatewayConfig, IdentityGateway};
