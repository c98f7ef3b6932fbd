pub mod http_helpers;
pub mod logger;
pub mod timeout;
