pub mod auth;
pub mod metrics;
pub mod trace;
pub mod trigger_auth;
