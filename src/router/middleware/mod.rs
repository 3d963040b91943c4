//! Router middleware

pub mod auth;
pub mod server;

pub use auth::require_auth;
pub use server::extract_server;
