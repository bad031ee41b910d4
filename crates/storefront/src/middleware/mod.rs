//! Request middleware: session cookie handling and auth extractors.

pub mod auth;
pub mod session;

pub use auth::{OptionalAuth, RequireAuth};
