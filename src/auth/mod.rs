//! Authentication module
//!
//! Supports: Bearer token, API key (header or query), no auth.
//!
//! CJ's personal access tokens are sent as `Authorization: Bearer <token>`.
//! The other variants exist for custom streams declared in a catalog file.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{AuthConfig, Location};

#[cfg(test)]
mod tests;
