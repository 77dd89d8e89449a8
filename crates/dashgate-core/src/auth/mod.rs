//! Authentication module for managing the dashboard session.
//!
//! This module provides:
//! - `SessionStore`: owner of the bearer token and identity hint
//! - `TokenStorage`: durable key/value backends (`FileStorage`,
//!   `KeyringStorage`, `MemoryStorage`)
//!
//! Tokens are opaque. Nothing here checks signatures or expiry; the API
//! rejects stale tokens on the next request.

pub mod credentials;
pub mod session;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use credentials::KeyringStorage;
pub use session::{AuthError, AuthGrant, AuthState, Authenticator, Session, SessionStore};
pub use storage::{FileStorage, MemoryStorage, StorageError, TokenStorage};
