//! Test doubles for the session store.

use crate::api::{ApiError, DEMO_EMAIL, DEMO_PASSWORD};

use super::session::{AuthGrant, Authenticator};
use super::storage::{MemoryStorage, StorageError, TokenStorage};

enum Behavior {
    /// Accept the demo account, reject everything else with 401
    Demo,
    /// Every call fails as if the server were down
    Unreachable,
    /// Every call "succeeds" with an empty token
    EmptyToken,
}

pub struct StubAuthenticator {
    behavior: Behavior,
}

impl StubAuthenticator {
    pub fn demo() -> Self {
        Self { behavior: Behavior::Demo }
    }

    pub fn unreachable() -> Self {
        Self { behavior: Behavior::Unreachable }
    }

    pub fn empty_token() -> Self {
        Self { behavior: Behavior::EmptyToken }
    }
}

impl Authenticator for StubAuthenticator {
    async fn authenticate(&self, identifier: &str, secret: &str) -> Result<AuthGrant, ApiError> {
        match self.behavior {
            Behavior::Demo if identifier == DEMO_EMAIL && secret == DEMO_PASSWORD => Ok(AuthGrant {
                token: "abc123".to_string(),
                user_id: "u1".to_string(),
            }),
            Behavior::Demo => Err(ApiError::Unauthorized),
            Behavior::Unreachable => Err(ApiError::ServerError("connection refused".to_string())),
            Behavior::EmptyToken => Ok(AuthGrant {
                token: String::new(),
                user_id: "u1".to_string(),
            }),
        }
    }
}

/// Storage whose every operation fails.
pub struct FailingStorage;

impl TokenStorage for FailingStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Io(std::io::Error::other("storage offline")))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::other("storage offline")))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::other("storage offline")))
    }
}

/// Memory storage that refuses writes to a single key.
pub struct RejectKey {
    inner: MemoryStorage,
    key: &'static str,
}

impl RejectKey {
    pub fn new(inner: MemoryStorage, key: &'static str) -> Self {
        Self { inner, key }
    }
}

impl TokenStorage for RejectKey {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if key == self.key {
            return Err(StorageError::Io(std::io::Error::other("quota exceeded")));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}
