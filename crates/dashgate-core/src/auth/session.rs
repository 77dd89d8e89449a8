use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::ApiError;

use super::storage::{StorageError, TokenStorage};

/// Storage key holding the bearer token
pub const TOKEN_KEY: &str = "token";

/// Storage key holding the identity hint (JSON)
pub const IDENTITY_KEY: &str = "identity";

#[derive(Error, Debug)]
pub enum AuthError {
    /// Bad credentials, unreachable endpoint or malformed response.
    #[error("The email or password you entered is incorrect.")]
    AuthenticationFailed,

    #[error("Session storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),
}

/// What a successful authentication call hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub token: String,
    pub user_id: String,
}

/// Remote authentication endpoint.
pub trait Authenticator {
    fn authenticate(
        &self,
        identifier: &str,
        secret: &str,
    ) -> impl Future<Output = Result<AuthGrant, ApiError>> + Send;
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Session {
    pub token: String,
    pub user_id: Option<String>,
    pub email: Option<String>,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// The part of a session persisted next to the token.
#[derive(Debug, Serialize, Deserialize)]
struct IdentityHint {
    user_id: Option<String>,
    email: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A session rebuilt from nothing but a stored token
    pub fn from_token(token: String) -> Self {
        Self {
            token,
            user_id: None,
            email: None,
            created_at: Utc::now(),
        }
    }

    /// Name to show in the UI: email, then user id, then a placeholder
    pub fn display_name(&self) -> &str {
        self.email
            .as_deref()
            .or(self.user_id.as_deref())
            .unwrap_or("signed-in user")
    }

    fn identity_hint(&self) -> IdentityHint {
        IdentityHint {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            created_at: Some(self.created_at),
        }
    }

    fn apply_hint(&mut self, hint: IdentityHint) {
        self.user_id = hint.user_id;
        self.email = hint.email;
        if let Some(created_at) = hint.created_at {
            self.created_at = created_at;
        }
    }
}

/// Authentication state derived from the session on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub enum AuthState {
    Authenticated,
    Unauthenticated,
}

impl AuthState {
    pub fn of(session: Option<&Session>) -> Self {
        match session {
            Some(_) => AuthState::Authenticated,
            None => AuthState::Unauthenticated,
        }
    }

    pub fn is_authenticated(self) -> bool {
        self == AuthState::Authenticated
    }
}

/// Single source of truth for "is the caller authenticated".
///
/// Owns the in-memory session and is the only writer of the durable token.
/// Login and logout take `&mut self`, so they cannot interleave.
pub struct SessionStore<A> {
    storage: Box<dyn TokenStorage>,
    authenticator: A,
    session: Option<Session>,
}

impl<A> SessionStore<A> {
    pub fn new(storage: Box<dyn TokenStorage>, authenticator: A) -> Self {
        Self {
            storage,
            authenticator,
            session: None,
        }
    }

    /// Rehydrate the session from durable storage. No network round trip;
    /// the token is trusted until an endpoint rejects it.
    pub fn initialize(&mut self) -> Option<&Session> {
        self.session = match self.read_persisted() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Session storage unreadable, starting unauthenticated");
                None
            }
        };
        debug!(authenticated = self.session.is_some(), "Session store initialized");
        self.session.as_ref()
    }

    fn read_persisted(&self) -> Result<Option<Session>, AuthError> {
        let token = match self.storage.get(TOKEN_KEY)? {
            Some(token) if !token.is_empty() => token,
            _ => return Ok(None),
        };

        let mut session = Session::from_token(token);
        match self.storage.get(IDENTITY_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<IdentityHint>(&raw) {
                Ok(hint) => session.apply_hint(hint),
                Err(e) => debug!(error = %e, "Ignoring malformed identity hint"),
            },
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Identity hint unreadable"),
        }
        Ok(Some(session))
    }

    /// Write token and identity hint together. If either write fails, both
    /// keys are put back to what they held before.
    fn persist(&self, session: &Session) -> Result<(), StorageError> {
        let hint = serde_json::to_string(&session.identity_hint())?;
        let previous = [
            (TOKEN_KEY, self.snapshot(TOKEN_KEY)?),
            (IDENTITY_KEY, self.snapshot(IDENTITY_KEY)?),
        ];

        let written = self
            .storage
            .set(TOKEN_KEY, &session.token)
            .and_then(|()| self.storage.set(IDENTITY_KEY, &hint));

        if let Err(e) = written {
            for (key, value) in &previous {
                if let Err(restore) = self.restore(key, value.as_deref()) {
                    warn!(error = %restore, key, "Failed to roll back session storage");
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Current value of `key` for rollback. Unreadable content counts as absent.
    fn snapshot(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.storage.get(key) {
            Err(StorageError::Corrupt(e)) => {
                debug!(error = %e, key, "Not keeping corrupt value for rollback");
                Ok(None)
            }
            other => other,
        }
    }

    fn restore(&self, key: &str, value: Option<&str>) -> Result<(), StorageError> {
        match value {
            Some(value) => self.storage.set(key, value),
            None => self.storage.remove(key),
        }
    }

    /// Clear durable storage and the in-memory session. Idempotent.
    pub fn logout(&mut self) {
        for key in [TOKEN_KEY, IDENTITY_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(error = %e, key, "Failed to clear session storage");
            }
        }
        if self.session.take().is_some() {
            info!("Logged out");
        } else {
            debug!("Logout with no active session");
        }
    }

    /// Synchronous read of the in-memory session. Never touches storage or network.
    pub fn current_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn auth_state(&self) -> AuthState {
        AuthState::of(self.current_session())
    }

    /// Bearer token for authenticated requests, if logged in
    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    pub fn authenticator(&self) -> &A {
        &self.authenticator
    }

    /// End the store's lifecycle. Durable storage is left as is, so the next
    /// `initialize` on this device picks the session back up.
    pub fn dispose(self) {
        debug!(authenticated = self.session.is_some(), "Session store disposed");
    }
}

impl<A: Authenticator> SessionStore<A> {
    /// Authenticate against the remote endpoint and commit the session.
    ///
    /// On failure the store is left exactly as it was, in memory and on disk.
    /// The commit happens after the remote call returns, so a dropped future
    /// changes nothing.
    pub async fn login(&mut self, identifier: &str, secret: &str) -> Result<&Session, AuthError> {
        let grant = match self.authenticator.authenticate(identifier, secret).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!(error = %e, "Login failed");
                return Err(AuthError::AuthenticationFailed);
            }
        };

        if grant.token.trim().is_empty() {
            warn!("Login response carried an empty token");
            return Err(AuthError::AuthenticationFailed);
        }

        let session = Session {
            token: grant.token,
            user_id: Some(grant.user_id),
            email: Some(identifier.to_string()),
            created_at: Utc::now(),
        };

        if let Err(e) = self.persist(&session) {
            warn!(error = %e, "Failed to persist session, login rejected");
            return Err(AuthError::StorageUnavailable(e));
        }

        info!(user_id = ?session.user_id, "Login successful");
        Ok(&*self.session.insert(session))
    }
}
