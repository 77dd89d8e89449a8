use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::auth::{AuthState, Session, SessionStore};

use super::destination::{normalize_path, Destination, LANDING_PATH, LOGIN_PATH, PROTECTED_ROOT};

/// Outcome of a navigation attempt. Denial is always a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(tag = "action", content = "to", rename_all = "snake_case")]
pub enum Navigation {
    Allow,
    Redirect(String),
}

impl Navigation {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Navigation::Allow)
    }

    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Navigation::Allow => None,
            Navigation::Redirect(to) => Some(to),
        }
    }
}

/// Where a navigation finally lands after the guard has had its say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub path: String,
    pub destination: Destination,
    /// Set when the requested path was replaced by a redirect
    pub redirected_from: Option<String>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GuardConfigError {
    #[error("Landing path {landing} is not a view under {protected_root}")]
    LandingNotProtected {
        landing: String,
        protected_root: String,
    },
}

/// Gate evaluated before every view is entered.
///
/// Holds no session state of its own; every call reads the session it is
/// handed, so a logout is seen by the very next navigation.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
    landing_path: String,
    protected_root: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self {
            login_path: LOGIN_PATH.to_string(),
            landing_path: LANDING_PATH.to_string(),
            protected_root: PROTECTED_ROOT.to_string(),
        }
    }
}

impl RouteGuard {
    /// Build a guard for custom paths. The landing path must classify as a
    /// protected view, otherwise an authenticated caller would be sent back
    /// to it forever.
    pub fn new(
        login_path: &str,
        landing_path: &str,
        protected_root: &str,
    ) -> Result<Self, GuardConfigError> {
        let guard = Self {
            login_path: normalize_path(login_path),
            landing_path: normalize_path(landing_path),
            protected_root: normalize_path(protected_root),
        };
        match guard.classify(&guard.landing_path) {
            Destination::Protected(_) => Ok(guard),
            Destination::Login | Destination::Fallback => Err(GuardConfigError::LandingNotProtected {
                landing: guard.landing_path,
                protected_root: guard.protected_root,
            }),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    pub fn classify(&self, path: &str) -> Destination {
        Destination::classify(&normalize_path(path), &self.login_path, &self.protected_root)
    }

    /// Decide whether `path` may be entered with the given session.
    pub fn evaluate(&self, session: Option<&Session>, path: &str) -> Navigation {
        let destination = self.classify(path);
        let state = AuthState::of(session);

        let decision = match (destination, state) {
            (Destination::Protected(_), AuthState::Unauthenticated) => {
                Navigation::Redirect(self.login_path.clone())
            }
            (Destination::Login | Destination::Fallback, AuthState::Authenticated) => {
                Navigation::Redirect(self.landing_path.clone())
            }
            // The catch-all shows the login screen; send it to the real entry point
            (Destination::Fallback, AuthState::Unauthenticated) => {
                Navigation::Redirect(self.login_path.clone())
            }
            _ => Navigation::Allow,
        };

        debug!(path, ?destination, ?state, ?decision, "Route guard evaluated");
        decision
    }

    /// Evaluate against the store's current session.
    pub fn check<A>(&self, store: &SessionStore<A>, path: &str) -> Navigation {
        self.evaluate(store.current_session(), path)
    }

    /// Evaluate and follow the redirect, if any. One hop always settles:
    /// the login path is open to anonymous callers and the landing path to
    /// authenticated ones.
    pub fn resolve(&self, session: Option<&Session>, path: &str) -> Resolved {
        match self.evaluate(session, path) {
            Navigation::Allow => {
                let path = normalize_path(path);
                Resolved {
                    destination: self.classify(&path),
                    path,
                    redirected_from: None,
                }
            }
            Navigation::Redirect(to) => Resolved {
                destination: self.classify(&to),
                path: to,
                redirected_from: Some(normalize_path(path)),
            },
        }
    }
}
