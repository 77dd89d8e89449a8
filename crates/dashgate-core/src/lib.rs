//! dashgate core - session store, route guard and API client for the
//! admin dashboard.
//!
//! The session store owns the bearer token and persists it between runs;
//! the route guard is evaluated before every view is entered; the API
//! client talks to the dashboard REST service.

pub mod api;
pub mod auth;
pub mod config;
pub mod routes;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthError, AuthState, Session, SessionStore};
pub use config::Config;
pub use routes::{Navigation, RouteGuard};
