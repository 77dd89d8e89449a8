//! Navigation surface and route protection.
//!
//! `Destination` classifies a path (login entry point, protected view, or
//! catch-all) and `RouteGuard` turns a classification plus the current
//! session into allow-or-redirect.

pub mod destination;
pub mod guard;

pub use destination::{
    normalize_path, DashboardView, DataSource, Destination, LANDING_PATH, LOGIN_PATH,
    PROTECTED_ROOT,
};
pub use guard::{GuardConfigError, Navigation, Resolved, RouteGuard};
