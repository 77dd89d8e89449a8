//! REST API client module for the dashboard service.
//!
//! This module provides the `ApiClient` for logging in and for fetching the
//! overview, analytics, user and product payloads shown by the dashboard.
//!
//! The API uses bearer token authentication; the token is obtained from the
//! `/api/login` endpoint and held by the session store.

pub mod client;
pub mod error;

pub use client::{ApiClient, DEFAULT_API_BASE_URL, DEMO_EMAIL, DEMO_PASSWORD};
pub use error::ApiError;
