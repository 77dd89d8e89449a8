//! Application state for the dashgate CLI.
//!
//! `App` wires the session store, route guard and API client together and
//! acts as the navigation layer: every view is entered through the guard.

use std::io::{self, Write};

use anyhow::{Context, Result};
use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use dashgate_core::api::{ApiClient, ApiError};
use dashgate_core::auth::SessionStore;
use dashgate_core::config::Config;
use dashgate_core::routes::{DashboardView, Destination, Resolved, RouteGuard};

// ============================================================================
// Constants
// ============================================================================

/// Maximum length for email input.
const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Shown when the API rejects a token the store still holds
const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";

pub struct App {
    config: Config,
    store: SessionStore<ApiClient>,
    guard: RouteGuard,
}

impl App {
    /// Create the application and rehydrate any persisted session
    pub fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        debug!(api = %config.api_base_url, storage = ?config.storage, "Config loaded");

        let api = ApiClient::new(&config.api_base_url).context("Failed to build HTTP client")?;
        let mut store = SessionStore::new(config.token_storage(), api);
        store.initialize();

        Ok(Self {
            config,
            store,
            guard: RouteGuard::default(),
        })
    }

    pub fn last_email(&self) -> Option<&str> {
        self.config.last_email.as_deref()
    }

    /// API client carrying the current token, if logged in
    fn authed_client(&self) -> Option<ApiClient> {
        self.store
            .token()
            .map(|token| self.store.authenticator().with_token(token.to_string()))
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Log in and land on the default protected view.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<()> {
        if let Err(message) = validate_credentials(email, password) {
            anyhow::bail!(message);
        }

        let session = self.store.login(email, password).await?;
        println!("Logged in as {}", session.display_name());

        self.config.last_email = Some(email.to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        let landing = self.guard.landing_path().to_string();
        self.open(&landing).await
    }

    /// Interactive login: prompt for whatever was not supplied
    pub async fn login_interactive(
        &mut self,
        email: Option<String>,
        password: Option<String>,
    ) -> Result<()> {
        let email = match email {
            Some(email) => email,
            None => prompt_email(self.last_email())?,
        };
        let password = match password {
            Some(password) => password,
            None => prompt_password()?,
        };
        self.login(&email, &password).await
    }

    pub fn logout(&mut self) {
        let was_authenticated = self.store.auth_state().is_authenticated();
        self.store.logout();
        if was_authenticated {
            println!("Logged out.");
        } else {
            println!("Not logged in.");
        }
    }

    pub fn print_status(&self) {
        match self.store.current_session() {
            Some(session) => {
                println!("Authenticated as {}", session.display_name());
                if let Some(ref id) = session.user_id {
                    println!("  user id:   {}", id);
                }
                println!("  since:     {}", session.created_at.format("%Y-%m-%d %H:%M UTC"));
            }
            None => println!("Not authenticated."),
        }
        println!("  api:       {}", self.config.api_base_url);
    }

    pub fn print_routes(&self) {
        println!("{:<24} login entry point", self.guard.login_path());
        for view in DashboardView::ALL {
            if let Some(path) = view.path() {
                let marker = if path == self.guard.landing_path() { " (landing)" } else { "" };
                println!("{:<24} {}{}", path, view.title(), marker);
            }
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Navigate to `path`: run the guard, then load the view's payloads.
    pub async fn open(&mut self, path: &str) -> Result<()> {
        let resolved = self.guard.resolve(self.store.current_session(), path);
        if let Some(ref from) = resolved.redirected_from {
            println!("{} -> {}", from, resolved.path);
        }
        info!(path = %resolved.path, "Entering view");

        match resolved.destination {
            Destination::Protected(view) => self.render_view(view, &resolved).await,
            Destination::Login | Destination::Fallback => {
                println!("Please log in: dashgate login [email]");
                Ok(())
            }
        }
    }

    async fn render_view(&mut self, view: DashboardView, resolved: &Resolved) -> Result<()> {
        println!("== {} ({}) ==", view.title(), resolved.path);

        let sources = view.data_sources();
        if sources.is_empty() {
            return Ok(());
        }

        let Some(client) = self.authed_client() else {
            // The guard only admits authenticated sessions here
            anyhow::bail!("No session token available");
        };

        let results = join_all(sources.iter().map(|source| {
            let client = client.clone();
            async move { (source.name(), source.fetch(&client).await) }
        }))
        .await;

        let mut payload = Map::new();
        for (name, result) in results {
            match result {
                Ok(value) => {
                    payload.insert(name.to_string(), value);
                }
                Err(ApiError::Unauthorized) => {
                    warn!(source = name, "Token rejected by API");
                    self.store.logout();
                    anyhow::bail!(SESSION_EXPIRED_MESSAGE);
                }
                Err(e) => {
                    warn!(source = name, error = %e, "Failed to load view data");
                    payload.insert(name.to_string(), Value::Null);
                }
            }
        }

        let output = if payload.len() == 1 {
            payload.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null)
        } else {
            Value::Object(payload)
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    /// Release the session store at the end of the run
    pub fn shutdown(self) {
        self.store.dispose();
    }
}

// ============================================================================
// Prompts
// ============================================================================

fn prompt_email(default: Option<&str>) -> Result<String> {
    match default {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match (input.is_empty(), default) {
        (true, Some(last)) => Ok(last.to_string()),
        _ => Ok(input.to_string()),
    }
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}

// ============================================================================
// Input validation
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Reject a login submission before it reaches the session store
pub fn validate_credentials(email: &str, password: &str) -> Result<(), &'static str> {
    if email.trim().is_empty() || password.is_empty() {
        return Err("Email and password required");
    }
    if email.len() > MAX_EMAIL_LENGTH || password.len() > MAX_PASSWORD_LENGTH {
        return Err("Email or password too long");
    }
    if !email.chars().all(is_valid_input_char) || !password.chars().all(is_valid_input_char) {
        return Err("Email and password may not contain control characters");
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
