//! dashgate - command-line front end for the admin dashboard.
//!
//! Logs in against the dashboard API, keeps the session between runs, and
//! opens dashboard views through the route guard.

mod app;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dashgate_core::api::{DEMO_EMAIL, DEMO_PASSWORD};
use dashgate_core::config::Config;

use app::App;

/// Log file name in the data directory
const LOG_FILE: &str = "dashgate.log";

const USAGE: &str = "\
Usage: dashgate <command>

Commands:
  login [email] [--demo]   Log in (prompts for anything missing)
  logout                   Clear the saved session
  status                   Show the current session
  open <path>              Navigate to a dashboard path, e.g. /dashboard/users
  routes                   List the dashboard paths

Environment:
  DASHGATE_API_URL, DASHGATE_STORAGE, DASHGATE_EMAIL, DASHGATE_PASSWORD, RUST_LOG";

/// Initialize the tracing subscriber for logging.
/// Returns the guard that flushes the file writer on drop.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = Config::load().unwrap_or_default().data_dir();
    let (file_layer, guard) = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::never(&log_dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let log_guard = init_tracing();
    info!("dashgate starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    let mut app = App::new()?;
    let result = run_command(&mut app, command, &args[1..]).await;
    app.shutdown();

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_command(app: &mut App, command: &str, rest: &[String]) -> Result<()> {
    match command {
        "login" => {
            let demo = rest.iter().any(|a| a == "--demo");
            let positional = rest.iter().find(|a| !a.starts_with("--")).cloned();

            let (email, password) = if demo {
                (Some(DEMO_EMAIL.to_string()), Some(DEMO_PASSWORD.to_string()))
            } else {
                (
                    positional.or_else(|| std::env::var("DASHGATE_EMAIL").ok()),
                    std::env::var("DASHGATE_PASSWORD").ok(),
                )
            };
            app.login_interactive(email, password).await
        }
        "logout" => {
            app.logout();
            Ok(())
        }
        "status" => {
            app.print_status();
            Ok(())
        }
        "open" => {
            let path = rest
                .first()
                .ok_or_else(|| anyhow::anyhow!("Missing path. Usage: dashgate open <path>"))?;
            app.open(path).await
        }
        "routes" => {
            app.print_routes();
            Ok(())
        }
        "help" | "-h" | "--help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => anyhow::bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}
