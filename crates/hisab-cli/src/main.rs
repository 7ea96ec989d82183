//! hisab - command line client for the HisabPro invoicing API.
//!
//! Sign in once, then list, create and chase invoices from the terminal.
//! The session is kept between runs and access tokens are refreshed as
//! needed.

mod app;
mod cli;
mod render;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use cli::Cli;
use hisab_core::{ApiError, AuthFailure, Config};

/// Directory for daily log files; logs go to stderr when unset
const LOG_DIR_ENV: &str = "HISAB_LOG_DIR";

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). The returned guard must be
/// held until exit so buffered file output is flushed.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "hisab.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

/// Human-readable line for a failed command.
fn describe(err: &anyhow::Error) -> String {
    if let Some(api) = err.downcast_ref::<ApiError>() {
        if api.requires_reauth() {
            return "Session expired. Please log in again.".to_string();
        }
        return api.user_message(&api.to_string());
    }
    if let Some(failure) = err.downcast_ref::<AuthFailure>() {
        return failure.message.clone();
    }
    format!("{:#}", err)
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let mut app = App::new(config, cli.api_url)?;

    let result = app.run(cli.command).await;
    if result.is_ok() && app.session_lost() {
        eprintln!("Session expired. Please log in again.");
    }
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();
    info!("hisab starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Command failed");
            eprintln!("{}", describe(&e));
            ExitCode::FAILURE
        }
    }
}
