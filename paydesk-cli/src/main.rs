//! paydesk: command-line client for the organization payments API
//!
//! Keeps a session file next to the working directory, refreshes the access
//! token on demand and prints server results as text or JSON.

mod cli;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use paydesk_client::{AuthApi, AuthController, ErrorReport, HttpClient, PaymentsApi, SessionStore};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cli::{App, Commands};
use config::Config;

#[derive(Parser)]
#[command(name = "paydesk")]
#[command(about = "Command-line client for the organization payments API")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "paydesk.toml")]
    config: PathBuf,

    /// API base URL (overrides config file)
    #[arg(long, env = "PAYDESK_BASE_URL")]
    base_url: Option<String>,

    /// Session file (overrides config file)
    #[arg(long, env = "PAYDESK_SESSION_FILE")]
    session_file: Option<PathBuf>,

    /// Log requests and token refreshes
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

const LOG_TARGETS: [&str; 2] = ["paydesk", "paydesk_client"];

/// Directives layered over `RUST_LOG`.
///
/// `--verbose` forces debug for our crates; otherwise a target already named
/// in `RUST_LOG` keeps its level and the rest default to info.
fn default_directives(rust_log: &str, verbose: bool) -> Vec<String> {
    LOG_TARGETS
        .iter()
        .filter(|target| verbose || !mentions_target(rust_log, target))
        .map(|target| format!("{}={}", target, if verbose { "debug" } else { "info" }))
        .collect()
}

fn mentions_target(rust_log: &str, target: &str) -> bool {
    rust_log.split(',').any(|directive| {
        directive
            .trim()
            .strip_prefix(target)
            .map_or(false, |rest| {
                rest.is_empty() || rest.starts_with(['=', '[', ':'])
            })
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let mut filter = EnvFilter::from_default_env();
    for directive in default_directives(&rust_log, cli.verbose) {
        filter = filter.add_directive(directive.parse()?);
    }
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let mut config = Config::load(&cli.config)?;

    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }
    if let Some(session_file) = cli.session_file {
        config.session.file = session_file;
    }

    debug!("API: {}", config.api.base_url);
    debug!("Session file: {}", config.session.file.display());

    let session = Arc::new(SessionStore::file(&config.session.file));
    let http = Arc::new(HttpClient::new(config.api, session.clone())?);
    let auth = Arc::new(AuthController::new(AuthApi::new(http.clone()), session));
    let watcher = auth.watch(http.subscribe());

    let app = App {
        auth,
        payments: PaymentsApi::new(http),
    };

    let result = cli::execute(&app, cli.command).await;
    watcher.abort();

    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            let report = ErrorReport::from_error(e.as_ref());
            if let Some(status) = report.status {
                info!(status, "Request failed");
            }
            eprintln!("Error: {}", report);
            if let Some(data) = report.data {
                if let Ok(pretty) = serde_json::to_string_pretty(&data) {
                    eprintln!("{}", pretty);
                }
            }
            std::process::exit(1);
        }
    }
}
