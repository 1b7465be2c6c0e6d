//! demo — wires a `UserService` to a storage backend and runs the walkthrough.
//!
//! The walkthrough creates `sample1` and `sample2`, lists all users, renames
//! the second to `sample_sample2`, lists again and looks the renamed user up.
//!
//! Run:
//! ```bash
//! # SQLite in memory (default)
//! cargo run -p demo
//!
//! # in-memory repository, JSON output
//! STORAGE_PROVIDER=memory LOG_FORMAT=json cargo run -p demo
//!
//! # Redis list (requires a running server)
//! STORAGE_PROVIDER=redis REDIS_URL=redis://127.0.0.1/ REDIS_FLUSH_ON_START=1 \
//!   cargo run -p demo --features redis
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;
mod wiring;

use binder::ResolveError;
use domain::service::{UserService, Walkthrough};
use domain::CoreError;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("report encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_destructive();

    if let Err(e) = run(&cfg) {
        error!(error = %e, "demo failed");
        std::process::exit(1);
    }
}

fn run(cfg: &config::Config) -> Result<(), DemoError> {
    let container = wiring::build_container(cfg)?;
    let service = container.get::<UserService>()?;
    info!(provider = ?cfg.storage_provider, "user service ready");

    let report = service.walkthrough()?;
    print_report(&report, cfg.log_format)?;

    // release the backend connection before tearing the container down
    drop(service);
    container.shutdown();
    Ok(())
}

fn print_report(report: &Walkthrough, format: config::LogFormat) -> Result<(), DemoError> {
    match format {
        config::LogFormat::Json => println!("{}", serde_json::to_string(report)?),
        config::LogFormat::Pretty => {
            for user in &report.before {
                println!("{}", user);
            }
            for user in &report.after {
                println!("{}", user);
            }
            match &report.found {
                Some(user) => println!("{}", user),
                None => println!("{} not found", report.renamed.name),
            }
        }
    }
    Ok(())
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}
