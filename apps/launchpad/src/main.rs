//! # Launchpad
//!
//! The binary of the Launchpad site deployment tracker.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   apps/launchpad (THE BINARY)            │
//! │                                                          │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────────────────┐  │
//! │  │   CLI    │   │ HTTP API │   │ Background services  │  │
//! │  │  (clap)  │   │  (axum)  │   │ auto-save, sessions  │  │
//! │  └────┬─────┘   └────┬─────┘   └──────────┬───────────┘  │
//! │       └──────────────┼────────────────────┘              │
//! │                      ▼                                   │
//! │              ┌────────────────┐                          │
//! │              │ launchpad-core │                          │
//! │              │  (THE RULES)   │                          │
//! │              └────────────────┘                          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! launchpad init
//! launchpad server --port 8080
//! launchpad access --role ops_manager --path /deployment/12
//! ```

use clap::Parser;
use launchpad::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // LAUNCHPAD_LOG_FORMAT=json switches to machine-parseable output.
    let log_format = std::env::var("LAUNCHPAD_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "launchpad=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        println!("Launchpad v{}", env!("CARGO_PKG_VERSION"));
        println!();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
