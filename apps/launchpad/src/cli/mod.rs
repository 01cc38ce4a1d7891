//! # Launchpad CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `roles` - List roles and the pages they reach
//! - `stages` - List workflow statuses
//! - `endpoints` - Print the backend endpoint table
//! - `access` - Check one role against one path
//! - `transitions` - Show where a role may move a site from a status
//! - `init` - Write a starter config and create the database
//! - `compact` - Reclaim free space in the redb database

mod commands;

use clap::{Parser, Subcommand};
use launchpad_core::LaunchpadError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Launchpad - site deployment tracker
///
/// Serves the deployment workflow API and answers access questions offline.
#[derive(Parser, Debug)]
#[command(name = "launchpad")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List roles with their display data and pages
    Roles,

    /// List workflow statuses in order
    Stages,

    /// Print the backend REST endpoint table
    Endpoints,

    /// Check whether a role may open a path
    Access {
        /// Role key, e.g. ops_manager
        #[arg(short, long)]
        role: String,

        /// Page path, e.g. /deployment/12
        #[arg(short, long)]
        path: String,
    },

    /// Show the statuses a role may move a site to
    Transitions {
        /// Current status, e.g. hardware_scoped
        #[arg(short, long)]
        from: String,

        /// Role key
        #[arg(short, long)]
        role: String,
    },

    /// Write a starter config file and create the database
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Compact the redb database named in the config
    Compact,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), LaunchpadError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&cli.config, host, port).await,
        Some(Commands::Roles) => cmd_roles(json_mode),
        Some(Commands::Stages) | None => cmd_stages(json_mode),
        Some(Commands::Endpoints) => cmd_endpoints(&cli.config, json_mode),
        Some(Commands::Access { role, path }) => cmd_access(&role, &path, json_mode),
        Some(Commands::Transitions { from, role }) => cmd_transitions(&from, &role, json_mode),
        Some(Commands::Init { force }) => cmd_init(&cli.config, force),
        Some(Commands::Compact) => cmd_compact(&cli.config),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "launchpad",
            "access",
            "--role",
            "admin",
            "--path",
            "/insights",
            "--json-mode",
        ])
        .unwrap();
        assert!(cli.json_mode);
        assert_eq!(cli.config, PathBuf::from("launchpad.toml"));
        match cli.command {
            Some(Commands::Access { role, path }) => {
                assert_eq!(role, "admin");
                assert_eq!(path, "/insights");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn server_overrides_are_optional() {
        let cli = Cli::try_parse_from(["launchpad", "server", "-p", "9000"]).unwrap();
        match cli.command {
            Some(Commands::Server { host, port }) => {
                assert!(host.is_none());
                assert_eq!(port, Some(9000));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn access_requires_both_arguments() {
        assert!(Cli::try_parse_from(["launchpad", "access", "--role", "admin"]).is_err());
    }
}
