//! # CLI Command Implementations

use crate::api;
use crate::api::types::{RoleInfo, StageInfo};
use crate::config::{BackendKind, Config};
use crate::endpoints::TABLE;
use launchpad_core::{
    GuardOutcome, LaunchpadError, RedbStore, Role, RouteGuard, SiteStatus, next_valid_statuses,
    tab_access,
};
use std::path::Path;

fn print_json(value: &impl serde::Serialize) -> Result<(), LaunchpadError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| LaunchpadError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    config_path: &Path,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), LaunchpadError> {
    let mut config = Config::load(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    println!("Launchpad Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.server.host);
    println!("  Port:     {}", config.server.port);
    println!("  Backend:  {:?}", config.storage.backend);
    if config.storage.backend == BackendKind::Redb {
        println!("  Database: {}", config.storage.path.display());
    }
    println!("  Users:    {}", config.users.len());
    println!(
        "  Geocoding: {}",
        if config.geocoding.api_key.is_some() {
            "configured"
        } else {
            "no API key"
        }
    );
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(config).await
}

// =============================================================================
// METADATA COMMANDS
// =============================================================================

/// List every role.
pub fn cmd_roles(json_mode: bool) -> Result<(), LaunchpadError> {
    let roles: Vec<RoleInfo> = Role::ALL.into_iter().map(RoleInfo::for_role).collect();
    if json_mode {
        return print_json(&roles);
    }

    println!("Launchpad Roles");
    println!("===============");
    for role in roles {
        println!();
        println!("{} ({})", role.display_name, role.key);
        println!("  {}", role.description);
        println!("  Pages: {}", role.pages.join(", "));
    }
    Ok(())
}

/// List workflow statuses in display order.
pub fn cmd_stages(json_mode: bool) -> Result<(), LaunchpadError> {
    let stages: Vec<StageInfo> = SiteStatus::ALL
        .into_iter()
        .map(StageInfo::for_status)
        .collect();
    if json_mode {
        return print_json(&stages);
    }

    println!("Workflow Stages");
    println!("===============");
    for stage in stages {
        let next: Vec<String> = stage.successors.iter().map(|s| s.to_string()).collect();
        println!(
            "{:>2}. {:<24} -> {}",
            stage.rank,
            stage.label,
            if stage.terminal {
                "(terminal)".to_string()
            } else {
                next.join(", ")
            }
        );
    }
    Ok(())
}

/// Print the backend endpoint table.
pub fn cmd_endpoints(config_path: &Path, json_mode: bool) -> Result<(), LaunchpadError> {
    let config = Config::load(config_path)?;
    let base = config.api.url();
    if json_mode {
        return print_json(&serde_json::json!({ "base_url": base, "endpoints": TABLE }));
    }

    println!("Base URL: {}", base);
    let mut group = "";
    for entry in TABLE {
        if entry.group != group {
            group = entry.group;
            println!();
            println!("[{}]", group);
        }
        println!(
            "  {:<7} {:<40} {}",
            format!("{:?}", entry.verb).to_uppercase(),
            entry.template,
            entry.name
        );
    }
    Ok(())
}

// =============================================================================
// ACCESS COMMANDS
// =============================================================================

/// Check one role against one path.
pub fn cmd_access(role: &str, path: &str, json_mode: bool) -> Result<(), LaunchpadError> {
    let role: Role = role.parse()?;
    let tab = tab_access(Some(role), path);
    let outcome = RouteGuard::new(path.to_string()).resolve(Some(role), false);

    if json_mode {
        return print_json(&api::types::AccessResponse::new(
            path.to_string(),
            Some(role),
            tab,
            outcome,
        ));
    }

    println!("Role:   {}", role);
    println!("Path:   {}", path);
    println!(
        "Access: {} ({:?})",
        if tab.can_access { "allowed" } else { "denied" },
        tab.access_level
    );
    if let Some(message) = &tab.message {
        println!("Note:   {}", message);
    }
    match outcome {
        GuardOutcome::Redirect { to, reason } => println!("Guard:  redirect to {} ({})", to, reason),
        GuardOutcome::Denied { message } | GuardOutcome::NoRole { message } => {
            println!("Guard:  {}", message);
        }
        GuardOutcome::Render => println!("Guard:  render"),
        GuardOutcome::Pending => println!("Guard:  pending"),
    }
    Ok(())
}

/// Show the statuses `role` may move a site to from `from`.
pub fn cmd_transitions(from: &str, role: &str, json_mode: bool) -> Result<(), LaunchpadError> {
    let from: SiteStatus = from.parse()?;
    let role: Role = role.parse()?;
    let next = next_valid_statuses(from, role);

    if json_mode {
        return print_json(&serde_json::json!({ "from": from, "role": role, "next": next }));
    }

    if next.is_empty() {
        println!("{} cannot move a site out of {}", role, from.label());
    } else {
        println!("From {} as {}:", from.label(), role);
        for status in next {
            println!("  -> {}", status.label());
        }
    }
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Write a starter config and create the redb database it names.
pub fn cmd_init(config_path: &Path, force: bool) -> Result<(), LaunchpadError> {
    if config_path.exists() && !force {
        return Err(LaunchpadError::Validation(format!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let sample = Config::sample();
    let config = Config::from_toml(&sample)?;
    std::fs::write(config_path, &sample).map_err(|e| {
        LaunchpadError::IoError(format!("Cannot write {}: {}", config_path.display(), e))
    })?;
    println!("Wrote {}", config_path.display());

    let db_path = match config_path.parent() {
        Some(dir) => dir.join(&config.storage.path),
        None => config.storage.path.clone(),
    };
    let registry = api::open_registry(&Config {
        storage: crate::config::StorageConfig {
            path: db_path.clone(),
            ..config.storage
        },
        ..Config::default()
    })?;
    tracing::debug!(persistent = registry.is_persistent(), "Store initialized");
    println!("Initialized database at {}", db_path.display());
    Ok(())
}

/// Compact the configured redb database.
pub fn cmd_compact(config_path: &Path) -> Result<(), LaunchpadError> {
    let config = Config::load(config_path)?;
    if config.storage.backend != BackendKind::Redb {
        return Err(LaunchpadError::Validation(
            "compact needs the redb backend".to_string(),
        ));
    }
    let path = &config.storage.path;
    if !path.exists() {
        return Err(LaunchpadError::IoError(format!(
            "{} does not exist",
            path.display()
        )));
    }

    let mut store = RedbStore::open(path)?;
    let reclaimed = store.compact()?;
    tracing::info!(path = %path.display(), reclaimed, "Database compacted");
    if reclaimed {
        println!("Compacted {}", path.display());
    } else {
        println!("{} is already compact", path.display());
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
