//! # Configuration
//!
//! Launchpad reads an optional `launchpad.toml` and then applies environment
//! overrides. Every field has a default, so an empty file (or no file) gives
//! a working in-memory server with no users.
//!
//! ## Environment Overrides
//!
//! - `LAUNCHPAD_HOST`, `LAUNCHPAD_PORT`: bind address
//! - `LAUNCHPAD_BACKEND`: `memory` or `redb`
//! - `LAUNCHPAD_DB`: redb database path
//! - `LAUNCHPAD_SESSION_TTL_SECS`: session lifetime
//! - `LAUNCHPAD_API_BASE_URL`: base URL of the REST endpoint table
//! - `LOCATIONIQ_API_KEY`, `LOCATIONIQ_BASE_URL`: geocoding upstream

use launchpad_core::{AutoSavePolicy, LaunchpadError, Role, primitives::DEFAULT_GEOCODE_LIMIT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "launchpad.toml";

/// Default LocationIQ region endpoint.
pub const DEFAULT_GEOCODING_URL: &str = "https://us1.locationiq.com/v1";

/// Default base URL for the REST endpoint table.
pub const DEFAULT_API_BASE_URL: &str = "https://api.sqlaunchpad.com/api";

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Where records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Memory,
    Redb,
}

impl std::str::FromStr for BackendKind {
    type Err = LaunchpadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "memory" => Ok(Self::Memory),
            "redb" => Ok(Self::Redb),
            other => Err(LaunchpadError::Validation(format!(
                "unknown backend '{}', expected memory or redb",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            path: PathBuf::from("launchpad.redb"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of a session after its last request.
    pub ttl_secs: u64,
    /// How often the monitor purges expired sessions.
    pub monitor_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60 * 60,
            monitor_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    /// How often the driver looks for due sections.
    pub tick_ms: u64,
    pub debounce_ms: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        let policy = AutoSavePolicy::default();
        Self {
            tick_ms: 250,
            debounce_ms: policy.debounce_ms,
            max_attempts: policy.max_attempts,
            retry_delay_ms: policy.retry_delay_ms,
        }
    }
}

impl AutoSaveConfig {
    #[must_use]
    pub fn policy(&self) -> AutoSavePolicy {
        AutoSavePolicy {
            debounce_ms: self.debounce_ms,
            max_attempts: self.max_attempts.max(1),
            retry_delay_ms: self.retry_delay_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub base_url: String,
    /// Provider key. Requests fail with 500 while it is missing.
    pub api_key: Option<String>,
    pub default_limit: u32,
    pub timeout_secs: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEOCODING_URL.to_string(),
            api_key: None,
            default_limit: DEFAULT_GEOCODE_LIMIT,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl ApiConfig {
    /// The API root, with `/api` appended when the base URL lacks it.
    #[must_use]
    pub fn url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.contains("/api") {
            base.to_string()
        } else {
            format!("{}/api", base)
        }
    }
}

/// One entry of the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Roles the user may act under. Empty means "no role assigned".
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Bearer token presented by the user.
    pub token: String,
}

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub autosave: AutoSaveConfig,
    pub geocoding: GeocodingConfig,
    pub api: ApiConfig,
    pub users: Vec<UserEntry>,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, LaunchpadError> {
        let config: Config = toml::from_str(text)
            .map_err(|e| LaunchpadError::SerializationError(format!("launchpad.toml: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file at `path` if it exists, then apply the process environment.
    pub fn load(path: &Path) -> Result<Self, LaunchpadError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|e| {
                LaunchpadError::IoError(format!("Cannot read {}: {}", path.display(), e))
            })?;
            Self::from_toml(&text)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), LaunchpadError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("LAUNCHPAD_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("LAUNCHPAD_PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                LaunchpadError::Validation(format!("LAUNCHPAD_PORT is not a port: {}", port))
            })?;
        }
        if let Some(backend) = get("LAUNCHPAD_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(path) = get("LAUNCHPAD_DB") {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(ttl) = get("LAUNCHPAD_SESSION_TTL_SECS") {
            self.session.ttl_secs = ttl.trim().parse().map_err(|_| {
                LaunchpadError::Validation(format!("LAUNCHPAD_SESSION_TTL_SECS: {}", ttl))
            })?;
        }
        if let Some(url) = get("LAUNCHPAD_API_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(key) = get("LOCATIONIQ_API_KEY") {
            self.geocoding.api_key = Some(key);
        }
        if let Some(url) = get("LOCATIONIQ_BASE_URL") {
            self.geocoding.base_url = url;
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), LaunchpadError> {
        let mut ids = std::collections::BTreeSet::new();
        let mut tokens = std::collections::BTreeSet::new();
        for user in &self.users {
            if user.id.trim().is_empty() {
                return Err(LaunchpadError::Validation("user id is required".to_string()));
            }
            if user.token.len() < 8 {
                return Err(LaunchpadError::Validation(format!(
                    "token of user '{}' is shorter than 8 characters",
                    user.id
                )));
            }
            if !ids.insert(user.id.as_str()) {
                return Err(LaunchpadError::Validation(format!(
                    "duplicate user id '{}'",
                    user.id
                )));
            }
            if !tokens.insert(user.token.as_str()) {
                return Err(LaunchpadError::Validation(format!(
                    "user '{}' reuses another user's token",
                    user.id
                )));
            }
        }
        if self.session.ttl_secs == 0 {
            return Err(LaunchpadError::Validation(
                "session.ttl_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// A starter configuration, written by `launchpad init`.
    #[must_use]
    pub fn sample() -> String {
        r#"# Launchpad configuration

[server]
host = "127.0.0.1"
port = 8080

[storage]
backend = "redb"
path = "launchpad.redb"

[session]
ttl_secs = 3600
monitor_interval_secs = 30

[autosave]
tick_ms = 250
debounce_ms = 500
max_attempts = 3
retry_delay_ms = 1000

[geocoding]
# api_key is read from LOCATIONIQ_API_KEY when unset here
base_url = "https://us1.locationiq.com/v1"
default_limit = 5

[[users]]
id = "admin"
name = "Administrator"
email = "admin@example.com"
roles = ["admin"]
token = "change-me-admin-token"
"#
        .to_string()
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
    fn empty_document_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.geocoding.default_limit, 5);
        assert_eq!(config.autosave.policy(), AutoSavePolicy::default());
    }

    #[test]
    fn sample_parses() {
        let config = Config::from_toml(&Config::sample()).unwrap();
        assert_eq!(config.storage.backend, BackendKind::Redb);
        assert_eq!(config.users.len(), 1);
        assert_eq!(config.users[0].roles, vec![Role::Admin]);
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = Config::from_toml("[server]\nport = 9000\n").unwrap();
        config
            .apply_env(|key| match key {
                "LAUNCHPAD_PORT" => Some("9100".to_string()),
                "LOCATIONIQ_API_KEY" => Some("pk.test".to_string()),
                "LAUNCHPAD_BACKEND" => Some("redb".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.geocoding.api_key.as_deref(), Some("pk.test"));
        assert_eq!(config.storage.backend, BackendKind::Redb);
    }

    #[test]
    fn blank_environment_values_are_ignored() {
        let mut config = Config::default();
        config
            .apply_env(|key| (key == "LOCATIONIQ_API_KEY").then(|| "  ".to_string()))
            .unwrap();
        assert!(config.geocoding.api_key.is_none());
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_env(|key| (key == "LAUNCHPAD_PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(LaunchpadError::Validation(_))));
    }

    #[test]
    fn duplicate_tokens_are_rejected() {
        let text = r#"
[[users]]
id = "a"
name = "A"
token = "same-token-123"

[[users]]
id = "b"
name = "B"
token = "same-token-123"
"#;
        assert!(Config::from_toml(text).is_err());
    }

    #[test]
    fn api_url_appends_api_segment() {
        let api = ApiConfig {
            base_url: "https://backend.example.com/".to_string(),
        };
        assert_eq!(api.url(), "https://backend.example.com/api");
        assert_eq!(ApiConfig::default().url(), DEFAULT_API_BASE_URL);
    }
}
