//! # Role Registry
//!
//! The closed set of roles and their display metadata.
//!
//! Roles are compiled in and looked up by identifier. Unknown identifiers do
//! not fail: they render through [`role_display`] with the raw string as the
//! label (or "Unknown" when empty) and the neutral color token.

use crate::LaunchpadError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Color token used for roles the registry does not know.
pub const NEUTRAL_COLOR: &str = "text-gray-600";

/// Icon reference used for roles the registry does not know.
pub const NEUTRAL_ICON: &str = "users";

/// A named permission profile assigned to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    OpsManager,
    DeploymentEngineer,
    User,
}

impl Role {
    /// Every role, in registry order.
    pub const ALL: [Role; 4] = [
        Role::Admin,
        Role::OpsManager,
        Role::DeploymentEngineer,
        Role::User,
    ];

    /// Stable identifier used on the wire and in configuration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::OpsManager => "ops_manager",
            Role::DeploymentEngineer => "deployment_engineer",
            Role::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LaunchpadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(Role::Admin),
            "ops_manager" => Ok(Role::OpsManager),
            "deployment_engineer" => Ok(Role::DeploymentEngineer),
            "user" => Ok(Role::User),
            other => Err(LaunchpadError::Validation(format!(
                "unknown role '{}'",
                other
            ))),
        }
    }
}

/// Display metadata for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleConfig {
    pub key: Role,
    pub display_name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
}

const ADMIN: RoleConfig = RoleConfig {
    key: Role::Admin,
    display_name: "Admin",
    description: "Create sites, assign Ops Managers and Deployment Engineers, manage site lifecycle",
    icon: "shield",
    color: "text-red-600",
};

const OPS_MANAGER: RoleConfig = RoleConfig {
    key: Role::OpsManager,
    display_name: "Ops Manager",
    description: "Approve hardware requests and manage site approvals",
    icon: "users",
    color: "text-blue-600",
};

const DEPLOYMENT_ENGINEER: RoleConfig = RoleConfig {
    key: Role::DeploymentEngineer,
    display_name: "Deployment Engineer",
    description: "Conduct site studies, update site status, and manage deployment",
    icon: "wrench",
    color: "text-green-600",
};

const USER: RoleConfig = RoleConfig {
    key: Role::User,
    display_name: "User",
    description: "Basic user access",
    icon: "users",
    color: NEUTRAL_COLOR,
};

/// Look up the display metadata for a role.
#[must_use]
pub fn get_role_config(role: Role) -> &'static RoleConfig {
    match role {
        Role::Admin => &ADMIN,
        Role::OpsManager => &OPS_MANAGER,
        Role::DeploymentEngineer => &DEPLOYMENT_ENGINEER,
        Role::User => &USER,
    }
}

/// Rendering of a possibly unknown role identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDisplay {
    pub key: String,
    pub display_name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub known: bool,
}

/// Render a raw role identifier, falling back to a neutral rendering.
#[must_use]
pub fn role_display(raw: &str) -> RoleDisplay {
    match raw.parse::<Role>() {
        Ok(role) => {
            let config = get_role_config(role);
            RoleDisplay {
                key: role.as_str().to_string(),
                display_name: config.display_name.to_string(),
                description: config.description.to_string(),
                icon: config.icon.to_string(),
                color: config.color.to_string(),
                known: true,
            }
        }
        Err(_) => {
            let label = raw.trim();
            RoleDisplay {
                key: label.to_string(),
                display_name: if label.is_empty() {
                    "Unknown".to_string()
                } else {
                    label.to_string()
                },
                description: String::new(),
                icon: NEUTRAL_ICON.to_string(),
                color: NEUTRAL_COLOR.to_string(),
                known: false,
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_round_trips_through_its_identifier() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().ok(), Some(role));
            assert_eq!(get_role_config(role).key, role);
        }
    }

    #[test]
    fn unknown_role_renders_raw_label() {
        let display = role_display("auditor");
        assert!(!display.known);
        assert_eq!(display.display_name, "auditor");
        assert_eq!(display.color, NEUTRAL_COLOR);
    }

    #[test]
    fn empty_role_renders_unknown() {
        assert_eq!(role_display("  ").display_name, "Unknown");
    }

    #[test]
    fn known_role_renders_registry_entry() {
        let display = role_display("ops_manager");
        assert!(display.known);
        assert_eq!(display.display_name, "Ops Manager");
    }
}
