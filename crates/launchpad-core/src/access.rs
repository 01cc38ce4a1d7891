//! # Access Evaluator
//!
//! The single authorization table for Launchpad: role × page → access level
//! and permitted actions, plus role → capability grants.
//!
//! Every query is a pure lookup. Misses deny. Nothing here panics, so
//! [`can_access_page`] is total over every role and every input string.
//!
//! ## Path Matching
//!
//! Paths are normalized first (query string and fragment removed, duplicate
//! and trailing slashes collapsed). A rule matches when the path equals its
//! pattern, or, for prefix rules, when the path continues below the pattern on
//! a segment boundary: `/sites` covers `/sites/12/study` but not `/sitesmap`.

use crate::roles::Role;
use serde::{Deserialize, Serialize};

// =============================================================================
// ACTIONS, LEVELS, PERMISSIONS
// =============================================================================

/// An action a role may take on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageAction {
    Create,
    Read,
    Update,
    Approve,
    Assign,
    Delete,
}

/// How much of a page's data a role sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    None,
    Own,
    Assigned,
    Full,
}

/// A capability granted to a role independent of any page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewDashboard,
    CreateSites,
    EditSiteInfo,
    AssignUsers,
    ViewAllSites,
    ManageUsers,
    ConductSiteStudies,
    UploadFindings,
    AddSiteGeolocation,
    ScopeHardware,
    ApproveHardware,
    ManageProcurement,
    ManageDeployments,
    SignOffGoLive,
    ArchiveSites,
    ViewAuditLogs,
}

/// Capability grants per role.
#[must_use]
pub fn permissions(role: Role) -> &'static [Permission] {
    use Permission::*;
    match role {
        Role::Admin => &[
            ViewDashboard,
            CreateSites,
            EditSiteInfo,
            AssignUsers,
            ViewAllSites,
            ManageUsers,
            AddSiteGeolocation,
            ApproveHardware,
            ManageProcurement,
            ManageDeployments,
            SignOffGoLive,
            ArchiveSites,
            ViewAuditLogs,
        ],
        Role::OpsManager => &[
            ViewDashboard,
            CreateSites,
            ConductSiteStudies,
            ApproveHardware,
            ManageProcurement,
        ],
        Role::DeploymentEngineer => &[
            ViewDashboard,
            ConductSiteStudies,
            UploadFindings,
            AddSiteGeolocation,
            ScopeHardware,
            ManageDeployments,
            SignOffGoLive,
        ],
        Role::User => &[ViewDashboard],
    }
}

/// Whether `role` holds `permission`.
#[must_use]
pub fn has_permission(role: Role, permission: Permission) -> bool {
    permissions(role).contains(&permission)
}

// =============================================================================
// PAGE RULES
// =============================================================================

/// How a rule's pattern is compared with a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMatch {
    Exact,
    Prefix,
}

/// One row of the authorization table.
#[derive(Debug, Clone, Copy)]
pub struct PageRule {
    pub pattern: &'static str,
    pub matching: PathMatch,
    pub level: AccessLevel,
    pub actions: &'static [PageAction],
    pub message: Option<&'static str>,
}

impl PageRule {
    /// Whether this rule covers an already normalized path.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self.matching {
            PathMatch::Exact => path == self.pattern,
            PathMatch::Prefix => {
                path == self.pattern
                    || path
                        .strip_prefix(self.pattern)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

const fn exact(pattern: &'static str, level: AccessLevel, actions: &'static [PageAction]) -> PageRule {
    PageRule {
        pattern,
        matching: PathMatch::Exact,
        level,
        actions,
        message: None,
    }
}

const fn prefix(
    pattern: &'static str,
    level: AccessLevel,
    actions: &'static [PageAction],
    message: Option<&'static str>,
) -> PageRule {
    PageRule {
        pattern,
        matching: PathMatch::Prefix,
        level,
        actions,
        message,
    }
}

use AccessLevel::{Assigned, Full, Own};
use PageAction::{Approve, Assign, Create, Delete, Read, Update};

const ALL_ACTIONS: &[PageAction] = &[Create, Read, Update, Approve, Assign, Delete];

const ADMIN_RULES: &[PageRule] = &[
    exact("/dashboard", Full, &[Read]),
    prefix("/sites", Full, &[Create, Read, Update, Assign, Delete], None),
    prefix("/site-study", Full, &[Read, Update], None),
    prefix("/approvals-procurement", Full, &[Read, Update, Approve], None),
    prefix("/deployment", Full, &[Read, Update, Assign], None),
    prefix("/assets", Full, &[Create, Read, Update, Delete], None),
    prefix("/users", Full, &[Create, Read, Update, Assign, Delete], None),
    prefix("/audit-logs", Full, &[Read], None),
    prefix("/platform-configuration", Full, ALL_ACTIONS, None),
    prefix("/admin", Full, ALL_ACTIONS, None),
];

const OPS_MANAGER_RULES: &[PageRule] = &[
    exact("/dashboard", Full, &[Read]),
    prefix("/ops-manager", Full, &[Read, Update], None),
    prefix(
        "/sites",
        Assigned,
        &[Create, Read, Update],
        Some("Viewing assigned sites only"),
    ),
    prefix(
        "/approvals-procurement",
        Full,
        &[Read, Update, Approve],
        Some("Full access to approvals"),
    ),
    prefix(
        "/deployment",
        Assigned,
        &[Read],
        Some("Viewing assigned deployments only"),
    ),
    prefix(
        "/assets",
        Full,
        &[Read, Update],
        Some("Full access to all assets"),
    ),
];

const DEPLOYMENT_ENGINEER_RULES: &[PageRule] = &[
    exact("/dashboard", Full, &[Read]),
    prefix(
        "/deployment",
        Assigned,
        &[Read, Update],
        Some("Viewing assigned deployments only"),
    ),
    prefix("/site-study", Assigned, &[Create, Read, Update], None),
    prefix(
        "/sites",
        Assigned,
        &[Read, Update],
        Some("Viewing assigned sites only"),
    ),
    prefix(
        "/approvals-procurement",
        Own,
        &[Create, Read],
        Some("Viewing own submissions and related approvals only"),
    ),
    prefix(
        "/assets",
        Assigned,
        &[Read],
        Some("Viewing assigned site assets only"),
    ),
];

const USER_RULES: &[PageRule] = &[exact("/dashboard", Full, &[Read])];

/// The page rules of a role.
#[must_use]
pub fn page_rules(role: Role) -> &'static [PageRule] {
    match role {
        Role::Admin => ADMIN_RULES,
        Role::OpsManager => OPS_MANAGER_RULES,
        Role::DeploymentEngineer => DEPLOYMENT_ENGINEER_RULES,
        Role::User => USER_RULES,
    }
}

// =============================================================================
// EVALUATION
// =============================================================================

/// Normalize a navigation path for rule matching.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let without_query = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = without_query
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}

/// The rule that grants `role` access to `path`, if any.
#[must_use]
pub fn matching_rule(role: Role, path: &str) -> Option<&'static PageRule> {
    let normalized = normalize_path(path);
    page_rules(role)
        .iter()
        .find(|rule| rule.matches(&normalized))
}

/// Whether `role` may open `path`.
#[must_use]
pub fn can_access_page(role: Role, path: &str) -> bool {
    matching_rule(role, path).is_some()
}

/// Whether `role` may perform `action` on `path`.
#[must_use]
pub fn can_perform(role: Role, path: &str, action: PageAction) -> bool {
    matching_rule(role, path).is_some_and(|rule| rule.actions.contains(&action))
}

/// Every page pattern a role may open.
#[must_use]
pub fn accessible_pages(role: Role) -> Vec<&'static str> {
    page_rules(role).iter().map(|rule| rule.pattern).collect()
}

/// Access decision for one navigation tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabAccess {
    pub can_access: bool,
    pub access_level: AccessLevel,
    pub message: Option<String>,
}

impl TabAccess {
    fn denied(message: &str) -> Self {
        Self {
            can_access: false,
            access_level: AccessLevel::None,
            message: Some(message.to_string()),
        }
    }
}

/// Access decision for `path` under the current role.
///
/// `None` means the user has no role at all.
#[must_use]
pub fn tab_access(role: Option<Role>, path: &str) -> TabAccess {
    let Some(role) = role else {
        return TabAccess::denied("No role assigned");
    };

    if let Some(rule) = matching_rule(role, path) {
        return TabAccess {
            can_access: true,
            access_level: rule.level,
            message: rule.message.map(str::to_string),
        };
    }

    let granted_to: Vec<Role> = Role::ALL
        .into_iter()
        .filter(|other| can_access_page(*other, path))
        .collect();

    if granted_to.is_empty() {
        TabAccess::denied("Page not found")
    } else if granted_to == [Role::Admin] {
        TabAccess::denied("Admin access required")
    } else {
        TabAccess::denied("Access denied")
    }
}

// =============================================================================
// TESTS
// =============================================================================
