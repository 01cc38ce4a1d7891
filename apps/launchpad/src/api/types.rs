//! # API Request/Response Types
//!
//! JSON structures for the HTTP API. Domain records (sites, approvals,
//! alerts) are returned as the core serializes them; this module only adds
//! the envelopes and request bodies around them.

use crate::monitor::SessionInfo;
use launchpad_core::{
    AccessLevel, AlertView, GuardOutcome, LaunchpadError, NewSite, Role, Scoping, Site, SiteStatus,
    StageKind, TabAccess, TransitionIntent, get_role_config,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub persistent: bool,
}

impl HealthResponse {
    #[must_use]
    pub fn new(persistent: bool) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            persistent,
        }
    }
}

// =============================================================================
// REGISTRY RESPONSES
// =============================================================================

/// One role with its display metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleInfo {
    pub key: Role,
    pub display_name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub pages: Vec<String>,
}

impl RoleInfo {
    #[must_use]
    pub fn for_role(role: Role) -> Self {
        let config = get_role_config(role);
        Self {
            key: role,
            display_name: config.display_name.to_string(),
            description: config.description.to_string(),
            icon: config.icon.to_string(),
            color: config.color.to_string(),
            pages: launchpad_core::access::accessible_pages(role)
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// One workflow status with its display metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageInfo {
    pub status: SiteStatus,
    pub label: String,
    pub color: String,
    pub rank: u8,
    pub successors: Vec<SiteStatus>,
    pub active_stage: Option<StageKind>,
    pub terminal: bool,
}

impl StageInfo {
    #[must_use]
    pub fn for_status(status: SiteStatus) -> Self {
        Self {
            status,
            label: status.label().to_string(),
            color: status.color().to_string(),
            rank: status.rank(),
            successors: status.successors().to_vec(),
            active_stage: status.active_stage(),
            terminal: status.is_terminal(),
        }
    }
}

// =============================================================================
// ACCESS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessQuery {
    pub path: String,
}

/// Access decision for one path under the caller's current role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessResponse {
    pub path: String,
    pub role: Option<Role>,
    pub can_access: bool,
    pub access_level: AccessLevel,
    pub message: Option<String>,
    /// What a route guard does on first navigation to the path.
    pub guard: GuardOutcome,
}

impl AccessResponse {
    #[must_use]
    pub fn new(path: String, role: Option<Role>, tab: TabAccess, guard: GuardOutcome) -> Self {
        Self {
            path,
            role,
            can_access: tab.can_access,
            access_level: tab.access_level,
            message: tab.message,
            guard,
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub name: String,
    pub role: Option<Role>,
    pub roles: Vec<Role>,
    pub session: SessionInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub refreshed: bool,
    pub session: SessionInfo,
}

// =============================================================================
// SITES
// =============================================================================

pub type CreateSiteRequest = NewSite;

/// A site plus what the caller can do next with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteView {
    pub site: Site,
    pub stage_label: String,
    pub stage_color: String,
    pub next_statuses: Vec<SiteStatus>,
    pub missing_documents: Vec<StageKind>,
}

impl SiteView {
    #[must_use]
    pub fn new(site: Site, role: Role) -> Self {
        Self {
            stage_label: launchpad_core::workflow_stage_label(site.status).to_string(),
            stage_color: launchpad_core::workflow_stage_color(site.status).to_string(),
            next_statuses: launchpad_core::next_valid_statuses(site.status, role),
            missing_documents: site.missing_documents(),
            site,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub to: SiteStatus,
    #[serde(default)]
    pub intent: TransitionIntent,
    #[serde(default)]
    pub reason: Option<String>,
}

// =============================================================================
// APPROVALS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitApprovalRequest {
    pub site_id: u64,
}

/// Body of approve / reject / request-changes / resubmit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Revised scoping sent with a resubmission.
    #[serde(default)]
    pub scoping: Option<Scoping>,
}

impl ReviewRequest {
    /// The free text for a decision: the reason for rejections, else the comment.
    #[must_use]
    pub fn text(self, rejection: bool) -> Option<String> {
        if rejection {
            self.reason.or(self.comment)
        } else {
            self.comment.or(self.reason)
        }
    }
}

/// Review decision named in the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
    RequestChanges,
    Resubmit,
}

impl std::str::FromStr for ReviewDecision {
    type Err = LaunchpadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "request-changes" | "request_changes" => Ok(Self::RequestChanges),
            "resubmit" => Ok(Self::Resubmit),
            other => Err(LaunchpadError::Validation(format!(
                "unknown review decision '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// ALERTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsResponse {
    pub alerts: Vec<AlertView>,
    pub unread: usize,
}

// =============================================================================
// TESTS
// =============================================================================
