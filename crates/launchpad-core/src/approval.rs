//! # Scoping Approvals
//!
//! Review of a site's hardware scoping by an ops manager.
//!
//! A deployment engineer submits the scoping of a `hardware_scoped` site.
//! Ops managers (or admins) approve it, reject it with a reason, or request
//! changes with a comment. Rejected and changes-requested approvals are
//! superseded by resubmitting, which creates a new version that links to the
//! previous one. Every step appends an [`ApprovalAction`] to the history.
//!
//! ## Storage Shape
//!
//! Approvals are stored as [`ScopingApprovalRow`]: snake_case columns, a plain
//! string status and JSON blobs for the selection and cost breakdown. The
//! conversions between the two shapes are lossless apart from the generated
//! row id and timestamps.

use crate::access::{Permission, has_permission};
use crate::primitives::MAX_COMMENT_LENGTH;
use crate::roles::Role;
use crate::site::{ApprovalRecord, CostBreakdown, ScopingSelection, Site};
use crate::workflow::SiteStatus;
use crate::{ActionId, Actor, ApprovalId, LaunchpadError, SiteId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

// =============================================================================
// STATUS AND ACTION KINDS
// =============================================================================

/// Review status of one approval version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    ChangesRequested,
}

impl ApprovalStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::ChangesRequested => "changes_requested",
        }
    }
}

impl FromStr for ApprovalStatus {
    type Err = LaunchpadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            "changes_requested" => Ok(ApprovalStatus::ChangesRequested),
            other => Err(LaunchpadError::Validation(format!(
                "unknown approval status '{}'",
                other
            ))),
        }
    }
}

/// Kind of entry in an approval's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalActionKind {
    Submit,
    Approve,
    Reject,
    RequestChanges,
    Resubmit,
}

impl ApprovalActionKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalActionKind::Submit => "submit",
            ApprovalActionKind::Approve => "approve",
            ApprovalActionKind::Reject => "reject",
            ApprovalActionKind::RequestChanges => "request_changes",
            ApprovalActionKind::Resubmit => "resubmit",
        }
    }
}

impl FromStr for ApprovalActionKind {
    type Err = LaunchpadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submit" => Ok(ApprovalActionKind::Submit),
            "approve" => Ok(ApprovalActionKind::Approve),
            "reject" => Ok(ApprovalActionKind::Reject),
            "request_changes" => Ok(ApprovalActionKind::RequestChanges),
            "resubmit" => Ok(ApprovalActionKind::Resubmit),
            other => Err(LaunchpadError::Validation(format!(
                "unknown approval action '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// APPLICATION SHAPE
// =============================================================================

/// One submitted version of a site's scoping, with its review outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopingApproval {
    pub id: ApprovalId,
    pub site_id: SiteId,
    pub site_name: String,
    pub deployment_engineer_id: UserId,
    pub deployment_engineer_name: String,
    pub ops_manager_id: Option<UserId>,
    pub ops_manager_name: Option<String>,
    pub status: ApprovalStatus,
    pub submitted_at: Timestamp,
    pub reviewed_at: Option<Timestamp>,
    pub reviewed_by: Option<UserId>,
    pub review_comment: Option<String>,
    pub rejection_reason: Option<String>,
    pub scoping_data: ScopingSelection,
    pub cost_breakdown: CostBreakdown,
    pub version: u32,
    pub previous_version_id: Option<ApprovalId>,
}

/// One entry in an approval's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalAction {
    pub id: ActionId,
    pub approval_id: ApprovalId,
    pub action: ApprovalActionKind,
    pub performed_by: UserId,
    pub performed_by_role: Role,
    pub performed_at: Timestamp,
    pub comment: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl ApprovalAction {
    /// Log entry for `kind` performed by `actor`.
    #[must_use]
    pub fn record(
        id: ActionId,
        approval_id: ApprovalId,
        action: ApprovalActionKind,
        actor: &Actor,
        comment: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            approval_id,
            action,
            performed_by: actor.user_id.clone(),
            performed_by_role: actor.role,
            performed_at: now,
            comment,
            metadata: BTreeMap::new(),
        }
    }
}

fn required_text(what: &str, text: Option<String>) -> Result<String, LaunchpadError> {
    let text = text.map(|t| t.trim().to_string()).unwrap_or_default();
    if text.is_empty() {
        return Err(LaunchpadError::Validation(format!("{} is required", what)));
    }
    if text.len() > MAX_COMMENT_LENGTH {
        return Err(LaunchpadError::Validation(format!("{} too long", what)));
    }
    Ok(text)
}

fn optional_text(text: Option<String>) -> Result<Option<String>, LaunchpadError> {
    let text = text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    if text.as_ref().is_some_and(|t| t.len() > MAX_COMMENT_LENGTH) {
        return Err(LaunchpadError::Validation("comment too long".to_string()));
    }
    Ok(text)
}

fn require(actor: &Actor, permission: Permission, what: &str) -> Result<(), LaunchpadError> {
    if has_permission(actor.role, permission) {
        Ok(())
    } else {
        Err(LaunchpadError::Forbidden(format!(
            "role {} may not {}",
            actor.role, what
        )))
    }
}

impl ScopingApproval {
    /// First version of an approval for a scoped site.
    pub fn submit(
        id: ApprovalId,
        site: &Site,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Self, LaunchpadError> {
        require(actor, Permission::ScopeHardware, "submit scoping")?;
        if site.status != SiteStatus::HardwareScoped {
            return Err(LaunchpadError::InvalidTransition {
                from: site.status.to_string(),
                to: SiteStatus::ApprovalPending.to_string(),
            });
        }
        let scoping = site.scoping.as_ref().ok_or_else(|| {
            LaunchpadError::StageLocked("site has no scoping to submit".to_string())
        })?;

        Ok(Self {
            id,
            site_id: site.id,
            site_name: site.name.clone(),
            deployment_engineer_id: actor.user_id.clone(),
            deployment_engineer_name: actor.name.clone(),
            ops_manager_id: site.assigned_ops_manager.clone(),
            ops_manager_name: None,
            status: ApprovalStatus::Pending,
            submitted_at: now,
            reviewed_at: None,
            reviewed_by: None,
            review_comment: None,
            rejection_reason: None,
            scoping_data: scoping.selection.clone(),
            cost_breakdown: scoping.cost,
            version: 1,
            previous_version_id: None,
        })
    }

    fn review(
        &mut self,
        actor: &Actor,
        status: ApprovalStatus,
        now: Timestamp,
    ) -> Result<(), LaunchpadError> {
        require(actor, Permission::ApproveHardware, "review scoping")?;
        if self.status != ApprovalStatus::Pending {
            return Err(LaunchpadError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }
        self.status = status;
        self.reviewed_at = Some(now);
        self.reviewed_by = Some(actor.user_id.clone());
        self.ops_manager_id = Some(actor.user_id.clone());
        self.ops_manager_name = Some(actor.name.clone());
        Ok(())
    }

    /// Approve a pending version.
    pub fn approve(
        &mut self,
        actor: &Actor,
        comment: Option<String>,
        now: Timestamp,
    ) -> Result<(), LaunchpadError> {
        let comment = optional_text(comment)?;
        self.review(actor, ApprovalStatus::Approved, now)?;
        self.review_comment = comment;
        Ok(())
    }

    /// Reject a pending version. A reason is mandatory.
    pub fn reject(
        &mut self,
        actor: &Actor,
        reason: Option<String>,
        now: Timestamp,
    ) -> Result<(), LaunchpadError> {
        let reason = required_text("rejection reason", reason)?;
        self.review(actor, ApprovalStatus::Rejected, now)?;
        self.rejection_reason = Some(reason);
        Ok(())
    }

    /// Send a pending version back for changes. A comment is mandatory.
    pub fn request_changes(
        &mut self,
        actor: &Actor,
        comment: Option<String>,
        now: Timestamp,
    ) -> Result<(), LaunchpadError> {
        let comment = required_text("review comment", comment)?;
        self.review(actor, ApprovalStatus::ChangesRequested, now)?;
        self.review_comment = Some(comment);
        Ok(())
    }

    /// New version superseding a rejected or changes-requested one.
    pub fn resubmit(
        &self,
        id: ApprovalId,
        site: &Site,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Self, LaunchpadError> {
        require(actor, Permission::ScopeHardware, "resubmit scoping")?;
        if !matches!(
            self.status,
            ApprovalStatus::Rejected | ApprovalStatus::ChangesRequested
        ) {
            return Err(LaunchpadError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: ApprovalStatus::Pending.as_str().to_string(),
            });
        }
        if site.id != self.site_id {
            return Err(LaunchpadError::Validation(
                "approval belongs to another site".to_string(),
            ));
        }
        let scoping = site.scoping.as_ref().ok_or_else(|| {
            LaunchpadError::StageLocked("site has no scoping to resubmit".to_string())
        })?;

        Ok(Self {
            id,
            status: ApprovalStatus::Pending,
            submitted_at: now,
            reviewed_at: None,
            reviewed_by: None,
            review_comment: None,
            rejection_reason: None,
            deployment_engineer_id: actor.user_id.clone(),
            deployment_engineer_name: actor.name.clone(),
            scoping_data: scoping.selection.clone(),
            cost_breakdown: scoping.cost,
            version: self.version.saturating_add(1),
            previous_version_id: Some(self.id),
            site_name: site.name.clone(),
            ..self.clone()
        })
    }

    /// The site's view of this approval.
    #[must_use]
    pub fn record(&self) -> ApprovalRecord {
        ApprovalRecord {
            approval_id: self.id,
            version: self.version,
            status: self.status,
            decided_at: self.reviewed_at,
        }
    }
}

// =============================================================================
// STORAGE SHAPE
// =============================================================================

/// Stored form of an approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopingApprovalRow {
    pub id: u64,
    pub site_id: u64,
    pub site_name: String,
    pub deployment_engineer_id: String,
    pub deployment_engineer_name: String,
    pub ops_manager_id: Option<String>,
    pub ops_manager_name: Option<String>,
    pub status: String,
    pub submitted_at: u64,
    pub reviewed_at: Option<u64>,
    pub reviewed_by: Option<String>,
    pub review_comment: Option<String>,
    pub rejection_reason: Option<String>,
    pub scoping_data: serde_json::Value,
    pub cost_breakdown: serde_json::Value,
    pub version: u32,
    pub previous_version_id: Option<u64>,
    pub created_at: u64,
    pub updated_at: u64,
}

/// A row before the store has assigned its id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewApprovalRow {
    pub site_id: u64,
    pub site_name: String,
    pub deployment_engineer_id: String,
    pub deployment_engineer_name: String,
    pub ops_manager_id: Option<String>,
    pub ops_manager_name: Option<String>,
    pub status: String,
    pub submitted_at: u64,
    pub reviewed_at: Option<u64>,
    pub reviewed_by: Option<String>,
    pub review_comment: Option<String>,
    pub rejection_reason: Option<String>,
    pub scoping_data: serde_json::Value,
    pub cost_breakdown: serde_json::Value,
    pub version: u32,
    pub previous_version_id: Option<u64>,
}

impl NewApprovalRow {
    /// Complete the row with its id and bookkeeping timestamps.
    #[must_use]
    pub fn into_row(self, id: u64, created_at: Timestamp, updated_at: Timestamp) -> ScopingApprovalRow {
        ScopingApprovalRow {
            id,
            site_id: self.site_id,
            site_name: self.site_name,
            deployment_engineer_id: self.deployment_engineer_id,
            deployment_engineer_name: self.deployment_engineer_name,
            ops_manager_id: self.ops_manager_id,
            ops_manager_name: self.ops_manager_name,
            status: self.status,
            submitted_at: self.submitted_at,
            reviewed_at: self.reviewed_at,
            reviewed_by: self.reviewed_by,
            review_comment: self.review_comment,
            rejection_reason: self.rejection_reason,
            scoping_data: self.scoping_data,
            cost_breakdown: self.cost_breakdown,
            version: self.version,
            previous_version_id: self.previous_version_id,
            created_at: created_at.millis(),
            updated_at: updated_at.millis(),
        }
    }
}

/// Stored form of an approval history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalActionRow {
    pub id: u64,
    pub approval_id: u64,
    pub action: String,
    pub performed_by: String,
    pub performed_by_role: String,
    pub performed_at: u64,
    pub comment: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: u64,
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, LaunchpadError> {
    serde_json::to_value(value).map_err(|e| LaunchpadError::SerializationError(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(
    column: &str,
    value: &serde_json::Value,
) -> Result<T, LaunchpadError> {
    T::deserialize(value).map_err(|e| {
        LaunchpadError::SerializationError(format!("column {}: {}", column, e))
    })
}

/// Storage row to application shape. Unknown statuses are rejected.
pub fn convert_approval_row_to_approval(
    row: &ScopingApprovalRow,
) -> Result<ScopingApproval, LaunchpadError> {
    Ok(ScopingApproval {
        id: ApprovalId(row.id),
        site_id: SiteId(row.site_id),
        site_name: row.site_name.clone(),
        deployment_engineer_id: UserId::new(row.deployment_engineer_id.clone()),
        deployment_engineer_name: row.deployment_engineer_name.clone(),
        ops_manager_id: row.ops_manager_id.clone().map(UserId),
        ops_manager_name: row.ops_manager_name.clone(),
        status: row.status.parse()?,
        submitted_at: Timestamp(row.submitted_at),
        reviewed_at: row.reviewed_at.map(Timestamp),
        reviewed_by: row.reviewed_by.clone().map(UserId),
        review_comment: row.review_comment.clone(),
        rejection_reason: row.rejection_reason.clone(),
        scoping_data: from_json("scoping_data", &row.scoping_data)?,
        cost_breakdown: from_json("cost_breakdown", &row.cost_breakdown)?,
        version: row.version,
        previous_version_id: row.previous_version_id.map(ApprovalId),
    })
}

/// Application shape to a storage row, without id and timestamps.
pub fn convert_approval_to_row(
    approval: &ScopingApproval,
) -> Result<NewApprovalRow, LaunchpadError> {
    Ok(NewApprovalRow {
        site_id: approval.site_id.0,
        site_name: approval.site_name.clone(),
        deployment_engineer_id: approval.deployment_engineer_id.0.clone(),
        deployment_engineer_name: approval.deployment_engineer_name.clone(),
        ops_manager_id: approval.ops_manager_id.as_ref().map(|u| u.0.clone()),
        ops_manager_name: approval.ops_manager_name.clone(),
        status: approval.status.as_str().to_string(),
        submitted_at: approval.submitted_at.millis(),
        reviewed_at: approval.reviewed_at.map(Timestamp::millis),
        reviewed_by: approval.reviewed_by.as_ref().map(|u| u.0.clone()),
        review_comment: approval.review_comment.clone(),
        rejection_reason: approval.rejection_reason.clone(),
        scoping_data: to_json(&approval.scoping_data)?,
        cost_breakdown: to_json(&approval.cost_breakdown)?,
        version: approval.version,
        previous_version_id: approval.previous_version_id.map(|id| id.0),
    })
}

/// Storage row to a history entry. A missing metadata blob becomes empty.
pub fn convert_action_row_to_action(
    row: &ApprovalActionRow,
) -> Result<ApprovalAction, LaunchpadError> {
    let metadata = match &row.metadata {
        None | Some(serde_json::Value::Null) => BTreeMap::new(),
        Some(serde_json::Value::Object(map)) => map
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect(),
        Some(other) => {
            return Err(LaunchpadError::SerializationError(format!(
                "action metadata must be an object, got {}",
                other
            )));
        }
    };

    Ok(ApprovalAction {
        id: ActionId(row.id),
        approval_id: ApprovalId(row.approval_id),
        action: row.action.parse()?,
        performed_by: UserId::new(row.performed_by.clone()),
        performed_by_role: row.performed_by_role.parse()?,
        performed_at: Timestamp(row.performed_at),
        comment: row.comment.clone(),
        metadata,
    })
}

/// History entry to its storage row.
pub fn convert_action_to_row(
    action: &ApprovalAction,
    created_at: Timestamp,
) -> Result<ApprovalActionRow, LaunchpadError> {
    Ok(ApprovalActionRow {
        id: action.id.0,
        approval_id: action.approval_id.0,
        action: action.action.as_str().to_string(),
        performed_by: action.performed_by.0.clone(),
        performed_by_role: action.performed_by_role.as_str().to_string(),
        performed_at: action.performed_at.millis(),
        comment: action.comment.clone(),
        metadata: Some(to_json(&action.metadata)?),
        created_at: created_at.millis(),
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::site::{HardwareSelection, Scoping};

    fn scoped_site() -> Site {
        Site {
            id: SiteId(7),
            name: "Leeds Hub".to_string(),
            organization: "Compass".to_string(),
            status: SiteStatus::HardwareScoped,
            priority: crate::Priority::High,
            risk_level: crate::RiskLevel::Low,
            location: None,
            go_live_date: None,
            assigned_ops_manager: Some(UserId::new("u-ops")),
            assigned_deployment_engineer: Some(UserId::new("u-eng")),
            created_by: UserId::new("u-admin"),
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
            site_study: None,
            scoping: Some(Scoping {
                selection: ScopingSelection {
                    selected_software: vec!["pos".to_string()],
                    selected_hardware: vec![HardwareSelection {
                        id: "till-1".to_string(),
                        quantity: 2,
                        customizations: None,
                    }],
                },
                cost: CostBreakdown {
                    hardware_pence: 120_000,
                    ..CostBreakdown::default()
                },
                finalized: true,
            }),
            approval: None,
            procurement: None,
            deployment: None,
            go_live: None,
            history: Vec::new(),
        }
    }

    fn engineer() -> Actor {
        Actor::new("u-eng", "Eli", Role::DeploymentEngineer)
    }

    fn ops() -> Actor {
        Actor::new("u-ops", "Olu", Role::OpsManager)
    }

    fn submitted() -> ScopingApproval {
        match ScopingApproval::submit(ApprovalId(1), &scoped_site(), &engineer(), Timestamp(100)) {
            Ok(approval) => approval,
            Err(e) => panic!("submit failed: {e}"),
        }
    }

    #[test]
    fn submit_snapshots_scoping() {
        let approval = submitted();
        assert_eq!(approval.status, ApprovalStatus::Pending);
        assert_eq!(approval.version, 1);
        assert_eq!(approval.cost_breakdown.total_pence(), 120_000);
    }

    #[test]
    fn submit_requires_scoped_site() {
        let mut site = scoped_site();
        site.status = SiteStatus::StudyCompleted;
        assert!(ScopingApproval::submit(ApprovalId(1), &site, &engineer(), Timestamp(0)).is_err());
    }

    #[test]
    fn reject_needs_reason() {
        let mut approval = submitted();
        assert!(matches!(
            approval.reject(&ops(), Some("  ".to_string()), Timestamp(5)),
            Err(LaunchpadError::Validation(_))
        ));
        assert_eq!(approval.status, ApprovalStatus::Pending);
        assert!(approval.reject(&ops(), Some("too pricey".to_string()), Timestamp(5)).is_ok());
        assert_eq!(approval.rejection_reason.as_deref(), Some("too pricey"));
    }

    #[test]
    fn engineer_cannot_approve() {
        let mut approval = submitted();
        assert!(matches!(
            approval.approve(&engineer(), None, Timestamp(5)),
            Err(LaunchpadError::Forbidden(_))
        ));
    }

    #[test]
    fn decisions_only_from_pending() {
        let mut approval = submitted();
        assert!(approval.approve(&ops(), None, Timestamp(5)).is_ok());
        assert!(
            approval
                .request_changes(&ops(), Some("more tills".to_string()), Timestamp(6))
                .is_err()
        );
    }

    #[test]
    fn resubmit_links_versions() {
        let mut approval = submitted();
        assert!(
            approval
                .request_changes(&ops(), Some("add a printer".to_string()), Timestamp(6))
                .is_ok()
        );
        let next = approval.resubmit(ApprovalId(2), &scoped_site(), &engineer(), Timestamp(9));
        let Ok(next) = next else {
            panic!("resubmit failed");
        };
        assert_eq!(next.version, 2);
        assert_eq!(next.previous_version_id, Some(ApprovalId(1)));
        assert_eq!(next.status, ApprovalStatus::Pending);
        assert!(next.review_comment.is_none());
    }

    #[test]
    fn pending_cannot_be_resubmitted() {
        let approval = submitted();
        assert!(
            approval
                .resubmit(ApprovalId(2), &scoped_site(), &engineer(), Timestamp(9))
                .is_err()
        );
    }

    #[test]
    fn row_conversion_preserves_approval() {
        let mut approval = submitted();
        assert!(approval.approve(&ops(), Some("ok".to_string()), Timestamp(8)).is_ok());
        let row = convert_approval_to_row(&approval)
            .map(|row| row.into_row(approval.id.0, Timestamp(100), Timestamp(8)));
        let back = row.and_then(|row| convert_approval_row_to_approval(&row));
        assert_eq!(back.ok(), Some(approval));
    }

    #[test]
    fn unknown_row_status_is_an_error() {
        let approval = submitted();
        let Ok(new_row) = convert_approval_to_row(&approval) else {
            panic!("conversion failed");
        };
        let mut row = new_row.into_row(1, Timestamp(0), Timestamp(0));
        row.status = "escalated".to_string();
        assert!(convert_approval_row_to_approval(&row).is_err());
    }

    #[test]
    fn action_row_without_metadata() {
        let row = ApprovalActionRow {
            id: 3,
            approval_id: 1,
            action: "request_changes".to_string(),
            performed_by: "u-ops".to_string(),
            performed_by_role: "ops_manager".to_string(),
            performed_at: 50,
            comment: Some("add printer".to_string()),
            metadata: None,
            created_at: 50,
        };
        let action = convert_action_row_to_action(&row);
        let Ok(action) = action else {
            panic!("conversion failed");
        };
        assert_eq!(action.action, ApprovalActionKind::RequestChanges);
        assert!(action.metadata.is_empty());
        let back = convert_action_to_row(&action, Timestamp(50));
        assert_eq!(back.ok().map(|r| r.action), Some(row.action));
    }
}
