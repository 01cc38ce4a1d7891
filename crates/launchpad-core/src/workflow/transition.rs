//! # Status Transitions
//!
//! Who may move a site from one status to another.
//!
//! Ordinary moves follow [`SiteStatus::successors`] one step at a time and
//! never go backward. Three explicit intents step outside that path:
//! - `Resubmit` takes a rejected site back to `approval_pending`
//! - `Archive` ends any live workflow (admin only)
//! - `Override` lets an admin set any non-archived status, with a reason

use super::stage::SiteStatus;
use crate::LaunchpadError;
use crate::access::{Permission, has_permission};
use crate::roles::Role;
use serde::{Deserialize, Serialize};

/// What the caller means by a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransitionIntent {
    #[default]
    Advance,
    Resubmit,
    Archive,
    Override,
}

/// The accepted kind of a transition, recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Forward,
    Resubmission,
    Archival,
    AdminOverride,
}

/// Capability required to move a site into `to`.
#[must_use]
pub fn required_permission(to: SiteStatus) -> Permission {
    match to {
        SiteStatus::SiteCreated => Permission::CreateSites,
        SiteStatus::StudyInProgress | SiteStatus::StudyCompleted => {
            Permission::ConductSiteStudies
        }
        SiteStatus::HardwareScoped | SiteStatus::ApprovalPending => Permission::ScopeHardware,
        SiteStatus::ApprovalApproved | SiteStatus::ApprovalRejected => {
            Permission::ApproveHardware
        }
        SiteStatus::ProcurementInProgress | SiteStatus::ProcurementCompleted => {
            Permission::ManageProcurement
        }
        SiteStatus::DeploymentScheduled
        | SiteStatus::DeploymentInProgress
        | SiteStatus::DeploymentCompleted
        | SiteStatus::GoLiveReady => Permission::ManageDeployments,
        SiteStatus::Live => Permission::SignOffGoLive,
        SiteStatus::Archived => Permission::ArchiveSites,
    }
}

fn invalid(from: SiteStatus, to: SiteStatus) -> LaunchpadError {
    LaunchpadError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

fn require(role: Role, permission: Permission, to: SiteStatus) -> Result<(), LaunchpadError> {
    if has_permission(role, permission) {
        Ok(())
    } else {
        Err(LaunchpadError::Forbidden(format!(
            "role {} may not move a site to {}",
            role, to
        )))
    }
}

/// Decide whether `role` may move a site from `from` to `to` with `intent`.
pub fn validate_transition(
    from: SiteStatus,
    to: SiteStatus,
    role: Role,
    intent: TransitionIntent,
) -> Result<TransitionKind, LaunchpadError> {
    if from.is_terminal() {
        return Err(invalid(from, to));
    }

    match intent {
        TransitionIntent::Advance => {
            if !from.successors().contains(&to) {
                return Err(invalid(from, to));
            }
            require(role, required_permission(to), to)?;
            Ok(TransitionKind::Forward)
        }
        TransitionIntent::Resubmit => {
            if from != SiteStatus::ApprovalRejected || to != SiteStatus::ApprovalPending {
                return Err(invalid(from, to));
            }
            require(role, Permission::ScopeHardware, to)?;
            Ok(TransitionKind::Resubmission)
        }
        TransitionIntent::Archive => {
            if to != SiteStatus::Archived {
                return Err(invalid(from, to));
            }
            require(role, Permission::ArchiveSites, to)?;
            Ok(TransitionKind::Archival)
        }
        TransitionIntent::Override => {
            if role != Role::Admin {
                return Err(LaunchpadError::Forbidden(
                    "only admins may override the workflow".to_string(),
                ));
            }
            if from == to || to == SiteStatus::Archived {
                return Err(invalid(from, to));
            }
            Ok(TransitionKind::AdminOverride)
        }
    }
}

/// Statuses `role` may advance a site into from `from`.
#[must_use]
pub fn next_valid_statuses(from: SiteStatus, role: Role) -> Vec<SiteStatus> {
    let mut next: Vec<SiteStatus> = from
        .successors()
        .iter()
        .copied()
        .filter(|to| has_permission(role, required_permission(*to)))
        .collect();
    if from == SiteStatus::ApprovalRejected && has_permission(role, Permission::ScopeHardware) {
        next.push(SiteStatus::ApprovalPending);
    }
    next
}

// =============================================================================
// TESTS
// =============================================================================
