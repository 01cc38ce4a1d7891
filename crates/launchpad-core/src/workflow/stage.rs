//! # Workflow Stages
//!
//! The deployment lifecycle of a site as a totally ordered enumeration.
//!
//! ## Stage Definitions
//!
//! | Rank | Status | Label | Sub-document editable |
//! |------|--------|-------|-----------------------|
//! | 0 | site_created | Created | site study |
//! | 1 | study_in_progress | Study In Progress | site study |
//! | 2 | study_completed | Study Completed | scoping |
//! | 3 | hardware_scoped | Hardware Scoped | scoping |
//! | 4 | approval_pending | Approval Pending | approval |
//! | 5 | approval_approved | Approved | procurement |
//! | 5 | approval_rejected | Rejected | approval |
//! | 6 | procurement_in_progress | Procurement In Progress | procurement |
//! | 7 | procurement_completed | Procurement Completed | deployment |
//! | 8 | deployment_scheduled | Deployment Scheduled | deployment |
//! | 9 | deployment_in_progress | Deployment In Progress | deployment |
//! | 10 | deployment_completed | Deployment Completed | go-live |
//! | 11 | go_live_ready | Ready for Go-Live | go-live |
//! | 12 | live | Live | none |
//! | - | archived | Archived | none |
//!
//! `approval_approved` and `approval_rejected` share a rank: they are the two
//! outcomes of the same decision.

use crate::LaunchpadError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// =============================================================================
// SITE STATUS
// =============================================================================

/// Deployment stage of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    SiteCreated,
    StudyInProgress,
    StudyCompleted,
    HardwareScoped,
    ApprovalPending,
    ApprovalApproved,
    ApprovalRejected,
    ProcurementInProgress,
    ProcurementCompleted,
    DeploymentScheduled,
    DeploymentInProgress,
    DeploymentCompleted,
    GoLiveReady,
    Live,
    Archived,
}

impl SiteStatus {
    /// Every status in display order.
    pub const ALL: [SiteStatus; 15] = [
        SiteStatus::SiteCreated,
        SiteStatus::StudyInProgress,
        SiteStatus::StudyCompleted,
        SiteStatus::HardwareScoped,
        SiteStatus::ApprovalPending,
        SiteStatus::ApprovalApproved,
        SiteStatus::ApprovalRejected,
        SiteStatus::ProcurementInProgress,
        SiteStatus::ProcurementCompleted,
        SiteStatus::DeploymentScheduled,
        SiteStatus::DeploymentInProgress,
        SiteStatus::DeploymentCompleted,
        SiteStatus::GoLiveReady,
        SiteStatus::Live,
        SiteStatus::Archived,
    ];

    /// The status every new site starts in.
    pub const INITIAL: SiteStatus = SiteStatus::SiteCreated;

    /// Stable identifier used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::SiteCreated => "site_created",
            SiteStatus::StudyInProgress => "study_in_progress",
            SiteStatus::StudyCompleted => "study_completed",
            SiteStatus::HardwareScoped => "hardware_scoped",
            SiteStatus::ApprovalPending => "approval_pending",
            SiteStatus::ApprovalApproved => "approval_approved",
            SiteStatus::ApprovalRejected => "approval_rejected",
            SiteStatus::ProcurementInProgress => "procurement_in_progress",
            SiteStatus::ProcurementCompleted => "procurement_completed",
            SiteStatus::DeploymentScheduled => "deployment_scheduled",
            SiteStatus::DeploymentInProgress => "deployment_in_progress",
            SiteStatus::DeploymentCompleted => "deployment_completed",
            SiteStatus::GoLiveReady => "go_live_ready",
            SiteStatus::Live => "live",
            SiteStatus::Archived => "archived",
        }
    }

    /// Human readable label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            SiteStatus::SiteCreated => "Created",
            SiteStatus::StudyInProgress => "Study In Progress",
            SiteStatus::StudyCompleted => "Study Completed",
            SiteStatus::HardwareScoped => "Hardware Scoped",
            SiteStatus::ApprovalPending => "Approval Pending",
            SiteStatus::ApprovalApproved => "Approved",
            SiteStatus::ApprovalRejected => "Rejected",
            SiteStatus::ProcurementInProgress => "Procurement In Progress",
            SiteStatus::ProcurementCompleted => "Procurement Completed",
            SiteStatus::DeploymentScheduled => "Deployment Scheduled",
            SiteStatus::DeploymentInProgress => "Deployment In Progress",
            SiteStatus::DeploymentCompleted => "Deployment Completed",
            SiteStatus::GoLiveReady => "Ready for Go-Live",
            SiteStatus::Live => "Live",
            SiteStatus::Archived => "Archived",
        }
    }

    /// Badge style token.
    #[must_use]
    pub fn color(&self) -> &'static str {
        match self {
            SiteStatus::SiteCreated | SiteStatus::DeploymentScheduled => {
                "bg-blue-100 text-blue-800"
            }
            SiteStatus::StudyInProgress
            | SiteStatus::ProcurementInProgress
            | SiteStatus::DeploymentInProgress => "bg-yellow-100 text-yellow-800",
            SiteStatus::StudyCompleted
            | SiteStatus::ApprovalApproved
            | SiteStatus::ProcurementCompleted
            | SiteStatus::DeploymentCompleted
            | SiteStatus::GoLiveReady
            | SiteStatus::Live => "bg-green-100 text-green-800",
            SiteStatus::HardwareScoped => "bg-purple-100 text-purple-800",
            SiteStatus::ApprovalPending => "bg-orange-100 text-orange-800",
            SiteStatus::ApprovalRejected => "bg-red-100 text-red-800",
            SiteStatus::Archived => "bg-gray-100 text-gray-800",
        }
    }

    /// Position in the progression. Archived sits after everything.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            SiteStatus::SiteCreated => 0,
            SiteStatus::StudyInProgress => 1,
            SiteStatus::StudyCompleted => 2,
            SiteStatus::HardwareScoped => 3,
            SiteStatus::ApprovalPending => 4,
            SiteStatus::ApprovalApproved | SiteStatus::ApprovalRejected => 5,
            SiteStatus::ProcurementInProgress => 6,
            SiteStatus::ProcurementCompleted => 7,
            SiteStatus::DeploymentScheduled => 8,
            SiteStatus::DeploymentInProgress => 9,
            SiteStatus::DeploymentCompleted => 10,
            SiteStatus::GoLiveReady => 11,
            SiteStatus::Live => 12,
            SiteStatus::Archived => 13,
        }
    }

    /// Statuses reachable by an ordinary forward step.
    ///
    /// `approval_rejected` has no forward step: only a resubmission leaves it.
    #[must_use]
    pub fn successors(&self) -> &'static [SiteStatus] {
        match self {
            SiteStatus::SiteCreated => &[SiteStatus::StudyInProgress],
            SiteStatus::StudyInProgress => &[SiteStatus::StudyCompleted],
            SiteStatus::StudyCompleted => &[SiteStatus::HardwareScoped],
            SiteStatus::HardwareScoped => &[SiteStatus::ApprovalPending],
            SiteStatus::ApprovalPending => {
                &[SiteStatus::ApprovalApproved, SiteStatus::ApprovalRejected]
            }
            SiteStatus::ApprovalApproved => &[SiteStatus::ProcurementInProgress],
            SiteStatus::ProcurementInProgress => &[SiteStatus::ProcurementCompleted],
            SiteStatus::ProcurementCompleted => &[SiteStatus::DeploymentScheduled],
            SiteStatus::DeploymentScheduled => &[SiteStatus::DeploymentInProgress],
            SiteStatus::DeploymentInProgress => &[SiteStatus::DeploymentCompleted],
            SiteStatus::DeploymentCompleted => &[SiteStatus::GoLiveReady],
            SiteStatus::GoLiveReady => &[SiteStatus::Live],
            SiteStatus::ApprovalRejected | SiteStatus::Live | SiteStatus::Archived => &[],
        }
    }

    /// Whether a site in this status has progressed to (or past) `target`.
    ///
    /// Archived sites sit outside the progression and have reached nothing;
    /// a rejected site has not reached approval.
    #[must_use]
    pub fn has_reached(&self, target: SiteStatus) -> bool {
        match (self, target) {
            (SiteStatus::Archived, _) | (_, SiteStatus::Archived) => *self == target,
            (_, SiteStatus::ApprovalRejected) => *self == SiteStatus::ApprovalRejected,
            (SiteStatus::ApprovalRejected, SiteStatus::ApprovalApproved) => false,
            _ => self.rank() >= target.rank(),
        }
    }

    /// Whether no further transition can leave this status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SiteStatus::Archived)
    }

    /// Whether the status only exits through an explicit external action.
    #[must_use]
    pub fn is_absorbing(&self) -> bool {
        matches!(
            self,
            SiteStatus::ApprovalRejected | SiteStatus::Live | SiteStatus::Archived
        )
    }

    /// The stage whose sub-document is editable in this status.
    #[must_use]
    pub fn active_stage(&self) -> Option<StageKind> {
        match self {
            SiteStatus::SiteCreated | SiteStatus::StudyInProgress => Some(StageKind::SiteStudy),
            SiteStatus::StudyCompleted | SiteStatus::HardwareScoped => Some(StageKind::Scoping),
            SiteStatus::ApprovalPending | SiteStatus::ApprovalRejected => {
                Some(StageKind::Approval)
            }
            SiteStatus::ApprovalApproved | SiteStatus::ProcurementInProgress => {
                Some(StageKind::Procurement)
            }
            SiteStatus::ProcurementCompleted
            | SiteStatus::DeploymentScheduled
            | SiteStatus::DeploymentInProgress => Some(StageKind::Deployment),
            SiteStatus::DeploymentCompleted | SiteStatus::GoLiveReady => Some(StageKind::GoLive),
            SiteStatus::Live | SiteStatus::Archived => None,
        }
    }

    /// Sub-documents a site in this status is expected to carry.
    #[must_use]
    pub fn expected_documents(&self) -> Vec<StageKind> {
        StageKind::ALL
            .into_iter()
            .filter(|stage| self.has_reached(stage.entry_status()))
            .collect()
    }
}

impl std::fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteStatus {
    type Err = LaunchpadError;

    /// Parses the wire identifier. The legacy spellings `Created` and
    /// `site-created` normalize to `site_created`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if matches!(trimmed, "Created" | "site-created") {
            return Ok(SiteStatus::SiteCreated);
        }
        SiteStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == trimmed)
            .ok_or_else(|| LaunchpadError::Validation(format!("unknown site status '{}'", s)))
    }
}

/// Label for a stage. Defined for every status.
#[must_use]
pub fn workflow_stage_label(stage: SiteStatus) -> &'static str {
    stage.label()
}

/// Style token for a stage. Defined for every status.
#[must_use]
pub fn workflow_stage_color(stage: SiteStatus) -> &'static str {
    stage.color()
}

// =============================================================================
// STAGE KIND
// =============================================================================

/// A workflow step that owns one sub-document of the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    SiteStudy,
    Scoping,
    Approval,
    Procurement,
    Deployment,
    GoLive,
}

impl StageKind {
    /// Every stage in workflow order.
    pub const ALL: [StageKind; 6] = [
        StageKind::SiteStudy,
        StageKind::Scoping,
        StageKind::Approval,
        StageKind::Procurement,
        StageKind::Deployment,
        StageKind::GoLive,
    ];

    /// Stable identifier used in URLs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::SiteStudy => "site_study",
            StageKind::Scoping => "scoping",
            StageKind::Approval => "approval",
            StageKind::Procurement => "procurement",
            StageKind::Deployment => "deployment",
            StageKind::GoLive => "go_live",
        }
    }

    /// The stage that must report completion before this one opens.
    #[must_use]
    pub fn previous(&self) -> Option<StageKind> {
        match self {
            StageKind::SiteStudy => None,
            StageKind::Scoping => Some(StageKind::SiteStudy),
            StageKind::Approval => Some(StageKind::Scoping),
            StageKind::Procurement => Some(StageKind::Approval),
            StageKind::Deployment => Some(StageKind::Procurement),
            StageKind::GoLive => Some(StageKind::Deployment),
        }
    }

    /// First status in which this stage's sub-document is populated.
    #[must_use]
    pub fn entry_status(&self) -> SiteStatus {
        match self {
            StageKind::SiteStudy => SiteStatus::StudyInProgress,
            StageKind::Scoping => SiteStatus::HardwareScoped,
            StageKind::Approval => SiteStatus::ApprovalPending,
            StageKind::Procurement => SiteStatus::ProcurementInProgress,
            StageKind::Deployment => SiteStatus::DeploymentScheduled,
            StageKind::GoLive => SiteStatus::GoLiveReady,
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = LaunchpadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        StageKind::ALL
            .into_iter()
            .find(|stage| stage.as_str() == normalized)
            .ok_or_else(|| LaunchpadError::Validation(format!("unknown stage '{}'", s)))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_status_has_label_and_color() {
        for status in SiteStatus::ALL {
            assert!(!workflow_stage_label(status).is_empty());
            assert!(!workflow_stage_color(status).is_empty());
        }
    }

    #[test]
    fn status_identifiers_round_trip() {
        for status in SiteStatus::ALL {
            assert_eq!(status.as_str().parse::<SiteStatus>().ok(), Some(status));
        }
    }

    #[test]
    fn legacy_created_spellings_normalize() {
        assert_eq!("Created".parse::<SiteStatus>().ok(), Some(SiteStatus::SiteCreated));
        assert_eq!(
            "site-created".parse::<SiteStatus>().ok(),
            Some(SiteStatus::SiteCreated)
        );
    }

    #[test]
    fn successors_only_move_forward() {
        for status in SiteStatus::ALL {
            for next in status.successors() {
                assert!(next.rank() > status.rank(), "{} -> {}", status, next);
            }
        }
    }

    #[test]
    fn rejection_is_absorbing() {
        assert!(SiteStatus::ApprovalRejected.successors().is_empty());
        assert!(SiteStatus::ApprovalRejected.is_absorbing());
        assert!(!SiteStatus::ApprovalRejected.has_reached(SiteStatus::ApprovalApproved));
    }

    #[test]
    fn archived_is_terminal() {
        assert!(SiteStatus::Archived.is_terminal());
        assert!(SiteStatus::Archived.active_stage().is_none());
    }

    #[test]
    fn expected_documents_grow_with_progress() {
        assert!(SiteStatus::SiteCreated.expected_documents().is_empty());
        assert_eq!(
            SiteStatus::HardwareScoped.expected_documents(),
            vec![StageKind::SiteStudy, StageKind::Scoping]
        );
        assert_eq!(SiteStatus::Live.expected_documents().len(), 6);
    }

    #[test]
    fn stage_kind_accepts_dashed_names() {
        assert_eq!("go-live".parse::<StageKind>().ok(), Some(StageKind::GoLive));
        assert!("inventory".parse::<StageKind>().is_err());
    }
}
