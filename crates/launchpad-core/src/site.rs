//! # Site Aggregate
//!
//! A site and its six stage sub-documents.
//!
//! The status field decides which sub-document is editable (see
//! [`SiteStatus::active_stage`]). Writing a sub-document may move the status
//! forward, one workflow step at a time, and never backward. A stage stays
//! locked until the previous stage's sub-document reports completion.
//!
//! Sites are never deleted; `archived` is the end of their life.

use crate::access::{AccessLevel, Permission, has_permission, tab_access};
use crate::approval::ApprovalStatus;
use crate::primitives::{MAX_COMMENT_LENGTH, MAX_NAME_LENGTH, MAX_SELECTION_ITEMS};
use crate::workflow::{
    SiteStatus, StageKind, TransitionIntent, TransitionKind, validate_transition,
};
use crate::{Actor, ApprovalId, LaunchpadError, Priority, RiskLevel, SiteId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

// =============================================================================
// LOCATION
// =============================================================================

const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;
const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

/// Postal address and optional coordinates of a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SiteLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: String,
    pub city: String,
    pub postcode: String,
}

impl SiteLocation {
    /// Reject coordinates outside the valid ranges.
    pub fn validate(&self) -> Result<(), LaunchpadError> {
        if let Some(lat) = self.latitude
            && !LATITUDE_RANGE.contains(&lat)
        {
            return Err(LaunchpadError::Validation(format!(
                "latitude {} out of range",
                lat
            )));
        }
        if let Some(lng) = self.longitude
            && !LONGITUDE_RANGE.contains(&lng)
        {
            return Err(LaunchpadError::Validation(format!(
                "longitude {} out of range",
                lng
            )));
        }
        Ok(())
    }
}

// =============================================================================
// STAGE SUB-DOCUMENTS
// =============================================================================

/// Findings of the on-site survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SiteStudy {
    pub conducted_by: Option<UserId>,
    pub findings: String,
    pub counter_count: u32,
    pub photos: Vec<String>,
    pub completed: bool,
}

/// One hardware line in a scoping selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareSelection {
    pub id: String,
    pub quantity: u32,
    pub customizations: Option<String>,
}

/// Software and hardware chosen for a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScopingSelection {
    pub selected_software: Vec<String>,
    pub selected_hardware: Vec<HardwareSelection>,
}

impl ScopingSelection {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected_software.is_empty() && self.selected_hardware.is_empty()
    }

    pub fn validate(&self) -> Result<(), LaunchpadError> {
        let items = self.selected_software.len() + self.selected_hardware.len();
        if items > MAX_SELECTION_ITEMS {
            return Err(LaunchpadError::Validation(format!(
                "selection has {} items (max {})",
                items, MAX_SELECTION_ITEMS
            )));
        }
        if let Some(line) = self.selected_hardware.iter().find(|line| line.quantity == 0) {
            return Err(LaunchpadError::Validation(format!(
                "hardware '{}' has zero quantity",
                line.id
            )));
        }
        Ok(())
    }
}

/// Cost estimate in pence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CostBreakdown {
    pub hardware_pence: u64,
    pub software_pence: u64,
    pub installation_pence: u64,
    pub contingency_pence: u64,
}

impl CostBreakdown {
    #[must_use]
    pub fn total_pence(&self) -> u64 {
        self.hardware_pence
            .saturating_add(self.software_pence)
            .saturating_add(self.installation_pence)
            .saturating_add(self.contingency_pence)
    }
}

/// Hardware scoping for a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Scoping {
    pub selection: ScopingSelection,
    pub cost: CostBreakdown,
    pub finalized: bool,
}

/// The site's view of its current scoping approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub approval_id: ApprovalId,
    pub version: u32,
    pub status: ApprovalStatus,
    pub decided_at: Option<Timestamp>,
}

/// A purchase order raised for the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub reference: String,
    pub supplier: String,
    pub amount_pence: u64,
}

/// Ordering and delivery of the approved hardware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Procurement {
    pub purchase_orders: Vec<PurchaseOrder>,
    pub delivered: bool,
}

/// Progress of the on-site installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentPhase {
    #[default]
    Scheduled,
    InProgress,
    Completed,
}

/// A piece of equipment installed at the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledAsset {
    pub serial: String,
    pub kind: String,
    pub warranty_expires: Option<Timestamp>,
    pub license_expires: Option<Timestamp>,
    pub next_service_due: Option<Timestamp>,
}

/// Installation schedule and installed equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Deployment {
    pub scheduled_start: Timestamp,
    pub planned_end: Timestamp,
    pub phase: DeploymentPhase,
    pub assets: Vec<InstalledAsset>,
}

/// A go-live checklist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub label: String,
    pub done: bool,
}

/// Final checks and sign-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GoLive {
    pub checklist: Vec<ChecklistItem>,
    pub signed_off_by: Option<UserId>,
    pub signed_off: bool,
}

/// Any one stage sub-document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageDocument {
    SiteStudy(SiteStudy),
    Scoping(Scoping),
    Approval(ApprovalRecord),
    Procurement(Procurement),
    Deployment(Deployment),
    GoLive(GoLive),
}

impl StageDocument {
    /// Parse the JSON body of a stage write.
    pub fn from_json(kind: StageKind, value: serde_json::Value) -> Result<Self, LaunchpadError> {
        let invalid = |e: serde_json::Error| {
            LaunchpadError::Validation(format!("invalid {} document: {}", kind, e))
        };
        Ok(match kind {
            StageKind::SiteStudy => Self::SiteStudy(serde_json::from_value(value).map_err(invalid)?),
            StageKind::Scoping => Self::Scoping(serde_json::from_value(value).map_err(invalid)?),
            StageKind::Approval => Self::Approval(serde_json::from_value(value).map_err(invalid)?),
            StageKind::Procurement => {
                Self::Procurement(serde_json::from_value(value).map_err(invalid)?)
            }
            StageKind::Deployment => {
                Self::Deployment(serde_json::from_value(value).map_err(invalid)?)
            }
            StageKind::GoLive => Self::GoLive(serde_json::from_value(value).map_err(invalid)?),
        })
    }

    #[must_use]
    pub fn kind(&self) -> StageKind {
        match self {
            Self::SiteStudy(_) => StageKind::SiteStudy,
            Self::Scoping(_) => StageKind::Scoping,
            Self::Approval(_) => StageKind::Approval,
            Self::Procurement(_) => StageKind::Procurement,
            Self::Deployment(_) => StageKind::Deployment,
            Self::GoLive(_) => StageKind::GoLive,
        }
    }

    /// Whether the document reports its stage as completed or approved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match self {
            Self::SiteStudy(doc) => doc.completed,
            Self::Scoping(doc) => doc.finalized && !doc.selection.is_empty(),
            Self::Approval(doc) => doc.status == ApprovalStatus::Approved,
            Self::Procurement(doc) => doc.delivered,
            Self::Deployment(doc) => doc.phase == DeploymentPhase::Completed,
            Self::GoLive(doc) => doc.signed_off && doc.checklist.iter().all(|item| item.done),
        }
    }

    /// The status this document puts its site in.
    #[must_use]
    pub fn target_status(&self) -> SiteStatus {
        let complete = self.is_complete();
        match self {
            Self::SiteStudy(_) if complete => SiteStatus::StudyCompleted,
            Self::SiteStudy(_) => SiteStatus::StudyInProgress,
            Self::Scoping(_) if complete => SiteStatus::HardwareScoped,
            Self::Scoping(_) => SiteStatus::StudyCompleted,
            Self::Approval(doc) => match doc.status {
                ApprovalStatus::Approved => SiteStatus::ApprovalApproved,
                ApprovalStatus::Rejected => SiteStatus::ApprovalRejected,
                ApprovalStatus::Pending | ApprovalStatus::ChangesRequested => {
                    SiteStatus::ApprovalPending
                }
            },
            Self::Procurement(_) if complete => SiteStatus::ProcurementCompleted,
            Self::Procurement(_) => SiteStatus::ProcurementInProgress,
            Self::Deployment(doc) => match doc.phase {
                DeploymentPhase::Scheduled => SiteStatus::DeploymentScheduled,
                DeploymentPhase::InProgress => SiteStatus::DeploymentInProgress,
                DeploymentPhase::Completed => SiteStatus::DeploymentCompleted,
            },
            Self::GoLive(_) if complete => SiteStatus::Live,
            Self::GoLive(_) => SiteStatus::GoLiveReady,
        }
    }

    fn validate(&self) -> Result<(), LaunchpadError> {
        match self {
            Self::SiteStudy(doc) if doc.findings.len() > MAX_COMMENT_LENGTH => Err(
                LaunchpadError::Validation("site study findings too long".to_string()),
            ),
            Self::Scoping(doc) => doc.selection.validate(),
            Self::Deployment(doc) if doc.planned_end < doc.scheduled_start => Err(
                LaunchpadError::Validation("deployment ends before it starts".to_string()),
            ),
            Self::GoLive(doc) if doc.signed_off && doc.signed_off_by.is_none() => Err(
                LaunchpadError::Validation("sign-off requires a signer".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

/// Capability needed to write a stage's sub-document.
#[must_use]
pub fn stage_permission(kind: StageKind) -> Permission {
    match kind {
        StageKind::SiteStudy => Permission::ConductSiteStudies,
        StageKind::Scoping => Permission::ScopeHardware,
        StageKind::Approval => Permission::ApproveHardware,
        StageKind::Procurement => Permission::ManageProcurement,
        StageKind::Deployment => Permission::ManageDeployments,
        StageKind::GoLive => Permission::SignOffGoLive,
    }
}

// =============================================================================
// SITE
// =============================================================================

/// Input for creating a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NewSite {
    pub name: String,
    pub organization: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub location: Option<SiteLocation>,
    #[serde(default)]
    pub go_live_date: Option<Timestamp>,
    #[serde(default)]
    pub assigned_ops_manager: Option<UserId>,
    #[serde(default)]
    pub assigned_deployment_engineer: Option<UserId>,
}

/// One entry in a site's status audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: SiteStatus,
    pub to: SiteStatus,
    pub kind: TransitionKind,
    pub by: UserId,
    pub at: Timestamp,
    pub reason: Option<String>,
}

/// A physical location moving through the deployment workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    pub organization: String,
    pub status: SiteStatus,
    pub priority: Priority,
    pub risk_level: RiskLevel,
    pub location: Option<SiteLocation>,
    pub go_live_date: Option<Timestamp>,
    pub assigned_ops_manager: Option<UserId>,
    pub assigned_deployment_engineer: Option<UserId>,
    pub created_by: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub site_study: Option<SiteStudy>,
    pub scoping: Option<Scoping>,
    pub approval: Option<ApprovalRecord>,
    pub procurement: Option<Procurement>,
    pub deployment: Option<Deployment>,
    pub go_live: Option<GoLive>,
    pub history: Vec<StatusChange>,
}

fn validate_name(what: &str, value: &str) -> Result<(), LaunchpadError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LaunchpadError::Validation(format!("{} is required", what)));
    }
    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(LaunchpadError::Validation(format!(
            "{} exceeds {} characters",
            what, MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

impl Site {
    /// Create a site in the initial status.
    pub fn create(
        id: SiteId,
        input: NewSite,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Self, LaunchpadError> {
        if !has_permission(actor.role, Permission::CreateSites) {
            return Err(LaunchpadError::Forbidden(format!(
                "role {} may not create sites",
                actor.role
            )));
        }
        validate_name("site name", &input.name)?;
        validate_name("organization", &input.organization)?;
        if let Some(location) = &input.location {
            location.validate()?;
        }

        Ok(Self {
            id,
            name: input.name.trim().to_string(),
            organization: input.organization.trim().to_string(),
            status: SiteStatus::INITIAL,
            priority: input.priority,
            risk_level: input.risk_level,
            location: input.location,
            go_live_date: input.go_live_date,
            assigned_ops_manager: input.assigned_ops_manager,
            assigned_deployment_engineer: input.assigned_deployment_engineer,
            created_by: actor.user_id.clone(),
            created_at: now,
            updated_at: now,
            site_study: None,
            scoping: None,
            approval: None,
            procurement: None,
            deployment: None,
            go_live: None,
            history: Vec::new(),
        })
    }

    /// Whether `user` is one of the site's assigned people.
    #[must_use]
    pub fn is_assigned_to(&self, user: &UserId) -> bool {
        self.assigned_ops_manager.as_ref() == Some(user)
            || self.assigned_deployment_engineer.as_ref() == Some(user)
    }

    /// Whether `actor` may see this site at all.
    #[must_use]
    pub fn visible_to(&self, actor: &Actor) -> bool {
        match tab_access(Some(actor.role), "/sites").access_level {
            AccessLevel::Full => true,
            AccessLevel::Assigned => self.is_assigned_to(&actor.user_id),
            AccessLevel::Own => self.created_by == actor.user_id,
            AccessLevel::None => false,
        }
    }

    /// The sub-document of a stage, if present.
    #[must_use]
    pub fn document(&self, kind: StageKind) -> Option<StageDocument> {
        match kind {
            StageKind::SiteStudy => self.site_study.clone().map(StageDocument::SiteStudy),
            StageKind::Scoping => self.scoping.clone().map(StageDocument::Scoping),
            StageKind::Approval => self.approval.map(StageDocument::Approval),
            StageKind::Procurement => self.procurement.clone().map(StageDocument::Procurement),
            StageKind::Deployment => self.deployment.clone().map(StageDocument::Deployment),
            StageKind::GoLive => self.go_live.clone().map(StageDocument::GoLive),
        }
    }

    /// Whether a stage's sub-document reports completion.
    #[must_use]
    pub fn is_stage_complete(&self, kind: StageKind) -> bool {
        self.document(kind).is_some_and(|doc| doc.is_complete())
    }

    /// Sub-documents the status expects but the site does not carry.
    #[must_use]
    pub fn missing_documents(&self) -> Vec<StageKind> {
        self.status
            .expected_documents()
            .into_iter()
            .filter(|kind| self.document(*kind).is_none())
            .collect()
    }

    fn store_document(&mut self, doc: StageDocument) {
        match doc {
            StageDocument::SiteStudy(d) => self.site_study = Some(d),
            StageDocument::Scoping(d) => self.scoping = Some(d),
            StageDocument::Approval(d) => self.approval = Some(d),
            StageDocument::Procurement(d) => self.procurement = Some(d),
            StageDocument::Deployment(d) => self.deployment = Some(d),
            StageDocument::GoLive(d) => self.go_live = Some(d),
        }
    }

    /// Write a stage sub-document on behalf of its stage service.
    ///
    /// Returns the new status when the write moved the site forward.
    pub fn apply_stage_document(
        &mut self,
        doc: StageDocument,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Option<SiteStatus>, LaunchpadError> {
        let kind = doc.kind();
        if kind == StageKind::Approval {
            return Err(LaunchpadError::Validation(
                "approval decisions are recorded through the approval workflow".to_string(),
            ));
        }
        if !has_permission(actor.role, stage_permission(kind)) {
            return Err(LaunchpadError::Forbidden(format!(
                "role {} may not edit the {} stage",
                actor.role, kind
            )));
        }
        if let Some(previous) = kind.previous()
            && !self.is_stage_complete(previous)
        {
            return Err(LaunchpadError::StageLocked(format!(
                "{} requires {} to be completed",
                kind, previous
            )));
        }
        if self.status.active_stage() != Some(kind) {
            return Err(LaunchpadError::StageLocked(format!(
                "{} is not editable while the site is {}",
                kind, self.status
            )));
        }
        doc.validate()?;

        let target = doc.target_status();
        let mut staged = self.clone();
        staged.store_document(doc);
        let moved = staged.advance_to(target, actor, now)?;
        staged.updated_at = now;
        *self = staged;
        Ok(moved)
    }

    /// Replace the scoping while its latest approval is sent back for rework.
    ///
    /// The revision must be finalized, since it is about to be resubmitted.
    pub fn revise_scoping(
        &mut self,
        scoping: Scoping,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<(), LaunchpadError> {
        if !has_permission(actor.role, stage_permission(StageKind::Scoping)) {
            return Err(LaunchpadError::Forbidden(format!(
                "role {} may not edit the {} stage",
                actor.role,
                StageKind::Scoping
            )));
        }
        let sent_back = self.approval.is_some_and(|record| {
            matches!(
                record.status,
                ApprovalStatus::Rejected | ApprovalStatus::ChangesRequested
            )
        });
        if !sent_back {
            return Err(LaunchpadError::StageLocked(format!(
                "{} can only be revised after a rejection or change request",
                StageKind::Scoping
            )));
        }
        let doc = StageDocument::Scoping(scoping);
        doc.validate()?;
        if !doc.is_complete() {
            return Err(LaunchpadError::Validation(
                "revised scoping must be finalized and name at least one item".to_string(),
            ));
        }
        self.store_document(doc);
        self.updated_at = now;
        Ok(())
    }

    /// Record the latest approval decision and move the status to match.
    pub fn record_approval(
        &mut self,
        record: ApprovalRecord,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Option<SiteStatus>, LaunchpadError> {
        let target = StageDocument::Approval(record).target_status();
        let mut staged = self.clone();
        staged.approval = Some(record);
        let moved = if staged.status == SiteStatus::ApprovalRejected
            && target == SiteStatus::ApprovalPending
        {
            staged.transition(target, actor, TransitionIntent::Resubmit, None, now)?;
            Some(target)
        } else {
            staged.advance_to(target, actor, now)?
        };
        staged.updated_at = now;
        *self = staged;
        Ok(moved)
    }

    /// Walk forward along the workflow until `target` is reached.
    fn advance_to(
        &mut self,
        target: SiteStatus,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Option<SiteStatus>, LaunchpadError> {
        if target.rank() <= self.status.rank() {
            return Ok(None);
        }
        while self.status != target {
            let successors = self.status.successors();
            let next = successors
                .iter()
                .copied()
                .find(|s| *s == target)
                .or_else(|| successors.first().copied())
                .ok_or_else(|| LaunchpadError::InvalidTransition {
                    from: self.status.to_string(),
                    to: target.to_string(),
                })?;
            self.transition(next, actor, TransitionIntent::Advance, None, now)?;
        }
        Ok(Some(target))
    }

    /// Change the status directly, recording the change in the audit trail.
    pub fn transition(
        &mut self,
        to: SiteStatus,
        actor: &Actor,
        intent: TransitionIntent,
        reason: Option<String>,
        now: Timestamp,
    ) -> Result<TransitionKind, LaunchpadError> {
        let kind = validate_transition(self.status, to, actor.role, intent)?;
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if kind == TransitionKind::AdminOverride && reason.is_none() {
            return Err(LaunchpadError::Validation(
                "an override needs a reason".to_string(),
            ));
        }
        if reason.as_ref().is_some_and(|r| r.len() > MAX_COMMENT_LENGTH) {
            return Err(LaunchpadError::Validation("reason too long".to_string()));
        }

        self.history.push(StatusChange {
            from: self.status,
            to,
            kind,
            by: actor.user_id.clone(),
            at: now,
            reason,
        });
        self.status = to;
        self.updated_at = now;
        Ok(kind)
    }
}

// =============================================================================
// TESTS
// =============================================================================
