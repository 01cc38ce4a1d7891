//! # Registry
//!
//! The domain facade: every site and approval operation, with its
//! authorization checks, over one storage backend.
//!
//! ## Storage Backends
//!
//! - `InMemory`: [`MemoryStore`] (fast, volatile)
//! - `Persistent`: [`RedbStore`] for disk-backed ACID storage
//!
//! Each operation validates and builds every record it is going to write
//! before the first write happens, so a refused operation leaves the store
//! untouched.

use crate::access::{AccessLevel, tab_access};
use crate::alert::{AlertDraft, AlertPolicy, AlertSubject, AlertViewer, derive_alerts};
use crate::approval::{
    ApprovalAction, ApprovalActionKind, ScopingApproval, convert_approval_row_to_approval,
    convert_approval_to_row,
};
use crate::site::{NewSite, Scoping, Site, StageDocument};
use crate::store::{MemoryStore, RecordStore, RedbStore, Sequence};
use crate::workflow::{SiteStatus, TransitionIntent};
use crate::{ActionId, Actor, ApprovalId, LaunchpadError, SiteId, Timestamp};
use std::path::Path;

const APPROVALS_PATH: &str = "/approvals-procurement";

/// Storage backend for a Registry.
#[derive(Debug)]
pub enum StorageBackend {
    /// Ordered maps (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

/// Domain operations over a record store.
#[derive(Debug, Default)]
pub struct Registry {
    backend: StorageBackend,
}

impl Registry {
    /// Create a registry with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with persistent redb storage at `path`.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, LaunchpadError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbStore::open(path)?),
        })
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    fn store(&self) -> &dyn RecordStore {
        match &self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    fn store_mut(&mut self) -> &mut dyn RecordStore {
        match &mut self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    // =========================================================================
    // SITES
    // =========================================================================

    /// Create a site in the initial status.
    pub fn create_site(
        &mut self,
        actor: &Actor,
        input: NewSite,
        now: Timestamp,
    ) -> Result<Site, LaunchpadError> {
        // Validate before reserving an id.
        Site::create(SiteId(0), input.clone(), actor, now)?;
        let id = SiteId(self.store_mut().next_id(Sequence::Site)?);
        let site = Site::create(id, input, actor, now)?;
        self.store_mut().put_site(&site)?;
        Ok(site)
    }

    fn load_site(&self, id: SiteId) -> Result<Site, LaunchpadError> {
        self.store()
            .get_site(id)?
            .ok_or(LaunchpadError::SiteNotFound(id))
    }

    fn visible_site(&self, actor: &Actor, id: SiteId) -> Result<Site, LaunchpadError> {
        let site = self.load_site(id)?;
        if site.visible_to(actor) {
            Ok(site)
        } else {
            Err(LaunchpadError::Forbidden(format!(
                "site {} is not visible to {}",
                id, actor.user_id
            )))
        }
    }

    /// One site, if the actor may see it.
    pub fn site(&self, actor: &Actor, id: SiteId) -> Result<Site, LaunchpadError> {
        self.visible_site(actor, id)
    }

    /// Every site the actor may see, in id order.
    pub fn sites(&self, actor: &Actor) -> Result<Vec<Site>, LaunchpadError> {
        Ok(self
            .store()
            .list_sites()?
            .into_iter()
            .filter(|site| site.visible_to(actor))
            .collect())
    }

    /// Change a site's status directly.
    pub fn transition_site(
        &mut self,
        actor: &Actor,
        id: SiteId,
        to: SiteStatus,
        intent: TransitionIntent,
        reason: Option<String>,
        now: Timestamp,
    ) -> Result<Site, LaunchpadError> {
        let mut site = self.visible_site(actor, id)?;
        if intent == TransitionIntent::Resubmit {
            return Err(LaunchpadError::Validation(
                "resubmission goes through the approval workflow".to_string(),
            ));
        }
        site.transition(to, actor, intent, reason, now)?;
        self.store_mut().put_site(&site)?;
        Ok(site)
    }

    /// Write one stage sub-document.
    pub fn write_stage(
        &mut self,
        actor: &Actor,
        id: SiteId,
        doc: StageDocument,
        now: Timestamp,
    ) -> Result<Site, LaunchpadError> {
        let mut site = self.visible_site(actor, id)?;
        site.apply_stage_document(doc, actor, now)?;
        self.store_mut().put_site(&site)?;
        Ok(site)
    }

    // =========================================================================
    // APPROVALS
    // =========================================================================

    fn load_approval(&self, id: ApprovalId) -> Result<ScopingApproval, LaunchpadError> {
        let row = self
            .store()
            .get_approval(id)?
            .ok_or(LaunchpadError::ApprovalNotFound(id))?;
        convert_approval_row_to_approval(&row)
    }

    fn approval_visible(actor: &Actor, approval: &ScopingApproval) -> bool {
        match tab_access(Some(actor.role), APPROVALS_PATH).access_level {
            AccessLevel::Full => true,
            AccessLevel::Own => approval.deployment_engineer_id == actor.user_id,
            AccessLevel::Assigned => approval.ops_manager_id.as_ref() == Some(&actor.user_id),
            AccessLevel::None => false,
        }
    }

    fn visible_approval(
        &self,
        actor: &Actor,
        id: ApprovalId,
    ) -> Result<ScopingApproval, LaunchpadError> {
        let approval = self.load_approval(id)?;
        if Self::approval_visible(actor, &approval) {
            Ok(approval)
        } else {
            Err(LaunchpadError::Forbidden(format!(
                "approval {} is not visible to {}",
                id, actor.user_id
            )))
        }
    }

    /// Persist a reviewed or new approval, its history entry and the site.
    ///
    /// All records are built first and then written in one store commit.
    fn commit_approval(
        &mut self,
        approval: &ScopingApproval,
        mut site: Site,
        kind: ApprovalActionKind,
        actor: &Actor,
        comment: Option<String>,
        now: Timestamp,
    ) -> Result<(), LaunchpadError> {
        site.record_approval(approval.record(), actor, now)?;
        let created_at = self
            .store()
            .get_approval(approval.id)?
            .map(|row| Timestamp(row.created_at))
            .unwrap_or(now);
        let row = convert_approval_to_row(approval)?.into_row(approval.id.0, created_at, now);
        let action_id = ActionId(self.store_mut().next_id(Sequence::Action)?);
        let action = ApprovalAction::record(action_id, approval.id, kind, actor, comment, now);
        self.store_mut().commit_approval(&row, &action, &site)
    }

    /// Submit a scoped site's hardware for review.
    pub fn submit_approval(
        &mut self,
        actor: &Actor,
        site_id: SiteId,
        now: Timestamp,
    ) -> Result<ScopingApproval, LaunchpadError> {
        let site = self.visible_site(actor, site_id)?;
        ScopingApproval::submit(ApprovalId(0), &site, actor, now)?;
        let id = ApprovalId(self.store_mut().next_id(Sequence::Approval)?);
        let approval = ScopingApproval::submit(id, &site, actor, now)?;
        self.commit_approval(&approval, site, ApprovalActionKind::Submit, actor, None, now)?;
        Ok(approval)
    }

    fn review(
        &mut self,
        actor: &Actor,
        id: ApprovalId,
        kind: ApprovalActionKind,
        text: Option<String>,
        now: Timestamp,
    ) -> Result<ScopingApproval, LaunchpadError> {
        let mut approval = self.visible_approval(actor, id)?;
        match kind {
            ApprovalActionKind::Approve => approval.approve(actor, text, now)?,
            ApprovalActionKind::Reject => approval.reject(actor, text, now)?,
            ApprovalActionKind::RequestChanges => approval.request_changes(actor, text, now)?,
            ApprovalActionKind::Submit | ApprovalActionKind::Resubmit => {
                return Err(LaunchpadError::Validation(format!(
                    "{} is not a review decision",
                    kind.as_str()
                )));
            }
        }
        let comment = match kind {
            ApprovalActionKind::Reject => approval.rejection_reason.clone(),
            _ => approval.review_comment.clone(),
        };
        let site = self.load_site(approval.site_id)?;
        self.commit_approval(&approval, site, kind, actor, comment, now)?;
        Ok(approval)
    }

    /// Approve a pending approval.
    pub fn approve(
        &mut self,
        actor: &Actor,
        id: ApprovalId,
        comment: Option<String>,
        now: Timestamp,
    ) -> Result<ScopingApproval, LaunchpadError> {
        self.review(actor, id, ApprovalActionKind::Approve, comment, now)
    }

    /// Reject a pending approval with a reason.
    pub fn reject(
        &mut self,
        actor: &Actor,
        id: ApprovalId,
        reason: Option<String>,
        now: Timestamp,
    ) -> Result<ScopingApproval, LaunchpadError> {
        self.review(actor, id, ApprovalActionKind::Reject, reason, now)
    }

    /// Send a pending approval back with a comment.
    pub fn request_changes(
        &mut self,
        actor: &Actor,
        id: ApprovalId,
        comment: Option<String>,
        now: Timestamp,
    ) -> Result<ScopingApproval, LaunchpadError> {
        self.review(actor, id, ApprovalActionKind::RequestChanges, comment, now)
    }

    /// Submit a new version after rejection or a change request.
    ///
    /// A `revision` replaces the site's scoping before the new version is
    /// built from it; without one the stored scoping is sent again.
    pub fn resubmit(
        &mut self,
        actor: &Actor,
        id: ApprovalId,
        revision: Option<Scoping>,
        now: Timestamp,
    ) -> Result<ScopingApproval, LaunchpadError> {
        let previous = self.visible_approval(actor, id)?;
        let mut site = self.visible_site(actor, previous.site_id)?;
        if site.approval.map(|record| record.approval_id) != Some(previous.id) {
            return Err(LaunchpadError::Validation(format!(
                "approval {} has already been superseded",
                id
            )));
        }
        if let Some(scoping) = revision {
            site.revise_scoping(scoping, actor, now)?;
        }
        previous.resubmit(ApprovalId(0), &site, actor, now)?;
        let new_id = ApprovalId(self.store_mut().next_id(Sequence::Approval)?);
        let next = previous.resubmit(new_id, &site, actor, now)?;
        self.commit_approval(&next, site, ApprovalActionKind::Resubmit, actor, None, now)?;
        Ok(next)
    }

    /// One approval, if the actor may see it.
    pub fn approval(&self, actor: &Actor, id: ApprovalId) -> Result<ScopingApproval, LaunchpadError> {
        self.visible_approval(actor, id)
    }

    /// Every approval the actor may see, in id order.
    pub fn approvals(&self, actor: &Actor) -> Result<Vec<ScopingApproval>, LaunchpadError> {
        let mut approvals = Vec::new();
        for row in self.store().list_approvals()? {
            let approval = convert_approval_row_to_approval(&row)?;
            if Self::approval_visible(actor, &approval) {
                approvals.push(approval);
            }
        }
        Ok(approvals)
    }

    /// Ordered history of one approval.
    pub fn approval_history(
        &self,
        actor: &Actor,
        id: ApprovalId,
    ) -> Result<Vec<ApprovalAction>, LaunchpadError> {
        self.visible_approval(actor, id)?;
        self.store().actions_for(id)
    }

    // =========================================================================
    // ALERTS
    // =========================================================================

    fn visible_records(
        &self,
        actor: &Actor,
    ) -> Result<(Vec<Site>, Vec<ScopingApproval>), LaunchpadError> {
        Ok((self.sites(actor)?, self.approvals(actor)?))
    }

    /// The subjects `actor` may receive alerts about.
    pub fn alert_viewer(&self, actor: &Actor) -> Result<AlertViewer, LaunchpadError> {
        let (sites, approvals) = self.visible_records(actor)?;
        let subjects = sites
            .iter()
            .map(|site| AlertSubject::Site(site.id))
            .chain(approvals.iter().map(|a| AlertSubject::Approval(a.id)));
        Ok(AlertViewer::new(actor.user_id.clone(), subjects))
    }

    /// Alerts the records visible to `actor` call for.
    pub fn alert_drafts(
        &self,
        actor: &Actor,
        now: Timestamp,
        policy: &AlertPolicy,
    ) -> Result<Vec<AlertDraft>, LaunchpadError> {
        let (sites, approvals) = self.visible_records(actor)?;
        Ok(derive_alerts(&sites, &approvals, now, policy))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::approval::ApprovalStatus;
    use crate::roles::Role;
    use crate::alert::AlertKind;
    use crate::site::{CostBreakdown, HardwareSelection, ScopingSelection, SiteStudy};
    use crate::UserId;

    fn admin() -> Actor {
        Actor::new("u-admin", "Ada", Role::Admin)
    }
    fn engineer() -> Actor {
        Actor::new("u-eng", "Eli", Role::DeploymentEngineer)
    }
    fn ops() -> Actor {
        Actor::new("u-ops", "Olu", Role::OpsManager)
    }

    fn tills(quantity: u32, hardware_pence: u64) -> Scoping {
        Scoping {
            selection: ScopingSelection {
                selected_software: Vec::new(),
                selected_hardware: vec![HardwareSelection {
                    id: "till".to_string(),
                    quantity,
                    customizations: None,
                }],
            },
            cost: CostBreakdown {
                hardware_pence,
                ..CostBreakdown::default()
            },
            finalized: true,
        }
    }

    fn scoped_site(registry: &mut Registry) -> SiteId {
        let site = registry
            .create_site(
                &admin(),
                NewSite {
                    name: "Leeds Hub".to_string(),
                    organization: "Compass".to_string(),
                    assigned_ops_manager: Some(UserId::new("u-ops")),
                    assigned_deployment_engineer: Some(UserId::new("u-eng")),
                    ..NewSite::default()
                },
                Timestamp(1),
            )
            .unwrap();
        registry
            .write_stage(
                &engineer(),
                site.id,
                StageDocument::SiteStudy(SiteStudy {
                    completed: true,
                    ..SiteStudy::default()
                }),
                Timestamp(2),
            )
            .unwrap();
        let scoped = registry
            .write_stage(
                &engineer(),
                site.id,
                StageDocument::Scoping(tills(3, 999_999)),
                Timestamp(3),
            )
            .unwrap();
        assert_eq!(scoped.status, SiteStatus::HardwareScoped);
        site.id
    }

    #[test]
    fn full_approval_cycle() {
        let mut registry = Registry::new();
        let site_id = scoped_site(&mut registry);

        let approval = registry.submit_approval(&engineer(), site_id, Timestamp(4)).unwrap();
        assert_eq!(
            registry.site(&admin(), site_id).unwrap().status,
            SiteStatus::ApprovalPending
        );

        registry
            .reject(&ops(), approval.id, Some("over budget".to_string()), Timestamp(5))
            .unwrap();
        assert_eq!(
            registry.site(&admin(), site_id).unwrap().status,
            SiteStatus::ApprovalRejected
        );

        let v2 = registry
            .resubmit(&engineer(), approval.id, None, Timestamp(6))
            .unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(
            registry.site(&admin(), site_id).unwrap().status,
            SiteStatus::ApprovalPending
        );
        assert!(matches!(
            registry.resubmit(&engineer(), approval.id, None, Timestamp(7)),
            Err(LaunchpadError::Validation(_)) | Err(LaunchpadError::InvalidTransition { .. })
        ));

        let approved = registry.approve(&ops(), v2.id, None, Timestamp(8)).unwrap();
        assert_eq!(approved.status, ApprovalStatus::Approved);
        let site = registry.site(&admin(), site_id).unwrap();
        assert_eq!(site.status, SiteStatus::ApprovalApproved);
        assert!(site.is_stage_complete(crate::workflow::StageKind::Approval));

        let history: Vec<ApprovalActionKind> = registry
            .approval_history(&ops(), approval.id)
            .unwrap()
            .iter()
            .map(|a| a.action)
            .collect();
        assert_eq!(
            history,
            vec![ApprovalActionKind::Submit, ApprovalActionKind::Reject]
        );
    }

    #[test]
    fn engineer_sees_only_own_approvals() {
        let mut registry = Registry::new();
        let site_id = scoped_site(&mut registry);
        let approval = registry.submit_approval(&engineer(), site_id, Timestamp(4)).unwrap();
        let other = Actor::new("u-eng-2", "Eve", Role::DeploymentEngineer);
        assert!(registry.approvals(&other).unwrap().is_empty());
        assert!(registry.approval(&other, approval.id).unwrap_err().is_denial());
        assert_eq!(registry.approvals(&engineer()).unwrap().len(), 1);
    }

    #[test]
    fn refused_create_does_not_consume_ids() {
        let mut registry = Registry::new();
        let bad = NewSite::default();
        assert!(registry.create_site(&admin(), bad, Timestamp(0)).is_err());
        let site = registry
            .create_site(
                &admin(),
                NewSite {
                    name: "A".to_string(),
                    organization: "B".to_string(),
                    ..NewSite::default()
                },
                Timestamp(0),
            )
            .unwrap();
        assert_eq!(site.id, SiteId(1));
    }

    #[test]
    fn user_role_sees_no_sites() {
        let mut registry = Registry::new();
        scoped_site(&mut registry);
        let user = Actor::new("u-1", "Uma", Role::User);
        assert!(registry.sites(&user).unwrap().is_empty());
        assert_eq!(registry.sites(&admin()).unwrap().len(), 1);
    }

    #[test]
    fn missing_site_reports_not_found() {
        let registry = Registry::new();
        assert!(matches!(
            registry.site(&admin(), SiteId(9)),
            Err(LaunchpadError::SiteNotFound(SiteId(9)))
        ));
    }

    #[test]
    fn resubmission_carries_revised_scoping() {
        let mut registry = Registry::new();
        let site_id = scoped_site(&mut registry);
        let v1 = registry.submit_approval(&engineer(), site_id, Timestamp(4)).unwrap();
        registry
            .reject(&ops(), v1.id, Some("too many tills".to_string()), Timestamp(5))
            .unwrap();

        // Stage writes stay locked while the approval is sent back.
        assert!(matches!(
            registry.write_stage(
                &engineer(),
                site_id,
                StageDocument::Scoping(tills(1, 1_000)),
                Timestamp(6)
            ),
            Err(LaunchpadError::StageLocked(_))
        ));

        let v2 = registry
            .resubmit(&engineer(), v1.id, Some(tills(1, 1_000)), Timestamp(7))
            .unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(v2.scoping_data.selected_hardware[0].quantity, 1);
        assert_eq!(v2.cost_breakdown.hardware_pence, 1_000);
        assert_eq!(registry.approval(&ops(), v1.id).unwrap().cost_breakdown.hardware_pence, 999_999);

        let site = registry.site(&admin(), site_id).unwrap();
        assert_eq!(site.status, SiteStatus::ApprovalPending);
        assert_eq!(site.scoping, Some(tills(1, 1_000)));
    }

    #[test]
    fn invalid_revision_leaves_records_untouched() {
        let mut registry = Registry::new();
        let site_id = scoped_site(&mut registry);
        let v1 = registry.submit_approval(&engineer(), site_id, Timestamp(4)).unwrap();
        registry
            .request_changes(&ops(), v1.id, Some("add a printer".to_string()), Timestamp(5))
            .unwrap();

        let result = registry.resubmit(&engineer(), v1.id, Some(tills(0, 0)), Timestamp(6));
        assert!(matches!(result, Err(LaunchpadError::Validation(_))));
        assert_eq!(registry.approvals(&ops()).unwrap().len(), 1);
        assert_eq!(
            registry.site(&admin(), site_id).unwrap().scoping,
            Some(tills(3, 999_999))
        );
    }

    #[test]
    fn alerts_follow_site_visibility() {
        const DAY: u64 = 24 * 60 * 60 * 1_000;
        let mut registry = Registry::new();
        let site_id = scoped_site(&mut registry);
        let approval = registry.submit_approval(&engineer(), site_id, Timestamp(4)).unwrap();
        let later = Timestamp(30 * DAY);
        let policy = AlertPolicy::default();

        let drafts = registry.alert_drafts(&engineer(), later, &policy).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, AlertKind::ApprovalOverdue);
        assert!(
            registry
                .alert_viewer(&engineer())
                .unwrap()
                .sees(AlertSubject::Approval(approval.id))
        );

        let outsider = Actor::new("u-eng-2", "Eve", Role::DeploymentEngineer);
        assert!(registry.alert_drafts(&outsider, later, &policy).unwrap().is_empty());
        let viewer = registry.alert_viewer(&outsider).unwrap();
        assert!(!viewer.sees(AlertSubject::Approval(approval.id)));
        assert!(!viewer.sees(AlertSubject::Site(site_id)));
    }
}
