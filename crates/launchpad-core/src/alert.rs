//! # Alerts
//!
//! Notifications derived from site and approval state.
//!
//! Alerts are never authored by hand: [`derive_alerts`] scans the current
//! records and proposes drafts, and [`AlertBoard::sync`] files the ones the
//! board does not already carry. Expiry happens on the board.
//!
//! Read and dismissed flags belong to each consumer. An [`AlertViewer`]
//! names the user and the subjects that user may see; every board query
//! goes through one.

use crate::approval::{ApprovalStatus, ScopingApproval};
use crate::primitives::{ALERT_TTL_MS, APPROVAL_OVERDUE_MS, EXPIRY_HORIZON_MS};
use crate::site::{DeploymentPhase, Site};
use crate::workflow::SiteStatus;
use crate::{AlertId, ApprovalId, SiteId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LicenseExpiry,
    WarrantyExpiry,
    ServiceDue,
    DeploymentDelay,
    ApprovalOverdue,
}

/// Urgency, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// The record an alert points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSubject {
    Site(SiteId),
    Approval(ApprovalId),
}

/// An alert before the board has filed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertDraft {
    pub kind: AlertKind,
    pub severity: Severity,
    pub subject: AlertSubject,
    /// Distinguishes several alerts of one kind on one subject (an asset serial).
    pub detail: Option<String>,
    pub title: String,
    pub message: String,
    pub expires_at: Option<Timestamp>,
}

/// A filed alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub kind: AlertKind,
    pub severity: Severity,
    pub subject: AlertSubject,
    pub detail: Option<String>,
    pub title: String,
    pub message: String,
    pub created_at: Timestamp,
    pub expires_at: Option<Timestamp>,
}

/// An alert as one consumer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertView {
    #[serde(flatten)]
    pub alert: Alert,
    pub read: bool,
}

/// A consumer of the board and the subjects they may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertViewer {
    user: UserId,
    subjects: BTreeSet<AlertSubject>,
}

impl AlertViewer {
    #[must_use]
    pub fn new(user: UserId, subjects: impl IntoIterator<Item = AlertSubject>) -> Self {
        Self {
            user,
            subjects: subjects.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn sees(&self, subject: AlertSubject) -> bool {
        self.subjects.contains(&subject)
    }
}

impl Alert {
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn key(&self) -> (AlertKind, AlertSubject, Option<&str>) {
        (self.kind, self.subject, self.detail.as_deref())
    }
}

/// Thresholds used when deriving alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPolicy {
    pub approval_overdue_ms: u64,
    pub expiry_horizon_ms: u64,
    pub alert_ttl_ms: u64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            approval_overdue_ms: APPROVAL_OVERDUE_MS,
            expiry_horizon_ms: EXPIRY_HORIZON_MS,
            alert_ttl_ms: ALERT_TTL_MS,
        }
    }
}

// =============================================================================
// DERIVATION
// =============================================================================

fn days(ms: u64) -> u64 {
    ms / (24 * 60 * 60 * 1_000)
}

fn expiry_draft(
    kind: AlertKind,
    site: &Site,
    serial: &str,
    due: Timestamp,
    now: Timestamp,
    policy: &AlertPolicy,
) -> Option<AlertDraft> {
    if due > now.plus_millis(policy.expiry_horizon_ms) {
        return None;
    }
    let what = match kind {
        AlertKind::LicenseExpiry => "License",
        AlertKind::WarrantyExpiry => "Warranty",
        _ => "Service",
    };
    let (severity, message) = if due <= now {
        (
            Severity::Critical,
            format!("{} for {} at {} is overdue", what, serial, site.name),
        )
    } else {
        (
            Severity::Medium,
            format!(
                "{} for {} at {} is due in {} days",
                what,
                serial,
                site.name,
                days(due.since(now))
            ),
        )
    };
    Some(AlertDraft {
        kind,
        severity,
        subject: AlertSubject::Site(site.id),
        detail: Some(serial.to_string()),
        title: format!("{} due", what),
        message,
        expires_at: Some(now.plus_millis(policy.alert_ttl_ms)),
    })
}

/// Alerts the current records call for.
#[must_use]
pub fn derive_alerts(
    sites: &[Site],
    approvals: &[ScopingApproval],
    now: Timestamp,
    policy: &AlertPolicy,
) -> Vec<AlertDraft> {
    let mut drafts = Vec::new();

    for approval in approvals
        .iter()
        .filter(|a| a.status == ApprovalStatus::Pending)
    {
        let waiting = now.since(approval.submitted_at);
        if waiting <= policy.approval_overdue_ms {
            continue;
        }
        let severity = if waiting > policy.approval_overdue_ms.saturating_mul(2) {
            Severity::High
        } else {
            Severity::Medium
        };
        drafts.push(AlertDraft {
            kind: AlertKind::ApprovalOverdue,
            severity,
            subject: AlertSubject::Approval(approval.id),
            detail: None,
            title: "Approval overdue".to_string(),
            message: format!(
                "Scoping for {} (v{}) has waited {} days for review",
                approval.site_name,
                approval.version,
                days(waiting)
            ),
            expires_at: Some(now.plus_millis(policy.alert_ttl_ms)),
        });
    }

    for site in sites.iter().filter(|s| s.status != SiteStatus::Archived) {
        let Some(deployment) = &site.deployment else {
            continue;
        };

        let running = matches!(
            site.status,
            SiteStatus::DeploymentScheduled | SiteStatus::DeploymentInProgress
        ) && deployment.phase != DeploymentPhase::Completed;
        if running && deployment.planned_end < now {
            let late = now.since(deployment.planned_end);
            drafts.push(AlertDraft {
                kind: AlertKind::DeploymentDelay,
                severity: if days(late) >= 7 {
                    Severity::Critical
                } else {
                    Severity::High
                },
                subject: AlertSubject::Site(site.id),
                detail: None,
                title: "Deployment delayed".to_string(),
                message: format!(
                    "Deployment at {} is {} days past its planned end",
                    site.name,
                    days(late)
                ),
                expires_at: Some(now.plus_millis(policy.alert_ttl_ms)),
            });
        }

        for asset in &deployment.assets {
            let dates = [
                (AlertKind::LicenseExpiry, asset.license_expires),
                (AlertKind::WarrantyExpiry, asset.warranty_expires),
                (AlertKind::ServiceDue, asset.next_service_due),
            ];
            for (kind, due) in dates {
                if let Some(due) = due
                    && let Some(draft) = expiry_draft(kind, site, &asset.serial, due, now, policy)
                {
                    drafts.push(draft);
                }
            }
        }
    }

    drafts
}

// =============================================================================
// BOARD
// =============================================================================

/// The set of filed alerts and each consumer's flags on them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertBoard {
    alerts: BTreeMap<AlertId, Alert>,
    read: BTreeSet<(UserId, AlertId)>,
    dismissed: BTreeSet<(UserId, AlertId)>,
    next_id: u64,
}

impl AlertBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// File a draft unconditionally.
    pub fn insert(&mut self, draft: AlertDraft, now: Timestamp) -> AlertId {
        self.next_id += 1;
        let id = AlertId(self.next_id);
        self.alerts.insert(
            id,
            Alert {
                id,
                kind: draft.kind,
                severity: draft.severity,
                subject: draft.subject,
                detail: draft.detail,
                title: draft.title,
                message: draft.message,
                created_at: now,
                expires_at: draft.expires_at,
            },
        );
        id
    }

    /// File the drafts the board does not already hold. An alert someone
    /// dismissed is still held, so it is not refiled until it expires.
    pub fn sync(&mut self, drafts: Vec<AlertDraft>, now: Timestamp) -> Vec<AlertId> {
        let mut filed = Vec::new();
        for draft in drafts {
            let held = self.alerts.values().any(|alert| {
                !alert.is_expired(now)
                    && alert.key() == (draft.kind, draft.subject, draft.detail.as_deref())
            });
            if !held {
                filed.push(self.insert(draft, now));
            }
        }
        filed
    }

    fn visible(&self, viewer: &AlertViewer, id: AlertId) -> Option<&Alert> {
        self.alerts
            .get(&id)
            .filter(|alert| viewer.sees(alert.subject))
    }

    /// What `viewer` has not dismissed: most severe first, then newest.
    #[must_use]
    pub fn active(&self, viewer: &AlertViewer, now: Timestamp) -> Vec<AlertView> {
        let mut active: Vec<&Alert> = self
            .alerts
            .values()
            .filter(|alert| {
                viewer.sees(alert.subject)
                    && !alert.is_expired(now)
                    && !self.dismissed.contains(&(viewer.user.clone(), alert.id))
            })
            .collect();
        active.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        active
            .into_iter()
            .map(|alert| AlertView {
                read: self.read.contains(&(viewer.user.clone(), alert.id)),
                alert: alert.clone(),
            })
            .collect()
    }

    /// Hide an alert from `viewer` only. Returns false when the viewer
    /// cannot see such an alert.
    pub fn dismiss(&mut self, viewer: &AlertViewer, id: AlertId) -> bool {
        if self.visible(viewer, id).is_none() {
            return false;
        }
        self.dismissed.insert((viewer.user.clone(), id));
        true
    }

    pub fn mark_read(&mut self, viewer: &AlertViewer, id: AlertId) -> bool {
        if self.visible(viewer, id).is_none() {
            return false;
        }
        self.read.insert((viewer.user.clone(), id));
        true
    }

    /// Drop expired alerts and their flags. Returns how many were removed.
    pub fn purge_expired(&mut self, now: Timestamp) -> usize {
        let before = self.alerts.len();
        self.alerts.retain(|_, alert| !alert.is_expired(now));
        let alerts = &self.alerts;
        self.read.retain(|(_, id)| alerts.contains_key(id));
        self.dismissed.retain(|(_, id)| alerts.contains_key(id));
        before - self.alerts.len()
    }

    #[must_use]
    pub fn unread_count(&self, viewer: &AlertViewer, now: Timestamp) -> usize {
        self.active(viewer, now)
            .iter()
            .filter(|view| !view.read)
            .count()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::{Deployment, InstalledAsset};
    use crate::{Priority, RiskLevel, UserId};

    const DAY: u64 = 24 * 60 * 60 * 1_000;

    fn draft(kind: AlertKind, severity: Severity, site: u64) -> AlertDraft {
        AlertDraft {
            kind,
            severity,
            subject: AlertSubject::Site(SiteId(site)),
            detail: None,
            title: "t".to_string(),
            message: "m".to_string(),
            expires_at: Some(Timestamp(100)),
        }
    }

    fn deploying_site(planned_end: u64, assets: Vec<InstalledAsset>) -> Site {
        Site {
            id: SiteId(4),
            name: "Depot".to_string(),
            organization: "Compass".to_string(),
            status: SiteStatus::DeploymentInProgress,
            priority: Priority::Medium,
            risk_level: RiskLevel::Medium,
            location: None,
            go_live_date: None,
            assigned_ops_manager: None,
            assigned_deployment_engineer: None,
            created_by: UserId::new("u-admin"),
            created_at: Timestamp(0),
            updated_at: Timestamp(0),
            site_study: None,
            scoping: None,
            approval: None,
            procurement: None,
            deployment: Some(Deployment {
                scheduled_start: Timestamp(0),
                planned_end: Timestamp(planned_end),
                phase: DeploymentPhase::InProgress,
                assets,
            }),
            go_live: None,
            history: Vec::new(),
        }
    }

    fn viewer(user: &str, sites: &[u64]) -> AlertViewer {
        AlertViewer::new(
            UserId::new(user),
            sites.iter().map(|id| AlertSubject::Site(SiteId(*id))),
        )
    }

    #[test]
    fn active_orders_by_severity_then_newest() {
        let mut board = AlertBoard::new();
        let low = board.insert(draft(AlertKind::ServiceDue, Severity::Low, 1), Timestamp(1));
        let old_high = board.insert(draft(AlertKind::DeploymentDelay, Severity::High, 2), Timestamp(2));
        let new_high = board.insert(draft(AlertKind::DeploymentDelay, Severity::High, 3), Timestamp(5));
        let ids: Vec<AlertId> = board
            .active(&viewer("u-ops", &[1, 2, 3]), Timestamp(10))
            .iter()
            .map(|view| view.alert.id)
            .collect();
        assert_eq!(ids, vec![new_high, old_high, low]);
    }

    #[test]
    fn dismissed_and_expired_hidden() {
        let mut board = AlertBoard::new();
        let ops = viewer("u-ops", &[1, 2]);
        let a = board.insert(draft(AlertKind::ServiceDue, Severity::Low, 1), Timestamp(1));
        board.insert(draft(AlertKind::ServiceDue, Severity::Low, 2), Timestamp(1));
        assert!(board.dismiss(&ops, a));
        assert!(!board.dismiss(&ops, AlertId(99)));
        assert_eq!(board.active(&ops, Timestamp(10)).len(), 1);
        assert!(board.active(&ops, Timestamp(100)).is_empty());
        assert_eq!(board.purge_expired(Timestamp(100)), 2);
        assert!(board.dismissed.is_empty());
    }

    #[test]
    fn flags_belong_to_each_viewer() {
        let mut board = AlertBoard::new();
        let ops = viewer("u-ops", &[1]);
        let admin = viewer("u-admin", &[1]);
        let id = board.insert(draft(AlertKind::DeploymentDelay, Severity::High, 1), Timestamp(1));

        assert!(board.mark_read(&ops, id));
        assert_eq!(board.unread_count(&ops, Timestamp(2)), 0);
        assert_eq!(board.unread_count(&admin, Timestamp(2)), 1);

        assert!(board.dismiss(&ops, id));
        assert!(board.active(&ops, Timestamp(2)).is_empty());
        let seen = board.active(&admin, Timestamp(2));
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].read);
    }

    #[test]
    fn subjects_outside_viewer_are_hidden() {
        let mut board = AlertBoard::new();
        let id = board.insert(draft(AlertKind::DeploymentDelay, Severity::High, 7), Timestamp(1));
        let outsider = viewer("u-eng-2", &[1]);
        assert!(board.active(&outsider, Timestamp(2)).is_empty());
        assert!(!board.dismiss(&outsider, id));
        assert!(!board.mark_read(&outsider, id));
        assert_eq!(board.active(&viewer("u-eng", &[7]), Timestamp(2)).len(), 1);
    }

    #[test]
    fn sync_does_not_duplicate() {
        let mut board = AlertBoard::new();
        let drafts = vec![draft(AlertKind::DeploymentDelay, Severity::High, 1)];
        assert_eq!(board.sync(drafts.clone(), Timestamp(1)).len(), 1);
        assert!(board.sync(drafts, Timestamp(2)).is_empty());
        assert_eq!(board.alerts.len(), 1);
    }

    #[test]
    fn late_deployment_raises_delay() {
        let site = deploying_site(DAY, Vec::new());
        let drafts = derive_alerts(&[site], &[], Timestamp(3 * DAY), &AlertPolicy::default());
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, AlertKind::DeploymentDelay);
        assert_eq!(drafts[0].severity, Severity::High);
    }

    #[test]
    fn asset_dates_inside_horizon_raise_alerts() {
        let asset = InstalledAsset {
            serial: "SN-1".to_string(),
            kind: "till".to_string(),
            warranty_expires: Some(Timestamp(10 * DAY)),
            license_expires: Some(Timestamp(400 * DAY)),
            next_service_due: Some(Timestamp(DAY)),
        };
        let site = deploying_site(100 * DAY, vec![asset]);
        let drafts = derive_alerts(&[site], &[], Timestamp(2 * DAY), &AlertPolicy::default());
        let kinds: Vec<(AlertKind, Severity)> =
            drafts.iter().map(|d| (d.kind, d.severity)).collect();
        assert_eq!(
            kinds,
            vec![
                (AlertKind::WarrantyExpiry, Severity::Medium),
                (AlertKind::ServiceDue, Severity::Critical)
            ]
        );
    }
}
