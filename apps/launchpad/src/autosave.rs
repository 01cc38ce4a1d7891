//! # Auto-save Driver
//!
//! Runs the core [`SaveCoordinator`] against the registry.
//!
//! Each (user, site) pair owns one coordinator whose sections are the
//! site's stage forms, keyed by stage identifier. A tokio ticker starts the
//! saves that are due; a save writes the section's payload as a stage
//! document. On shutdown every unsaved payload gets one final write attempt
//! and failures are logged, so nothing is dropped silently.

use launchpad_core::site::stage_permission;
use launchpad_core::{
    Actor, AutoSavePolicy, LaunchpadError, Registry, SaveCoordinator, SaveStatus, SaveTicket,
    SiteId, StageDocument, StageKind, Timestamp, UserId, has_permission,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type DraftKey = (UserId, SiteId);

/// How long a fully saved draft stays listed before the ticker drops it.
const SETTLED_RETENTION_MS: u64 = 5 * 60 * 1_000;

struct Draft {
    actor: Actor,
    coordinator: SaveCoordinator<Value>,
    touched_at: Timestamp,
}

impl Draft {
    /// Nothing left to write and nothing in flight.
    fn is_settled(&self) -> bool {
        !self.coordinator.has_unsaved_changes()
            && self
                .coordinator
                .sections()
                .all(|(_, record)| record.status != SaveStatus::Saving)
    }
}

/// Save state of one section, as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionView {
    pub section: String,
    pub status: SaveStatus,
    pub retry_count: u32,
    pub has_unsaved_changes: bool,
    pub last_saved_at: Option<Timestamp>,
    pub last_error: Option<String>,
}

/// Outcome of the shutdown flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FlushReport {
    pub saved: usize,
    pub failed: usize,
}

/// Every user's unsaved stage forms.
#[derive(Clone)]
pub struct DraftStore {
    policy: AutoSavePolicy,
    registry: Arc<RwLock<Registry>>,
    drafts: Arc<Mutex<BTreeMap<DraftKey, Draft>>>,
}

impl std::fmt::Debug for DraftStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftStore")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn views(coordinator: &SaveCoordinator<Value>) -> Vec<SectionView> {
    coordinator
        .sections()
        .map(|(name, record)| SectionView {
            section: name.to_string(),
            status: record.status,
            retry_count: record.retry_count,
            has_unsaved_changes: record.has_unsaved_changes(),
            last_saved_at: record.last_saved_at,
            last_error: record.last_error.clone(),
        })
        .collect()
}

impl DraftStore {
    #[must_use]
    pub fn new(registry: Arc<RwLock<Registry>>, policy: AutoSavePolicy) -> Self {
        Self {
            policy,
            registry,
            drafts: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    // =========================================================================
    // EDITS
    // =========================================================================

    /// Record an edit of one stage form. The save happens after the debounce.
    pub async fn update(
        &self,
        actor: &Actor,
        site: SiteId,
        section: StageKind,
        payload: Value,
        now: Timestamp,
    ) -> Result<SectionView, LaunchpadError> {
        if section == StageKind::Approval {
            return Err(LaunchpadError::Validation(
                "approval decisions are not drafted".to_string(),
            ));
        }
        if !has_permission(actor.role, stage_permission(section)) {
            return Err(LaunchpadError::Forbidden(format!(
                "role {} may not edit the {} stage",
                actor.role, section
            )));
        }
        // Surfaces a missing or hidden site now rather than after three retries.
        self.registry.read().await.site(actor, site)?;

        let mut drafts = self.drafts.lock().await;
        let draft = drafts
            .entry((actor.user_id.clone(), site))
            .or_insert_with(|| Draft {
                actor: actor.clone(),
                coordinator: SaveCoordinator::new(self.policy),
                touched_at: now,
            });
        draft.actor = actor.clone();
        draft.touched_at = now;
        draft.coordinator.switch_section(section.as_str(), now);
        draft
            .coordinator
            .update_section(section.as_str(), payload, now);

        views(&draft.coordinator)
            .into_iter()
            .find(|view| view.section == section.as_str())
            .ok_or_else(|| LaunchpadError::IoError("section vanished".to_string()))
    }

    /// Save state of every drafted section of a site.
    pub async fn sections(&self, user: &UserId, site: SiteId) -> Vec<SectionView> {
        let drafts = self.drafts.lock().await;
        drafts
            .get(&(user.clone(), site))
            .map(|draft| views(&draft.coordinator))
            .unwrap_or_default()
    }

    /// Sections with edits not yet saved, across all users.
    pub async fn unsaved_count(&self) -> usize {
        self.drafts
            .lock()
            .await
            .values()
            .map(|draft| draft.coordinator.unsaved_count())
            .sum()
    }

    // =========================================================================
    // SAVING
    // =========================================================================

    async fn persist(
        &self,
        actor: &Actor,
        site: SiteId,
        section: &str,
        payload: Value,
        now: Timestamp,
    ) -> Result<(), String> {
        let kind: StageKind = section.parse().map_err(|e: LaunchpadError| e.to_string())?;
        let doc = StageDocument::from_json(kind, payload).map_err(|e| e.to_string())?;
        self.registry
            .write()
            .await
            .write_stage(actor, site, doc, now)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn complete(
        &self,
        key: &DraftKey,
        ticket: &SaveTicket<Value>,
        outcome: Result<(), String>,
        now: Timestamp,
    ) -> SaveStatus {
        let mut drafts = self.drafts.lock().await;
        let Some(draft) = drafts.get_mut(key) else {
            return SaveStatus::Idle;
        };
        let status = draft.coordinator.complete_save(ticket, outcome, now);
        draft.touched_at = now;
        match status {
            SaveStatus::Error => tracing::warn!(
                user = %key.0,
                site = %key.1,
                section = %ticket.section,
                "Auto-save gave up after repeated failures"
            ),
            SaveStatus::Saved => tracing::debug!(
                user = %key.0,
                site = %key.1,
                section = %ticket.section,
                "Section saved"
            ),
            _ => {}
        }
        status
    }

    async fn run_tickets(&self, batch: Vec<(DraftKey, Actor, SaveTicket<Value>)>, now: Timestamp) {
        for (key, actor, ticket) in batch {
            let outcome = self
                .persist(&actor, key.1, &ticket.section, ticket.payload.clone(), now)
                .await;
            self.complete(&key, &ticket, outcome, now).await;
        }
    }

    /// Start every save that is due. Returns how many were attempted.
    ///
    /// Drafts that have been settled for longer than the retention window
    /// are dropped first.
    pub async fn run_due(&self, now: Timestamp) -> usize {
        let batch: Vec<(DraftKey, Actor, SaveTicket<Value>)> = {
            let mut drafts = self.drafts.lock().await;
            let before = drafts.len();
            drafts.retain(|_, draft| {
                !draft.is_settled() || now.since(draft.touched_at) < SETTLED_RETENTION_MS
            });
            if drafts.len() < before {
                tracing::debug!(dropped = before - drafts.len(), "Settled drafts dropped");
            }
            let mut batch = Vec::new();
            for (key, draft) in drafts.iter_mut() {
                for name in draft.coordinator.due_sections(now) {
                    if let Some(ticket) = draft.coordinator.begin_save(&name) {
                        batch.push((key.clone(), draft.actor.clone(), ticket));
                    }
                }
            }
            batch
        };
        let attempted = batch.len();
        self.run_tickets(batch, now).await;
        attempted
    }

    /// Manual save of every unsaved section of one site, ignoring debounce
    /// and a spent retry budget.
    pub async fn force_flush(&self, user: &UserId, site: SiteId, now: Timestamp) -> Vec<SectionView> {
        let key = (user.clone(), site);
        let batch: Vec<(DraftKey, Actor, SaveTicket<Value>)> = {
            let mut drafts = self.drafts.lock().await;
            match drafts.get_mut(&key) {
                Some(draft) => draft
                    .coordinator
                    .force_save_all()
                    .into_iter()
                    .map(|ticket| (key.clone(), draft.actor.clone(), ticket))
                    .collect(),
                None => Vec::new(),
            }
        };
        self.run_tickets(batch, now).await;
        self.sections(user, site).await
    }

    /// Discard one drafted section.
    pub async fn discard(&self, user: &UserId, site: SiteId, section: StageKind) -> bool {
        let mut drafts = self.drafts.lock().await;
        drafts
            .get_mut(&(user.clone(), site))
            .is_some_and(|draft| draft.coordinator.reset_section(section.as_str()))
    }

    /// Take every unsaved payload and write each once.
    pub async fn flush_on_shutdown(&self, now: Timestamp) -> FlushReport {
        let drained: Vec<(DraftKey, Actor, Vec<(String, Value)>)> = {
            let mut drafts = self.drafts.lock().await;
            std::mem::take(&mut *drafts)
                .into_iter()
                .map(|(key, mut draft)| {
                    let unflushed = draft.coordinator.drain_unflushed();
                    (key, draft.actor, unflushed)
                })
                .collect()
        };

        let mut report = FlushReport::default();
        for (key, actor, sections) in drained {
            for (section, payload) in sections {
                match self.persist(&actor, key.1, &section, payload, now).await {
                    Ok(()) => report.saved += 1,
                    Err(e) => {
                        report.failed += 1;
                        tracing::error!(
                            user = %key.0,
                            site = %key.1,
                            section = %section,
                            error = %e,
                            "Unsaved section lost at shutdown"
                        );
                    }
                }
            }
        }
        if report.saved + report.failed > 0 {
            tracing::info!(saved = report.saved, failed = report.failed, "Auto-save flushed");
        }
        report
    }

    // =========================================================================
    // DRIVER
    // =========================================================================

    /// Spawn the ticker. Cancelling `cancel` flushes and ends the task.
    pub fn spawn(&self, tick: Duration, cancel: CancellationToken) -> JoinHandle<FlushReport> {
        let store = self.clone();
        tokio::spawn(async move {
            tracing::info!(tick_ms = tick.as_millis() as u64, "Auto-save driver started");
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Auto-save driver stopping");
                        break store.flush_on_shutdown(crate::now()).await;
                    }
                    _ = ticker.tick() => {
                        store.run_due(crate::now()).await;
                    }
                }
            }
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use launchpad_core::{NewSite, Role, SiteStatus};
    use serde_json::json;

    fn engineer() -> Actor {
        Actor::new("u-eng", "Eli", Role::DeploymentEngineer)
    }

    async fn store_with_site() -> (DraftStore, SiteId) {
        let mut registry = Registry::new();
        let admin = Actor::new("u-admin", "Ada", Role::Admin);
        let site = registry
            .create_site(
                &admin,
                NewSite {
                    name: "Leeds".to_string(),
                    organization: "Compass".to_string(),
                    assigned_deployment_engineer: Some(UserId::new("u-eng")),
                    ..NewSite::default()
                },
                Timestamp(0),
            )
            .unwrap();
        let registry = Arc::new(RwLock::new(registry));
        (DraftStore::new(registry, AutoSavePolicy::default()), site.id)
    }

    #[tokio::test]
    async fn edit_saves_after_debounce() {
        let (store, site) = store_with_site().await;
        let view = store
            .update(&engineer(), site, StageKind::SiteStudy, json!({"findings": "ok"}), Timestamp(1_000))
            .await
            .unwrap();
        assert_eq!(view.status, SaveStatus::Pending);

        assert_eq!(store.run_due(Timestamp(1_200)).await, 0);
        assert_eq!(store.run_due(Timestamp(1_500)).await, 1);

        let sections = store.sections(&UserId::new("u-eng"), site).await;
        assert_eq!(sections[0].status, SaveStatus::Saved);
        let saved = store.registry.read().await.site(&engineer(), site).unwrap();
        assert_eq!(saved.status, SiteStatus::StudyInProgress);
        assert_eq!(saved.site_study.unwrap().findings, "ok");
    }

    #[tokio::test]
    async fn failing_section_stops_after_three_attempts() {
        let (store, site) = store_with_site().await;
        // Scoping is locked until the study completes.
        store
            .update(&engineer(), site, StageKind::Scoping, json!({}), Timestamp(0))
            .await
            .unwrap();
        let mut now = 0;
        for _ in 0..6 {
            now += 5_000;
            store.run_due(Timestamp(now)).await;
        }
        let sections = store.sections(&UserId::new("u-eng"), site).await;
        assert_eq!(sections[0].status, SaveStatus::Error);
        assert_eq!(sections[0].retry_count, 3);
        assert_eq!(store.run_due(Timestamp(now + 60_000)).await, 0);
    }

    #[tokio::test]
    async fn force_flush_saves_immediately() {
        let (store, site) = store_with_site().await;
        store
            .update(&engineer(), site, StageKind::SiteStudy, json!({"completed": true}), Timestamp(0))
            .await
            .unwrap();
        let views = store.force_flush(&UserId::new("u-eng"), site, Timestamp(10)).await;
        assert_eq!(views[0].status, SaveStatus::Saved);
        assert_eq!(store.unsaved_count().await, 0);
    }

    #[tokio::test]
    async fn settled_drafts_are_dropped_after_retention() {
        let (store, site) = store_with_site().await;
        let user = UserId::new("u-eng");
        store
            .update(&engineer(), site, StageKind::SiteStudy, json!({"findings": "ok"}), Timestamp(0))
            .await
            .unwrap();
        store.force_flush(&user, site, Timestamp(10)).await;

        store.run_due(Timestamp(10 + SETTLED_RETENTION_MS - 1)).await;
        assert_eq!(store.sections(&user, site).await.len(), 1);
        store.run_due(Timestamp(10 + SETTLED_RETENTION_MS)).await;
        assert!(store.sections(&user, site).await.is_empty());
        assert!(store.drafts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unsaved_drafts_outlive_retention() {
        let (store, site) = store_with_site().await;
        let user = UserId::new("u-eng");
        // Scoping is locked, so the save fails and the payload stays.
        store
            .update(&engineer(), site, StageKind::Scoping, json!({}), Timestamp(0))
            .await
            .unwrap();
        store.force_flush(&user, site, Timestamp(10)).await;
        store.run_due(Timestamp(10 * SETTLED_RETENTION_MS)).await;
        assert_eq!(store.sections(&user, site).await.len(), 1);
        assert_eq!(store.unsaved_count().await, 1);
    }

    #[tokio::test]
    async fn role_without_stage_permission_is_refused() {
        let (store, site) = store_with_site().await;
        let user = Actor::new("u-eng", "Eli", Role::User);
        let err = store
            .update(&user, site, StageKind::SiteStudy, json!({}), Timestamp(0))
            .await
            .unwrap_err();
        assert!(err.is_denial());
    }

    #[tokio::test]
    async fn shutdown_flush_writes_pending_edits() {
        let (store, site) = store_with_site().await;
        store
            .update(&engineer(), site, StageKind::SiteStudy, json!({"findings": "x"}), Timestamp(0))
            .await
            .unwrap();
        let report = store.flush_on_shutdown(Timestamp(1)).await;
        assert_eq!(report, FlushReport { saved: 1, failed: 0 });
        assert!(store.sections(&UserId::new("u-eng"), site).await.is_empty());
    }
}
