//! # redb-backed Record Store
//!
//! Disk-backed storage for sites, approvals and approval history.
//!
//! - Sites and history entries are postcard-encoded
//! - Approval rows are JSON-encoded, since they carry free-form JSON columns
//! - History is keyed by `(approval_id, action_id)` so one approval's entries
//!   come back in write order from a single range scan

use super::{RecordStore, Sequence};
use crate::approval::{ApprovalAction, ScopingApprovalRow};
use crate::site::Site;
use crate::{ApprovalId, LaunchpadError, SiteId};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Sites: SiteId(u64) -> postcard bytes
const SITES: TableDefinition<u64, &[u8]> = TableDefinition::new("sites");

/// Approvals: ApprovalId(u64) -> JSON row bytes
const APPROVALS: TableDefinition<u64, &[u8]> = TableDefinition::new("approvals");

/// History: (approval_id, action_id) -> postcard bytes
const ACTIONS: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("approval_actions");

/// Sequences: key string -> last issued id
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

fn io(e: impl std::fmt::Display) -> LaunchpadError {
    LaunchpadError::IoError(e.to_string())
}

fn ser(e: impl std::fmt::Display) -> LaunchpadError {
    LaunchpadError::SerializationError(e.to_string())
}

/// A disk-backed record store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LaunchpadError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io)?;
            let _ = write_txn.open_table(SITES).map_err(io)?;
            let _ = write_txn.open_table(APPROVALS).map_err(io)?;
            let _ = write_txn.open_table(ACTIONS).map_err(io)?;
            let _ = write_txn.open_table(METADATA).map_err(io)?;
            write_txn.commit().map_err(io)?;
        }

        Ok(Self { db })
    }

    /// Compact the database file. Returns whether any space was reclaimed.
    pub fn compact(&mut self) -> Result<bool, LaunchpadError> {
        self.db.compact().map_err(io)
    }
}

impl RecordStore for RedbStore {
    fn next_id(&mut self, sequence: Sequence) -> Result<u64, LaunchpadError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        let next = {
            let mut table = write_txn.open_table(METADATA).map_err(io)?;
            let current = table
                .get(sequence.key())
                .map_err(io)?
                .map(|v| v.value())
                .unwrap_or(0);
            let next = current
                .checked_add(1)
                .ok_or_else(|| io(format!("{} exhausted", sequence.key())))?;
            table.insert(sequence.key(), next).map_err(io)?;
            next
        };
        write_txn.commit().map_err(io)?;
        Ok(next)
    }

    fn put_site(&mut self, site: &Site) -> Result<(), LaunchpadError> {
        let bytes = postcard::to_allocvec(site).map_err(ser)?;
        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = write_txn.open_table(SITES).map_err(io)?;
            table.insert(site.id.0, bytes.as_slice()).map_err(io)?;
        }
        write_txn.commit().map_err(io)?;
        Ok(())
    }

    fn get_site(&self, id: SiteId) -> Result<Option<Site>, LaunchpadError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(SITES).map_err(io)?;
        match table.get(id.0).map_err(io)? {
            Some(data) => Ok(Some(postcard::from_bytes(data.value()).map_err(ser)?)),
            None => Ok(None),
        }
    }

    fn list_sites(&self) -> Result<Vec<Site>, LaunchpadError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(SITES).map_err(io)?;

        let mut sites = Vec::new();
        for entry in table.iter().map_err(io)? {
            let (_, value) = entry.map_err(io)?;
            sites.push(postcard::from_bytes(value.value()).map_err(ser)?);
        }
        Ok(sites)
    }

    fn get_approval(&self, id: ApprovalId) -> Result<Option<ScopingApprovalRow>, LaunchpadError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(APPROVALS).map_err(io)?;
        match table.get(id.0).map_err(io)? {
            Some(data) => Ok(Some(serde_json::from_slice(data.value()).map_err(ser)?)),
            None => Ok(None),
        }
    }

    fn list_approvals(&self) -> Result<Vec<ScopingApprovalRow>, LaunchpadError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(APPROVALS).map_err(io)?;

        let mut rows = Vec::new();
        for entry in table.iter().map_err(io)? {
            let (_, value) = entry.map_err(io)?;
            rows.push(serde_json::from_slice(value.value()).map_err(ser)?);
        }
        Ok(rows)
    }

    fn commit_approval(
        &mut self,
        row: &ScopingApprovalRow,
        action: &ApprovalAction,
        site: &Site,
    ) -> Result<(), LaunchpadError> {
        let row_bytes = serde_json::to_vec(row).map_err(ser)?;
        let action_bytes = postcard::to_allocvec(action).map_err(ser)?;
        let site_bytes = postcard::to_allocvec(site).map_err(ser)?;

        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let mut approvals = write_txn.open_table(APPROVALS).map_err(io)?;
            approvals.insert(row.id, row_bytes.as_slice()).map_err(io)?;
            let mut actions = write_txn.open_table(ACTIONS).map_err(io)?;
            actions
                .insert((action.approval_id.0, action.id.0), action_bytes.as_slice())
                .map_err(io)?;
            let mut sites = write_txn.open_table(SITES).map_err(io)?;
            sites.insert(site.id.0, site_bytes.as_slice()).map_err(io)?;
        }
        write_txn.commit().map_err(io)?;
        Ok(())
    }

    fn actions_for(&self, approval: ApprovalId) -> Result<Vec<ApprovalAction>, LaunchpadError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(ACTIONS).map_err(io)?;

        let mut actions = Vec::new();
        for entry in table
            .range((approval.0, 0u64)..=(approval.0, u64::MAX))
            .map_err(io)?
        {
            let (_, value) = entry.map_err(io)?;
            actions.push(postcard::from_bytes(value.value()).map_err(ser)?);
        }
        Ok(actions)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::Timestamp;
    use crate::roles::Role;
    use crate::site::NewSite;
    use crate::{ActionId, Actor};
    use tempfile::tempdir;

    fn site(id: u64) -> Site {
        let input = NewSite {
            name: format!("Site {}", id),
            organization: "Compass".to_string(),
            ..NewSite::default()
        };
        Site::create(
            SiteId(id),
            input,
            &Actor::new("u-admin", "Ada", Role::Admin),
            Timestamp(id),
        )
        .expect("create site")
    }

    #[test]
    fn sites_survive_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("launchpad.redb");
        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            assert_eq!(store.next_id(Sequence::Site).expect("id"), 1);
            store.put_site(&site(1)).expect("put");
            store.put_site(&site(2)).expect("put");
        }

        let mut store = RedbStore::open(&db_path).expect("reopen db");
        assert_eq!(store.list_sites().expect("list").len(), 2);
        assert_eq!(store.get_site(SiteId(2)).expect("get"), Some(site(2)));
        assert_eq!(store.next_id(Sequence::Site).expect("id"), 2);
    }

    fn row(id: u64, site_id: u64) -> ScopingApprovalRow {
        ScopingApprovalRow {
            id,
            site_id,
            site_name: format!("Site {}", site_id),
            deployment_engineer_id: "u-eng".to_string(),
            deployment_engineer_name: "Eli".to_string(),
            ops_manager_id: None,
            ops_manager_name: None,
            status: "pending".to_string(),
            submitted_at: id,
            reviewed_at: None,
            reviewed_by: None,
            review_comment: None,
            rejection_reason: None,
            scoping_data: serde_json::json!({}),
            cost_breakdown: serde_json::json!({}),
            version: 1,
            previous_version_id: None,
            created_at: id,
            updated_at: id,
        }
    }

    #[test]
    fn actions_are_scoped_to_their_approval() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("a.redb")).expect("open db");
        let actor = Actor::new("u-eng", "Eli", Role::DeploymentEngineer);
        for (id, approval) in [(1, 10), (2, 11), (3, 10)] {
            let action = ApprovalAction::record(
                ActionId(id),
                ApprovalId(approval),
                crate::approval::ApprovalActionKind::Submit,
                &actor,
                None,
                Timestamp(id),
            );
            store
                .commit_approval(&row(approval, 1), &action, &site(1))
                .expect("commit");
        }
        let ids: Vec<u64> = store
            .actions_for(ApprovalId(10))
            .expect("actions")
            .iter()
            .map(|a| a.id.0)
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(store.list_approvals().expect("list").len(), 2);
        assert_eq!(store.get_site(SiteId(1)).expect("get"), Some(site(1)));
    }

    #[test]
    fn compaction_keeps_records() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("c.redb");
        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            for id in 1..=20 {
                store.put_site(&site(id)).expect("put");
            }
            store.compact().expect("compact");
        }
        let store = RedbStore::open(&db_path).expect("reopen db");
        assert_eq!(store.list_sites().expect("list").len(), 20);
    }
}
