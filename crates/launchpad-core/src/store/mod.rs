//! # Record Store
//!
//! Where sites, approvals and approval history live.
//!
//! Two backends implement [`RecordStore`]:
//! - [`MemoryStore`]: ordered maps, volatile
//! - [`RedbStore`]: disk-backed ACID storage on redb
//!
//! Approvals are stored in their row shape ([`ScopingApprovalRow`]); the
//! conversion to the application shape happens above the store.

mod redb_store;

pub use redb_store::RedbStore;

use crate::approval::{ApprovalAction, ScopingApprovalRow};
use crate::site::Site;
use crate::{ApprovalId, LaunchpadError, SiteId};
use std::collections::BTreeMap;

/// Identifier sequences handed out by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Sequence {
    Site,
    Approval,
    Action,
}

impl Sequence {
    pub(crate) fn key(&self) -> &'static str {
        match self {
            Sequence::Site => "next_site_id",
            Sequence::Approval => "next_approval_id",
            Sequence::Action => "next_action_id",
        }
    }
}

/// Storage operations shared by every backend.
pub trait RecordStore {
    /// Reserve the next identifier of a sequence. Identifiers start at 1.
    fn next_id(&mut self, sequence: Sequence) -> Result<u64, LaunchpadError>;

    /// Insert or replace a site.
    fn put_site(&mut self, site: &Site) -> Result<(), LaunchpadError>;

    fn get_site(&self, id: SiteId) -> Result<Option<Site>, LaunchpadError>;

    /// All sites in id order.
    fn list_sites(&self) -> Result<Vec<Site>, LaunchpadError>;

    fn get_approval(&self, id: ApprovalId) -> Result<Option<ScopingApprovalRow>, LaunchpadError>;

    /// All approval rows in id order.
    fn list_approvals(&self) -> Result<Vec<ScopingApprovalRow>, LaunchpadError>;

    /// Write an approval row, its history entry and its site together.
    ///
    /// Either all three land or none does.
    fn commit_approval(
        &mut self,
        row: &ScopingApprovalRow,
        action: &ApprovalAction,
        site: &Site,
    ) -> Result<(), LaunchpadError>;

    /// History of one approval in the order it was written.
    fn actions_for(&self, approval: ApprovalId) -> Result<Vec<ApprovalAction>, LaunchpadError>;
}

/// Volatile store on ordered maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sites: BTreeMap<SiteId, Site>,
    approvals: BTreeMap<u64, ScopingApprovalRow>,
    actions: BTreeMap<u64, ApprovalAction>,
    sequences: BTreeMap<Sequence, u64>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn next_id(&mut self, sequence: Sequence) -> Result<u64, LaunchpadError> {
        let counter = self.sequences.entry(sequence).or_insert(0);
        *counter = counter.checked_add(1).ok_or_else(|| {
            LaunchpadError::IoError(format!("{} exhausted", sequence.key()))
        })?;
        Ok(*counter)
    }

    fn put_site(&mut self, site: &Site) -> Result<(), LaunchpadError> {
        self.sites.insert(site.id, site.clone());
        Ok(())
    }

    fn get_site(&self, id: SiteId) -> Result<Option<Site>, LaunchpadError> {
        Ok(self.sites.get(&id).cloned())
    }

    fn list_sites(&self) -> Result<Vec<Site>, LaunchpadError> {
        Ok(self.sites.values().cloned().collect())
    }

    fn get_approval(&self, id: ApprovalId) -> Result<Option<ScopingApprovalRow>, LaunchpadError> {
        Ok(self.approvals.get(&id.0).cloned())
    }

    fn list_approvals(&self) -> Result<Vec<ScopingApprovalRow>, LaunchpadError> {
        Ok(self.approvals.values().cloned().collect())
    }

    fn commit_approval(
        &mut self,
        row: &ScopingApprovalRow,
        action: &ApprovalAction,
        site: &Site,
    ) -> Result<(), LaunchpadError> {
        self.approvals.insert(row.id, row.clone());
        self.actions.insert(action.id.0, action.clone());
        self.sites.insert(site.id, site.clone());
        Ok(())
    }

    fn actions_for(&self, approval: ApprovalId) -> Result<Vec<ApprovalAction>, LaunchpadError> {
        Ok(self
            .actions
            .values()
            .filter(|action| action.approval_id == approval)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_independent_and_start_at_one() {
        let mut store = MemoryStore::new();
        assert_eq!(store.next_id(Sequence::Site).ok(), Some(1));
        assert_eq!(store.next_id(Sequence::Site).ok(), Some(2));
        assert_eq!(store.next_id(Sequence::Approval).ok(), Some(1));
    }

    #[test]
    fn empty_store_lists_nothing() {
        let store = MemoryStore::new();
        assert!(store.list_sites().map(|s| s.is_empty()).unwrap_or(false));
        assert!(matches!(store.get_site(SiteId(1)), Ok(None)));
    }
}
