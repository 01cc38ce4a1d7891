//! # Auto-save Coordinator
//!
//! Debounced, retried saving of form sections.
//!
//! The coordinator owns one [`SectionRecord`] per section and never performs
//! I/O itself. The caller polls [`SaveCoordinator::due_sections`], takes a
//! [`SaveTicket`] with [`SaveCoordinator::begin_save`], writes the payload
//! wherever it goes, and reports back through
//! [`SaveCoordinator::complete_save`]. Time is always passed in.
//!
//! ## Section Lifecycle
//!
//! ```text
//! Idle --edit--> Pending --due--> Saving --ok--> Saved
//!                   ^                |
//!                   +---retry--------+ (attempts < max)
//!                                    \--fail--> Error (attempts == max)
//! ```
//!
//! A section in `Error` is not retried automatically. A new edit or a manual
//! [`SaveCoordinator::force_save`] starts a fresh attempt budget.

use crate::Timestamp;
use crate::primitives::{AUTOSAVE_DEBOUNCE_MS, AUTOSAVE_MAX_ATTEMPTS, AUTOSAVE_RETRY_DELAY_MS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Timing and retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSavePolicy {
    pub debounce_ms: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for AutoSavePolicy {
    fn default() -> Self {
        Self {
            debounce_ms: AUTOSAVE_DEBOUNCE_MS,
            max_attempts: AUTOSAVE_MAX_ATTEMPTS,
            retry_delay_ms: AUTOSAVE_RETRY_DELAY_MS,
        }
    }
}

/// Save state of one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    #[default]
    Idle,
    Pending,
    Saving,
    Saved,
    Error,
}

/// Per-section task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionRecord<P> {
    pub status: SaveStatus,
    /// Failed attempts for the current payload.
    pub retry_count: u32,
    /// Latest edit not yet confirmed as saved.
    pub pending_payload: Option<P>,
    pub last_edit: Option<Timestamp>,
    pub next_attempt_at: Option<Timestamp>,
    pub last_saved_at: Option<Timestamp>,
    pub last_error: Option<String>,
    #[serde(skip)]
    generation: u64,
}

impl<P> Default for SectionRecord<P> {
    fn default() -> Self {
        Self {
            status: SaveStatus::Idle,
            retry_count: 0,
            pending_payload: None,
            last_edit: None,
            next_attempt_at: None,
            last_saved_at: None,
            last_error: None,
            generation: 0,
        }
    }
}

impl<P> SectionRecord<P> {
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.pending_payload.is_some()
    }
}

/// Claim on one in-flight save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket<P> {
    pub section: String,
    pub payload: P,
    generation: u64,
}

/// Coordinates saving across all sections of one form.
#[derive(Debug, Clone)]
pub struct SaveCoordinator<P> {
    policy: AutoSavePolicy,
    sections: BTreeMap<String, SectionRecord<P>>,
    active_section: Option<String>,
}

impl<P: Clone> SaveCoordinator<P> {
    #[must_use]
    pub fn new(policy: AutoSavePolicy) -> Self {
        Self {
            policy,
            sections: BTreeMap::new(),
            active_section: None,
        }
    }

    #[must_use]
    pub fn policy(&self) -> AutoSavePolicy {
        self.policy
    }

    #[must_use]
    pub fn section(&self, name: &str) -> Option<&SectionRecord<P>> {
        self.sections.get(name)
    }

    /// All section records by name.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &SectionRecord<P>)> {
        self.sections.iter().map(|(name, record)| (name.as_str(), record))
    }

    #[must_use]
    pub fn active_section(&self) -> Option<&str> {
        self.active_section.as_deref()
    }

    /// Record an edit. The section becomes due after the debounce period.
    pub fn update_section(&mut self, name: &str, payload: P, now: Timestamp) {
        let debounce = self.policy.debounce_ms;
        let record = self.sections.entry(name.to_string()).or_default();
        record.generation += 1;
        record.pending_payload = Some(payload);
        record.last_edit = Some(now);
        record.retry_count = 0;
        record.last_error = None;
        record.next_attempt_at = Some(now.plus_millis(debounce));
        if record.status != SaveStatus::Saving {
            record.status = SaveStatus::Pending;
        }
    }

    /// Move focus to another section. Unsaved edits of the section being
    /// left become due at once.
    pub fn switch_section(&mut self, name: &str, now: Timestamp) {
        if let Some(previous) = self.active_section.take()
            && previous != name
            && let Some(record) = self.sections.get_mut(&previous)
            && record.status == SaveStatus::Pending
        {
            record.next_attempt_at = Some(now);
        }
        self.active_section = Some(name.to_string());
    }

    /// Sections whose automatic save should start now.
    #[must_use]
    pub fn due_sections(&self, now: Timestamp) -> Vec<String> {
        self.sections
            .iter()
            .filter(|(_, record)| {
                record.status == SaveStatus::Pending
                    && record.next_attempt_at.is_some_and(|at| at <= now)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Start an automatic save. `None` when nothing is pending, a save is
    /// already in flight, or the section has given up.
    pub fn begin_save(&mut self, name: &str) -> Option<SaveTicket<P>> {
        let record = self.sections.get_mut(name)?;
        if record.status != SaveStatus::Pending {
            return None;
        }
        Self::claim(name, record)
    }

    fn claim(name: &str, record: &mut SectionRecord<P>) -> Option<SaveTicket<P>> {
        let payload = record.pending_payload.clone()?;
        record.status = SaveStatus::Saving;
        record.next_attempt_at = None;
        Some(SaveTicket {
            section: name.to_string(),
            payload,
            generation: record.generation,
        })
    }

    /// Report the outcome of a save and return the section's new status.
    pub fn complete_save(
        &mut self,
        ticket: &SaveTicket<P>,
        outcome: Result<(), String>,
        now: Timestamp,
    ) -> SaveStatus {
        let policy = self.policy;
        let Some(record) = self.sections.get_mut(&ticket.section) else {
            return SaveStatus::Idle;
        };
        let superseded = record.generation != ticket.generation;

        match outcome {
            Ok(()) if superseded => {
                record.status = SaveStatus::Pending;
                record.next_attempt_at = record
                    .last_edit
                    .map(|edit| edit.plus_millis(policy.debounce_ms));
            }
            Ok(()) => {
                record.status = SaveStatus::Saved;
                record.pending_payload = None;
                record.retry_count = 0;
                record.last_error = None;
                record.last_saved_at = Some(now);
            }
            Err(message) => {
                record.last_error = Some(message);
                if superseded {
                    record.status = SaveStatus::Pending;
                    record.next_attempt_at = Some(now.plus_millis(policy.debounce_ms));
                } else {
                    record.retry_count += 1;
                    if record.retry_count >= policy.max_attempts {
                        record.status = SaveStatus::Error;
                        record.next_attempt_at = None;
                    } else {
                        record.status = SaveStatus::Pending;
                        record.next_attempt_at = Some(now.plus_millis(policy.retry_delay_ms));
                    }
                }
            }
        }
        record.status
    }

    /// Manual save of one section, ignoring debounce and a spent budget.
    pub fn force_save(&mut self, name: &str) -> Option<SaveTicket<P>> {
        let record = self.sections.get_mut(name)?;
        if record.status == SaveStatus::Saving {
            return None;
        }
        record.retry_count = 0;
        Self::claim(name, record)
    }

    /// Manual save of every section with unsaved changes.
    pub fn force_save_all(&mut self) -> Vec<SaveTicket<P>> {
        let names: Vec<String> = self
            .sections
            .iter()
            .filter(|(_, record)| record.has_unsaved_changes())
            .map(|(name, _)| name.clone())
            .collect();
        names
            .iter()
            .filter_map(|name| self.force_save(name))
            .collect()
    }

    #[must_use]
    pub fn unsaved_count(&self) -> usize {
        self.sections
            .values()
            .filter(|record| record.has_unsaved_changes())
            .count()
    }

    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved_count() > 0
    }

    /// Forget a section, discarding any unsaved edit.
    pub fn reset_section(&mut self, name: &str) -> bool {
        self.sections.remove(name).is_some()
    }

    pub fn clear_all(&mut self) {
        self.sections.clear();
        self.active_section = None;
    }

    /// Take every unsaved payload out of the coordinator, for a final flush.
    pub fn drain_unflushed(&mut self) -> Vec<(String, P)> {
        let drained = std::mem::take(&mut self.sections);
        self.active_section = None;
        drained
            .into_iter()
            .filter_map(|(name, record)| record.pending_payload.map(|payload| (name, payload)))
            .collect()
    }
}

impl<P: Clone> Default for SaveCoordinator<P> {
    fn default() -> Self {
        Self::new(AutoSavePolicy::default())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn coordinator() -> SaveCoordinator<&'static str> {
        SaveCoordinator::default()
    }

    #[test]
    fn edit_is_debounced() {
        let mut c = coordinator();
        c.update_section("study", "a", Timestamp(0));
        assert!(c.due_sections(Timestamp(499)).is_empty());
        assert_eq!(c.due_sections(Timestamp(500)), vec!["study".to_string()]);
    }

    #[test]
    fn later_edit_restarts_debounce() {
        let mut c = coordinator();
        c.update_section("study", "a", Timestamp(0));
        c.update_section("study", "ab", Timestamp(400));
        assert!(c.due_sections(Timestamp(600)).is_empty());
        assert_eq!(c.due_sections(Timestamp(900)).len(), 1);
    }

    #[test]
    fn successful_save_clears_payload() {
        let mut c = coordinator();
        c.update_section("study", "a", Timestamp(0));
        let ticket = c.begin_save("study").unwrap();
        assert_eq!(c.section("study").unwrap().status, SaveStatus::Saving);
        assert_eq!(c.complete_save(&ticket, Ok(()), Timestamp(600)), SaveStatus::Saved);
        assert!(!c.has_unsaved_changes());
    }

    #[test]
    fn three_failures_mark_error_and_stop_retrying() {
        let mut c = coordinator();
        c.update_section("study", "a", Timestamp(0));
        let mut now = 500;
        for attempt in 1..=3 {
            let ticket = c.begin_save("study").unwrap();
            let status = c.complete_save(&ticket, Err("offline".to_string()), Timestamp(now));
            if attempt < 3 {
                assert_eq!(status, SaveStatus::Pending);
                now += 1_000;
                assert_eq!(c.due_sections(Timestamp(now)).len(), 1);
            } else {
                assert_eq!(status, SaveStatus::Error);
            }
        }
        assert!(c.due_sections(Timestamp(u64::MAX)).is_empty());
        assert!(c.begin_save("study").is_none());
        assert_eq!(c.section("study").unwrap().retry_count, 3);
        assert!(c.has_unsaved_changes());
    }

    #[test]
    fn force_save_recovers_from_error() {
        let mut c = coordinator();
        c.update_section("study", "a", Timestamp(0));
        for _ in 0..3 {
            let ticket = c.begin_save("study").unwrap();
            c.complete_save(&ticket, Err("offline".to_string()), Timestamp(1));
        }
        let ticket = c.force_save("study").unwrap();
        assert_eq!(c.section("study").unwrap().status, SaveStatus::Saving);
        assert_eq!(c.complete_save(&ticket, Ok(()), Timestamp(2)), SaveStatus::Saved);
    }

    #[test]
    fn edit_during_save_keeps_section_pending() {
        let mut c = coordinator();
        c.update_section("study", "a", Timestamp(0));
        let ticket = c.begin_save("study").unwrap();
        c.update_section("study", "ab", Timestamp(550));
        assert_eq!(c.complete_save(&ticket, Ok(()), Timestamp(560)), SaveStatus::Pending);
        assert_eq!(c.section("study").unwrap().pending_payload, Some("ab"));
        assert_eq!(c.due_sections(Timestamp(1_050)).len(), 1);
    }

    #[test]
    fn switching_sections_flushes_the_previous_one() {
        let mut c = coordinator();
        c.switch_section("study", Timestamp(0));
        c.update_section("study", "a", Timestamp(0));
        c.switch_section("scoping", Timestamp(100));
        assert_eq!(c.due_sections(Timestamp(100)), vec!["study".to_string()]);
        assert_eq!(c.active_section(), Some("scoping"));
    }

    #[test]
    fn force_save_all_and_drain() {
        let mut c = coordinator();
        c.update_section("a", "1", Timestamp(0));
        c.update_section("b", "2", Timestamp(0));
        assert_eq!(c.unsaved_count(), 2);
        assert_eq!(c.force_save_all().len(), 2);
        assert!(c.force_save_all().is_empty());
        let drained = c.drain_unflushed();
        assert_eq!(drained, vec![("a".to_string(), "1"), ("b".to_string(), "2")]);
        assert_eq!(c.unsaved_count(), 0);
    }

    #[test]
    fn reset_and_clear() {
        let mut c = coordinator();
        c.update_section("a", "1", Timestamp(0));
        assert!(c.reset_section("a"));
        assert!(!c.reset_section("a"));
        c.update_section("b", "2", Timestamp(0));
        c.clear_all();
        assert!(c.section("b").is_none());
    }
}
