//! # Property-Based Tests
//!
//! Totality and determinism of the access evaluator, and the shape of the
//! workflow, checked with proptest.

use launchpad_core::access::{accessible_pages, normalize_path};
use launchpad_core::{
    Actor, AutoSavePolicy, Role, RouteGuard, SaveCoordinator, SaveStatus, SiteStatus, Timestamp,
    TransitionIntent, can_access_page, tab_access, validate_transition, workflow_stage_label,
};
use proptest::prelude::*;

fn any_role() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

fn any_status() -> impl Strategy<Value = SiteStatus> {
    prop::sample::select(SiteStatus::ALL.to_vec())
}

fn any_intent() -> impl Strategy<Value = TransitionIntent> {
    prop::sample::select(vec![
        TransitionIntent::Advance,
        TransitionIntent::Resubmit,
        TransitionIntent::Archive,
        TransitionIntent::Override,
    ])
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Any role and any string give an answer, and the same answer twice.
    #[test]
    fn access_is_total_and_deterministic(role in any_role(), path in ".*") {
        let first = can_access_page(role, &path);
        let second = can_access_page(role, &path);
        prop_assert_eq!(first, second);
        prop_assert_eq!(tab_access(Some(role), &path), tab_access(Some(role), &path));
    }

    /// Granting a page grants every path below it.
    #[test]
    fn access_extends_to_sub_paths(role in any_role(), suffix in "[a-z0-9]{1,12}") {
        for page in accessible_pages(role) {
            if page == "/dashboard" {
                continue;
            }
            let below = format!("{}/{}", page, suffix);
            prop_assert!(can_access_page(role, &below), "{} {}", role, below);
        }
    }

    /// Query strings and trailing slashes never change a decision.
    #[test]
    fn decoration_does_not_change_decision(
        role in any_role(),
        path in "(/[a-z-]{1,12}){1,3}",
        query in "[a-z=&]{0,10}",
    ) {
        let decorated = format!("{}/?{}", path, query);
        prop_assert_eq!(can_access_page(role, &path), can_access_page(role, &decorated));
        prop_assert_eq!(normalize_path(&decorated), normalize_path(&path));
    }

    /// A denied tab always carries a message; a missing role always says so.
    #[test]
    fn denials_explain_themselves(role in any_role(), path in "/[a-z/-]{0,20}") {
        let access = tab_access(Some(role), &path);
        if !access.can_access {
            prop_assert!(access.message.is_some());
        }
        let none = tab_access(None, &path);
        prop_assert!(!none.can_access);
        prop_assert_eq!(none.message.as_deref(), Some("No role assigned"));
    }

    /// Ordinary transitions never move a site backward.
    #[test]
    fn advance_never_goes_backward(from in any_status(), to in any_status(), role in any_role()) {
        if validate_transition(from, to, role, TransitionIntent::Advance).is_ok() {
            prop_assert!(to.rank() > from.rank());
        }
    }

    /// Nothing leaves an archived site.
    #[test]
    fn archived_is_terminal(to in any_status(), role in any_role(), intent in any_intent()) {
        prop_assert!(validate_transition(SiteStatus::Archived, to, role, intent).is_err());
    }

    /// A denied non-dashboard page redirects at most once.
    #[test]
    fn guard_redirects_at_most_once(role in any_role(), path in "/[a-z-]{1,16}") {
        let mut guard = RouteGuard::new(path);
        let mut redirects = 0;
        for _ in 0..4 {
            if matches!(
                guard.resolve(Some(role), false),
                launchpad_core::GuardOutcome::Redirect { .. }
            ) {
                redirects += 1;
            }
        }
        prop_assert!(redirects <= 1);
    }

    /// However saves fail, a section never exceeds its attempt budget.
    #[test]
    fn autosave_respects_attempt_budget(failures in 0usize..10) {
        let policy = AutoSavePolicy::default();
        let mut coordinator: SaveCoordinator<u32> = SaveCoordinator::new(policy);
        coordinator.update_section("study", 1, Timestamp(0));
        let mut now = 0u64;
        let mut attempts = 0;
        for _ in 0..failures {
            now += 10_000;
            for name in coordinator.due_sections(Timestamp(now)) {
                if let Some(ticket) = coordinator.begin_save(&name) {
                    attempts += 1;
                    coordinator.complete_save(&ticket, Err("down".to_string()), Timestamp(now));
                }
            }
        }
        prop_assert!(attempts <= policy.max_attempts as usize);
        let status = coordinator.section("study").map(|s| s.status);
        if failures >= policy.max_attempts as usize {
            prop_assert_eq!(status, Some(SaveStatus::Error));
        }
    }
}

#[test]
fn every_stage_has_a_label() {
    for status in SiteStatus::ALL {
        assert!(!workflow_stage_label(status).is_empty());
    }
}

#[test]
fn actor_role_drives_site_creation() {
    let actor = Actor::new("u-1", "Uma", Role::User);
    let result = launchpad_core::Site::create(
        launchpad_core::SiteId(1),
        launchpad_core::NewSite {
            name: "A".to_string(),
            organization: "B".to_string(),
            ..Default::default()
        },
        &actor,
        Timestamp(0),
    );
    assert!(result.is_err_and(|e| e.is_denial()));
}
