//! # launchpad-core
//!
//! The rules of the Launchpad site deployment tracker.
//!
//! This crate holds everything that decides: who may open which page, which
//! status a site may move to, when a stage unlocks, how an approval is
//! reviewed, which alerts are due and when a form section gets saved.
//!
//! ## Architectural Constraints
//!
//! - Pure and synchronous: NO async, NO network, NO wall clock
//! - Every "now" is an argument, so every decision is reproducible
//! - Denials and validation failures are values, never panics
//! - One authorization table ([`access`]) answers every permission question

// =============================================================================
// MODULES
// =============================================================================

pub mod access;
pub mod alert;
pub mod approval;
pub mod autosave;
pub mod guard;
pub mod primitives;
pub mod registry;
pub mod roles;
pub mod site;
pub mod store;
pub mod types;
pub mod workflow;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{
    ActionId, Actor, AlertId, ApprovalId, LaunchpadError, Priority, RiskLevel, SiteId, Timestamp,
    UserId,
};

// =============================================================================
// RE-EXPORTS: Authorization
// =============================================================================

pub use access::{
    AccessLevel, PageAction, Permission, TabAccess, can_access_page, can_perform, has_permission,
    tab_access,
};
pub use guard::{GuardOutcome, GuardState, RouteGuard};
pub use roles::{Role, RoleConfig, RoleDisplay, get_role_config, role_display};

// =============================================================================
// RE-EXPORTS: Domain
// =============================================================================

pub use alert::{
    Alert, AlertBoard, AlertDraft, AlertKind, AlertPolicy, AlertSubject, AlertView, AlertViewer,
    Severity, derive_alerts,
};
pub use approval::{
    ApprovalAction, ApprovalActionKind, ApprovalActionRow, ApprovalStatus, NewApprovalRow,
    ScopingApproval, ScopingApprovalRow, convert_action_row_to_action,
    convert_approval_row_to_approval, convert_approval_to_row,
};
pub use autosave::{AutoSavePolicy, SaveCoordinator, SaveStatus, SaveTicket, SectionRecord};
pub use site::{NewSite, Scoping, Site, StageDocument};
pub use workflow::{
    SiteStatus, StageKind, TransitionIntent, TransitionKind, next_valid_statuses,
    validate_transition, workflow_stage_color, workflow_stage_label,
};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use registry::{Registry, StorageBackend};
pub use store::{MemoryStore, RecordStore, RedbStore};
