//! # Route Guard
//!
//! Navigation state machine in front of every protected page.
//!
//! ```text
//! Loading --(role resolved)--> CheckingAccess --> Granted
//!    |                                       \--> Redirected (to /dashboard, once)
//!    |                                       \--> Denied     (dashboard itself refused)
//!    \--(no role)--> NoRole
//! ```
//!
//! The guard remembers which path it already redirected away from. Resolving
//! the same path again reports `Denied` instead of issuing a second redirect.
//! The marker is cleared once some path is granted, so a later visit to the
//! denied page starts a fresh redirect.

use crate::access::tab_access;
use crate::primitives::DASHBOARD_PATH;
use crate::roles::Role;
use serde::{Deserialize, Serialize};

/// Where the guard currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    Loading,
    NoRole,
    CheckingAccess,
    Granted,
    Denied,
    Redirected,
}

/// What the caller should do after a resolution step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GuardOutcome {
    /// The role is still being resolved. Show a spinner.
    Pending,
    /// Show the message inline. Do not navigate.
    NoRole { message: String },
    /// Render the protected page.
    Render,
    /// Navigate to `to`, replacing the current history entry.
    Redirect { to: String, reason: String },
    /// Show the access denied view.
    Denied { message: String },
}

/// Per-navigation guard.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    path: String,
    state: GuardState,
    redirected_from: Option<String>,
}

impl RouteGuard {
    /// Start guarding `path`. The role is not known yet.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: GuardState::Loading,
            redirected_from: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> GuardState {
        self.state
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Start guarding a new path. The redirect marker survives until a path
    /// resolves to `Granted`.
    pub fn navigate(&mut self, path: impl Into<String>) {
        self.path = path.into();
        self.state = GuardState::Loading;
    }

    /// Feed the resolved role into the guard.
    ///
    /// `role_loading` keeps the guard in `Loading` while the identity
    /// provider has not answered yet.
    pub fn resolve(&mut self, role: Option<Role>, role_loading: bool) -> GuardOutcome {
        if role_loading {
            self.state = GuardState::Loading;
            return GuardOutcome::Pending;
        }

        let Some(role) = role else {
            self.state = GuardState::NoRole;
            return GuardOutcome::NoRole {
                message: "No role assigned".to_string(),
            };
        };

        self.state = GuardState::CheckingAccess;
        let access = tab_access(Some(role), &self.path);
        if access.can_access {
            self.redirected_from = None;
            self.state = GuardState::Granted;
            return GuardOutcome::Render;
        }

        let message = access
            .message
            .unwrap_or_else(|| "Access denied".to_string());
        let already_redirected = self.redirected_from.as_deref() == Some(self.path.as_str());
        let dashboard_allowed = tab_access(Some(role), DASHBOARD_PATH).can_access;

        if already_redirected || !dashboard_allowed {
            self.state = GuardState::Denied;
            return GuardOutcome::Denied { message };
        }

        self.redirected_from = Some(self.path.clone());
        self.state = GuardState::Redirected;
        GuardOutcome::Redirect {
            to: DASHBOARD_PATH.to_string(),
            reason: message,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
