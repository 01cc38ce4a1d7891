//! # Core Type Definitions
//!
//! Identifiers, timestamps and small value enums shared by every module:
//! - Record identifiers (`SiteId`, `ApprovalId`, `AlertId`, `UserId`)
//! - The acting principal (`Actor`)
//! - Caller-supplied clock values (`Timestamp`)
//! - Site rating scales (`Priority`, `RiskLevel`)
//! - Error types (`LaunchpadError`)
//!
//! ## Determinism Guarantees
//!
//! Nothing in this crate reads the wall clock. Every operation that needs
//! "now" takes a [`Timestamp`] argument, so the same inputs always produce the
//! same records.

use crate::roles::Role;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SiteId(pub u64);

/// Unique identifier of a scoping approval (one per submitted version).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApprovalId(pub u64);

/// Unique identifier of an approval action log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionId(pub u64);

/// Unique identifier of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlertId(pub u64);

/// Identifier of a user as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Create a new user id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! display_numeric_id {
    ($($ty:ty),*) => {
        $(impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

display_numeric_id!(SiteId, ApprovalId, ActionId, AlertId);

/// The user performing an operation, under the role they currently act as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub name: String,
    pub role: Role,
}

impl Actor {
    /// Create an actor.
    #[must_use]
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: UserId::new(user_id),
            name: name.into(),
            role,
        }
    }
}

// =============================================================================
// TIMESTAMP
// =============================================================================

/// Milliseconds since the Unix epoch, supplied by the caller.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create a timestamp from epoch milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Raw epoch milliseconds.
    #[must_use]
    pub const fn millis(self) -> u64 {
        self.0
    }

    /// Add a duration in milliseconds, saturating at `u64::MAX`.
    #[must_use]
    pub const fn plus_millis(self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Milliseconds elapsed since `earlier` (zero if `earlier` is in the future).
    #[must_use]
    pub const fn since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

// =============================================================================
// RATING SCALES
// =============================================================================

/// Site priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Site risk level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

macro_rules! rating_from_str {
    ($ty:ident, $what:literal) => {
        impl FromStr for $ty {
            type Err = LaunchpadError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    "low" => Ok($ty::Low),
                    "medium" => Ok($ty::Medium),
                    "high" => Ok($ty::High),
                    other => Err(LaunchpadError::Validation(format!(
                        "unknown {} '{}'",
                        $what, other
                    ))),
                }
            }
        }
    };
}

rating_from_str!(Priority, "priority");
rating_from_str!(RiskLevel, "risk level");

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in Launchpad.
///
/// - Authorization denials and validation failures are ordinary values
/// - Nothing in the core panics; every failure is recoverable by the caller
#[derive(Debug, Error)]
pub enum LaunchpadError {
    /// The acting role may not perform the requested action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Input was rejected before any write happened.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The requested site does not exist.
    #[error("Site not found: {0}")]
    SiteNotFound(SiteId),

    /// The requested approval does not exist.
    #[error("Approval not found: {0}")]
    ApprovalNotFound(ApprovalId),

    /// The requested status change is not allowed from the current status.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// A stage was entered before its predecessor reported completion.
    #[error("Stage locked: {0}")]
    StageLocked(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl LaunchpadError {
    /// Whether the error belongs to the authorization-denial category.
    #[must_use]
    pub fn is_denial(&self) -> bool {
        matches!(self, LaunchpadError::Forbidden(_))
    }

    /// Whether the error was raised before anything was written.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LaunchpadError::Validation(_)
                | LaunchpadError::InvalidTransition { .. }
                | LaunchpadError::StageLocked(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
