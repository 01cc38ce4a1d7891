//! # Primitives
//!
//! Compiled-in constants shared by the core and the application.

/// Where denied navigation lands.
pub const DASHBOARD_PATH: &str = "/dashboard";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for site and organization names.
pub const MAX_NAME_LENGTH: usize = 200;

/// Maximum length for review comments, rejection reasons and override reasons.
pub const MAX_COMMENT_LENGTH: usize = 2000;

/// Maximum number of line items in a scoping selection.
pub const MAX_SELECTION_ITEMS: usize = 500;

// =============================================================================
// AUTO-SAVE
// =============================================================================

/// Quiet period after the last edit before a section is saved.
pub const AUTOSAVE_DEBOUNCE_MS: u64 = 500;

/// Save attempts per edit before the section is marked as failed.
pub const AUTOSAVE_MAX_ATTEMPTS: u32 = 3;

/// Fixed delay between failed save attempts.
pub const AUTOSAVE_RETRY_DELAY_MS: u64 = 1_000;

// =============================================================================
// ALERTS
// =============================================================================

/// How long an approval may wait for review before it is overdue (48h).
pub const APPROVAL_OVERDUE_MS: u64 = 48 * 60 * 60 * 1_000;

/// Window ahead of a warranty, license or service date in which to warn (30d).
pub const EXPIRY_HORIZON_MS: u64 = 30 * 24 * 60 * 60 * 1_000;

/// Lifetime of a derived alert (7d).
pub const ALERT_TTL_MS: u64 = 7 * 24 * 60 * 60 * 1_000;

// =============================================================================
// GEOCODING
// =============================================================================

/// Result count when the geocoding request gives none.
pub const DEFAULT_GEOCODE_LIMIT: u32 = 5;
