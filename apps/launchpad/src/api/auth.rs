//! # Authentication Module
//!
//! Bearer token authentication against the configured user directory.
//!
//! ## Usage
//!
//! ```text
//! Authorization: Bearer <token>
//! X-Launchpad-Role: ops_manager        (optional)
//! ```
//!
//! A user holding several roles picks one per request with
//! `X-Launchpad-Role`; without the header the first configured role is used.
//! A user with no roles still authenticates, but every role-gated operation
//! answers "No role assigned".

use super::AppState;
use super::error::ApiError;
use crate::config::UserEntry;
use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use launchpad_core::{Actor, LaunchpadError, Role, UserId};
use subtle::ConstantTimeEq;

/// Header selecting the acting role.
pub const ROLE_HEADER: &str = "x-launchpad-role";

// =============================================================================
// USER DIRECTORY
// =============================================================================

/// Constant-time token comparison.
///
/// Both tokens are padded to the same length so `ct_eq` always runs over the
/// same number of bytes and the comparison time does not leak the length.
pub fn tokens_match(provided: &str, expected: &str) -> bool {
    let provided_bytes = provided.as_bytes();
    let expected_bytes = expected.as_bytes();

    let max_len = provided_bytes.len().max(expected_bytes.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided_bytes.len()].copy_from_slice(provided_bytes);
    padded_expected[..expected_bytes.len()].copy_from_slice(expected_bytes);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided_bytes.len() == expected_bytes.len()
}

/// Users allowed to call the API.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: Vec<UserEntry>,
}

impl UserDirectory {
    #[must_use]
    pub fn new(users: Vec<UserEntry>) -> Self {
        Self { users }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// The user owning `token`. Every entry is compared so the scan time
    /// does not depend on where the match is.
    #[must_use]
    pub fn authenticate(&self, token: &str) -> Option<&UserEntry> {
        let mut found = None;
        for user in &self.users {
            if tokens_match(token, &user.token) && found.is_none() {
                found = Some(user);
            }
        }
        found
    }
}

// =============================================================================
// PRINCIPAL
// =============================================================================

/// The authenticated caller and the role it acts under.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: UserId,
    pub name: String,
    pub role: Option<Role>,
    pub roles: Vec<Role>,
}

impl Principal {
    /// The caller as a core actor. Fails when no role is assigned.
    pub fn actor(&self) -> Result<Actor, LaunchpadError> {
        let role = self
            .role
            .ok_or_else(|| LaunchpadError::Forbidden("No role assigned".to_string()))?;
        Ok(Actor::new(self.user_id.as_str(), self.name.clone(), role))
    }

    /// Pick the acting role from the optional header value.
    fn select_role(user: &UserEntry, requested: Option<&str>) -> Result<Option<Role>, ApiError> {
        match requested {
            None => Ok(user.roles.first().copied()),
            Some(raw) => {
                let role: Role = raw.parse().map_err(|_| {
                    ApiError::BadRequest(format!("unknown role '{}'", raw.trim()))
                })?;
                if user.roles.contains(&role) {
                    Ok(Some(role))
                } else {
                    Err(ApiError::Core(LaunchpadError::Forbidden(format!(
                        "role {} is not assigned to {}",
                        role, user.id
                    ))))
                }
            }
        }
    }
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(header_value) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            return Err(ApiError::Unauthorized("Unauthorized"));
        };

        let token = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
        let Some(user) = state.users.authenticate(token.trim()) else {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_token",
                "Authentication failed: invalid token"
            );
            return Err(ApiError::Unauthorized("Unauthorized"));
        };

        let requested = parts.headers.get(ROLE_HEADER).and_then(|v| v.to_str().ok());
        let role = Principal::select_role(user, requested)?;
        let principal = Principal {
            user_id: UserId::new(user.id.clone()),
            name: user.name.clone(),
            role,
            roles: user.roles.clone(),
        };

        state
            .sessions
            .touch(&principal.user_id, crate::now())
            .await;
        Ok(principal)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn user(id: &str, token: &str, roles: Vec<Role>) -> UserEntry {
        UserEntry {
            id: id.to_string(),
            name: id.to_uppercase(),
            email: None,
            roles,
            token: token.to_string(),
        }
    }

    #[test]
    fn tokens_match_exactly() {
        assert!(tokens_match("secret-token", "secret-token"));
        assert!(!tokens_match("secret-token", "secret-tokeN"));
        assert!(!tokens_match("secret", "secret-token"));
        assert!(!tokens_match("", "secret-token"));
    }

    #[test]
    fn directory_finds_owner_of_token() {
        let directory = UserDirectory::new(vec![
            user("a", "token-aaaaaaaa", vec![Role::Admin]),
            user("b", "token-bbbbbbbb", vec![Role::User]),
        ]);
        assert_eq!(directory.authenticate("token-bbbbbbbb").unwrap().id, "b");
        assert!(directory.authenticate("token-cccccccc").is_none());
    }

    #[test]
    fn role_header_must_name_an_assigned_role() {
        let entry = user("a", "token-aaaaaaaa", vec![Role::OpsManager, Role::Admin]);
        assert_eq!(
            Principal::select_role(&entry, None).unwrap(),
            Some(Role::OpsManager)
        );
        assert_eq!(
            Principal::select_role(&entry, Some("admin")).unwrap(),
            Some(Role::Admin)
        );
        assert!(matches!(
            Principal::select_role(&entry, Some("deployment_engineer")),
            Err(ApiError::Core(LaunchpadError::Forbidden(_)))
        ));
        assert!(matches!(
            Principal::select_role(&entry, Some("wizard")),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn no_role_means_no_actor() {
        let principal = Principal {
            user_id: UserId::new("u"),
            name: "U".to_string(),
            role: None,
            roles: vec![],
        };
        assert!(principal.actor().unwrap_err().is_denial());
    }
}
