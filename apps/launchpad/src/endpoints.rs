//! # REST Endpoint Table
//!
//! Path templates of the hosted backend the dashboard talks to. Some are
//! parameterized by a path segment, others by query string. `GET /endpoints`
//! publishes this table so clients share a single source of truth.

use crate::config::ApiConfig;
use launchpad_core::LaunchpadError;
use serde::Serialize;

/// HTTP verb of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

/// One concrete call: a verb, a path and its query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub verb: Verb,
    pub path: String,
    pub query: Vec<(&'static str, String)>,
}

impl Endpoint {
    fn new(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            verb,
            path: path.into(),
            query: Vec::new(),
        }
    }

    fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    /// Absolute URL under the configured API root, query string encoded.
    pub fn url(&self, api: &ApiConfig) -> Result<reqwest::Url, LaunchpadError> {
        let mut url = reqwest::Url::parse(&format!("{}{}", api.url(), self.path))
            .map_err(|e| LaunchpadError::Validation(format!("bad API URL: {}", e)))?;
        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

pub fn health() -> Endpoint {
    Endpoint::new(Verb::Get, "/health")
}

pub mod auth {
    use super::{Endpoint, Verb};

    pub fn login() -> Endpoint {
        Endpoint::new(Verb::Post, "/login")
    }

    pub fn logout() -> Endpoint {
        Endpoint::new(Verb::Post, "/logout")
    }

    pub fn send_otp() -> Endpoint {
        Endpoint::new(Verb::Post, "/send/otp")
    }

    /// Verifies the code and returns the user record.
    pub fn verify_otp() -> Endpoint {
        Endpoint::new(Verb::Post, "/verify/otp")
    }
}

pub mod users {
    use super::{Endpoint, Verb};

    pub fn list() -> Endpoint {
        Endpoint::new(Verb::Get, "/user/all")
    }

    pub fn get(id: &str) -> Endpoint {
        Endpoint::new(Verb::Get, format!("/user/{}", id))
    }

    pub fn me() -> Endpoint {
        Endpoint::new(Verb::Get, "/user/me")
    }

    pub fn create() -> Endpoint {
        Endpoint::new(Verb::Post, "/user")
    }

    pub fn update(id: &str) -> Endpoint {
        Endpoint::new(Verb::Put, format!("/user/{}", id))
    }

    pub fn delete(id: &str) -> Endpoint {
        Endpoint::new(Verb::Delete, format!("/user/{}", id))
    }
}

pub mod organizations {
    use super::{Endpoint, Verb};

    /// `None` lists every organization.
    pub fn list(organization_id: Option<&str>) -> Endpoint {
        Endpoint::new(Verb::Get, "/organization")
            .with("organization_id", organization_id.unwrap_or("all"))
    }

    pub fn create() -> Endpoint {
        Endpoint::new(Verb::Post, "/organization")
    }

    /// The id travels in the body.
    pub fn update() -> Endpoint {
        Endpoint::new(Verb::Put, "/organization")
    }

    pub fn delete(id: &str) -> Endpoint {
        Endpoint::new(Verb::Delete, "/organization").with("organization_id", id)
    }
}

pub mod sites {
    use super::{Endpoint, Verb};

    pub fn list() -> Endpoint {
        Endpoint::new(Verb::Get, "/site/all")
    }

    pub fn create() -> Endpoint {
        Endpoint::new(Verb::Post, "/site")
    }

    /// The id travels in the body.
    pub fn update() -> Endpoint {
        Endpoint::new(Verb::Put, "/site")
    }

    pub fn delete(id: &str) -> Endpoint {
        Endpoint::new(Verb::Delete, "/site").with("site_id", id)
    }
}

pub mod pages {
    use super::{Endpoint, Verb};

    pub fn get(page_name: &str, site_id: &str) -> Endpoint {
        Endpoint::new(Verb::Get, "/page")
            .with("page_name", page_name)
            .with("site_id", site_id)
    }

    pub fn create() -> Endpoint {
        Endpoint::new(Verb::Post, "/page")
    }

    pub fn update() -> Endpoint {
        Endpoint::new(Verb::Put, "/page")
    }
}

pub mod sections {
    use super::{Endpoint, Verb};

    pub fn get(page_id: &str, section_name: Option<&str>) -> Endpoint {
        let endpoint = Endpoint::new(Verb::Get, "/section").with("page_id", page_id);
        match section_name {
            Some(name) => endpoint.with("section_name", name),
            None => endpoint,
        }
    }

    pub fn create() -> Endpoint {
        Endpoint::new(Verb::Post, "/section")
    }
}

pub mod upload {
    use super::{Endpoint, Verb};

    pub fn generate_url() -> Endpoint {
        Endpoint::new(Verb::Post, "/generate-upload-url")
    }
}

// =============================================================================
// TABLE
// =============================================================================

/// One row of the published table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointEntry {
    pub group: &'static str,
    pub name: &'static str,
    pub verb: Verb,
    /// Path template; `{x}` marks a path or query parameter.
    pub template: &'static str,
}

const fn entry(
    group: &'static str,
    name: &'static str,
    verb: Verb,
    template: &'static str,
) -> EndpointEntry {
    EndpointEntry {
        group,
        name,
        verb,
        template,
    }
}

/// Every backend endpoint, grouped.
pub const TABLE: &[EndpointEntry] = &[
    entry("health", "health", Verb::Get, "/health"),
    entry("auth", "login", Verb::Post, "/login"),
    entry("auth", "logout", Verb::Post, "/logout"),
    entry("auth", "send_otp", Verb::Post, "/send/otp"),
    entry("auth", "verify_otp", Verb::Post, "/verify/otp"),
    entry("users", "list", Verb::Get, "/user/all"),
    entry("users", "get", Verb::Get, "/user/{id}"),
    entry("users", "me", Verb::Get, "/user/me"),
    entry("users", "create", Verb::Post, "/user"),
    entry("users", "update", Verb::Put, "/user/{id}"),
    entry("users", "delete", Verb::Delete, "/user/{id}"),
    entry("organizations", "list", Verb::Get, "/organization?organization_id={id|all}"),
    entry("organizations", "create", Verb::Post, "/organization"),
    entry("organizations", "update", Verb::Put, "/organization"),
    entry("organizations", "delete", Verb::Delete, "/organization?organization_id={id}"),
    entry("sites", "list", Verb::Get, "/site/all"),
    entry("sites", "create", Verb::Post, "/site"),
    entry("sites", "update", Verb::Put, "/site"),
    entry("sites", "delete", Verb::Delete, "/site?site_id={id}"),
    entry("pages", "get", Verb::Get, "/page?page_name={name}&site_id={site_id}"),
    entry("pages", "create", Verb::Post, "/page"),
    entry("pages", "update", Verb::Put, "/page"),
    entry("sections", "get", Verb::Get, "/section?page_id={page_id}&section_name={name?}"),
    entry("sections", "create", Verb::Post, "/section"),
    entry("upload", "generate_url", Verb::Post, "/generate-upload-url"),
];

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn organization_list_defaults_to_all() {
        assert_eq!(
            organizations::list(None).query,
            vec![("organization_id", "all".to_string())]
        );
    }

    #[test]
    fn query_values_are_encoded() {
        let api = ApiConfig::default();
        let url = sections::get("7", Some("hardware & software")).url(&api).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.sqlaunchpad.com/api/section?page_id=7&section_name=hardware+%26+software"
        );
    }

    #[test]
    fn path_parameters_land_in_the_path() {
        let url = users::get("42").url(&ApiConfig::default()).unwrap();
        assert_eq!(url.path(), "/api/user/42");
        assert_eq!(users::delete("42").verb, Verb::Delete);
    }

    #[test]
    fn table_names_are_unique_per_group() {
        let mut seen = std::collections::BTreeSet::new();
        for row in TABLE {
            assert!(seen.insert((row.group, row.name)), "{}.{}", row.group, row.name);
        }
        assert!(TABLE.iter().any(|row| row.template == auth::verify_otp().path));
    }
}
