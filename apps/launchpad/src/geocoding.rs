//! # Geocoding Proxy
//!
//! Forwards address search and reverse geocoding to a LocationIQ-compatible
//! upstream so the provider key never reaches the browser.
//!
//! ## Request
//!
//! ```json
//! {"action": "search", "query": "1 High Street, Leeds", "limit": 5}
//! {"action": "reverse", "lat": 53.79, "lng": -1.54}
//! ```
//!
//! Success is `{"data": <upstream JSON>}`. Failure is `{"error": "..."}` with
//! 400 for a bad request and 500 when the key is missing or the upstream
//! fails. The request is validated before the key is consulted, so a
//! malformed request is a 400 even on an unconfigured server.

use crate::config::GeocodingConfig;
use launchpad_core::{LaunchpadError, site::SiteLocation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Largest result count forwarded upstream.
pub const MAX_GEOCODE_LIMIT: u32 = 50;

// =============================================================================
// ERRORS
// =============================================================================

/// Why a geocoding request failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeocodeError {
    /// The body was not a JSON object of the expected shape.
    InvalidBody(String),
    /// `search` without a query.
    MissingQuery,
    /// `reverse` without both coordinates.
    MissingCoordinates,
    /// Coordinates outside the valid ranges.
    InvalidCoordinates(String),
    /// Neither `search` nor `reverse`.
    InvalidAction,
    /// No provider key configured.
    NotConfigured,
    /// Transport error or non-2xx upstream answer.
    Upstream(String),
}

impl std::fmt::Display for GeocodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBody(msg) => write!(f, "Invalid request body: {msg}"),
            Self::MissingQuery => write!(f, "Query parameter required for search"),
            Self::MissingCoordinates => {
                write!(f, "Latitude and longitude required for reverse geocoding")
            }
            Self::InvalidCoordinates(msg) => write!(f, "{msg}"),
            Self::InvalidAction => write!(f, "Invalid action. Use \"search\" or \"reverse\""),
            Self::NotConfigured => write!(f, "Geocoding service not configured"),
            Self::Upstream(_) => write!(f, "Geocoding request failed"),
        }
    }
}

impl std::error::Error for GeocodeError {}

impl GeocodeError {
    /// Whether the caller sent a bad request (as opposed to a server fault).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::NotConfigured | Self::Upstream(_))
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// Raw proxy request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeocodeRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// A validated upstream call.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeQuery {
    Search { query: String, limit: u32 },
    Reverse { lat: f64, lng: f64 },
}

impl GeocodeRequest {
    /// Parse a raw body.
    pub fn from_slice(body: &[u8]) -> Result<Self, GeocodeError> {
        serde_json::from_slice(body).map_err(|e| GeocodeError::InvalidBody(e.to_string()))
    }

    /// Check the request and resolve defaults.
    pub fn validate(&self, default_limit: u32) -> Result<GeocodeQuery, GeocodeError> {
        match self.action.as_deref() {
            Some("search") => {
                let query = self
                    .query
                    .as_deref()
                    .map(str::trim)
                    .filter(|q| !q.is_empty())
                    .ok_or(GeocodeError::MissingQuery)?;
                let limit = match self.limit {
                    Some(0) | None => default_limit,
                    Some(n) => n.min(MAX_GEOCODE_LIMIT),
                };
                Ok(GeocodeQuery::Search {
                    query: query.to_string(),
                    limit,
                })
            }
            Some("reverse") => {
                let (Some(lat), Some(lng)) = (self.lat, self.lng) else {
                    return Err(GeocodeError::MissingCoordinates);
                };
                let location = SiteLocation {
                    latitude: Some(lat),
                    longitude: Some(lng),
                    ..SiteLocation::default()
                };
                location
                    .validate()
                    .map_err(|e| GeocodeError::InvalidCoordinates(e.to_string()))?;
                Ok(GeocodeQuery::Reverse { lat, lng })
            }
            _ => Err(GeocodeError::InvalidAction),
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// HTTP client for the upstream provider.
#[derive(Clone)]
pub struct Geocoder {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    default_limit: u32,
}

impl std::fmt::Debug for Geocoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Geocoder")
            .field("base_url", &self.base_url)
            .field("configured", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl Geocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self, LaunchpadError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| LaunchpadError::IoError(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            default_limit: config.default_limit,
        })
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Validate and forward one request.
    pub async fn handle(&self, request: &GeocodeRequest) -> Result<Value, GeocodeError> {
        let query = request.validate(self.default_limit)?;
        let key = self.api_key.as_deref().ok_or_else(|| {
            tracing::error!("LocationIQ API key not configured");
            GeocodeError::NotConfigured
        })?;
        self.fetch(key, &query).await
    }

    async fn fetch(&self, key: &str, query: &GeocodeQuery) -> Result<Value, GeocodeError> {
        let builder = match query {
            GeocodeQuery::Search { query, limit } => {
                tracing::info!(action = "search", limit, "Geocoding request");
                self.http
                    .get(format!("{}/search", self.base_url))
                    .query(&[("key", key), ("q", query.as_str()), ("format", "json")])
                    .query(&[("limit", limit)])
            }
            GeocodeQuery::Reverse { lat, lng } => {
                tracing::info!(action = "reverse", "Geocoding request");
                self.http
                    .get(format!("{}/reverse", self.base_url))
                    .query(&[("key", key), ("format", "json")])
                    .query(&[("lat", lat), ("lon", lng)])
            }
        };

        let response = builder
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Geocoding upstream unreachable");
                GeocodeError::Upstream(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "LocationIQ API error");
            return Err(GeocodeError::Upstream(format!("status {}", status)));
        }

        response.json::<Value>().await.map_err(|e| {
            tracing::error!(error = %e, "Geocoding upstream sent invalid JSON");
            GeocodeError::Upstream(e.to_string())
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn request(json: &str) -> GeocodeRequest {
        GeocodeRequest::from_slice(json.as_bytes()).unwrap()
    }

    #[test]
    fn search_defaults_limit() {
        let query = request(r#"{"action":"search","query":"Leeds"}"#)
            .validate(5)
            .unwrap();
        assert_eq!(
            query,
            GeocodeQuery::Search {
                query: "Leeds".to_string(),
                limit: 5
            }
        );
    }

    #[test]
    fn search_limit_is_capped() {
        let query = request(r#"{"action":"search","query":"Leeds","limit":500}"#)
            .validate(5)
            .unwrap();
        assert!(matches!(query, GeocodeQuery::Search { limit: 50, .. }));
    }

    #[test]
    fn search_without_query_is_rejected() {
        let err = request(r#"{"action":"search","query":"  "}"#)
            .validate(5)
            .unwrap_err();
        assert_eq!(err, GeocodeError::MissingQuery);
        assert!(err.is_client_error());
    }

    #[test]
    fn reverse_needs_both_coordinates() {
        let err = request(r#"{"action":"reverse","lat":51.5}"#)
            .validate(5)
            .unwrap_err();
        assert_eq!(err, GeocodeError::MissingCoordinates);
    }

    #[test]
    fn reverse_rejects_out_of_range_coordinates() {
        let err = request(r#"{"action":"reverse","lat":91,"lng":0}"#)
            .validate(5)
            .unwrap_err();
        assert!(matches!(err, GeocodeError::InvalidCoordinates(_)));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = request(r#"{"action":"bogus"}"#).validate(5).unwrap_err();
        assert_eq!(err, GeocodeError::InvalidAction);
        assert_eq!(err.to_string(), "Invalid action. Use \"search\" or \"reverse\"");
    }

    #[test]
    fn server_faults_are_not_client_errors() {
        assert!(!GeocodeError::NotConfigured.is_client_error());
        assert!(!GeocodeError::Upstream("x".to_string()).is_client_error());
        assert_eq!(
            GeocodeError::Upstream("x".to_string()).to_string(),
            "Geocoding request failed"
        );
    }

    #[tokio::test]
    async fn missing_key_fails_after_validation() {
        let geocoder = Geocoder::new(&GeocodingConfig::default()).unwrap();
        let bad = request(r#"{"action":"search"}"#);
        assert_eq!(geocoder.handle(&bad).await, Err(GeocodeError::MissingQuery));
        let good = request(r#"{"action":"search","query":"Leeds"}"#);
        assert_eq!(geocoder.handle(&good).await, Err(GeocodeError::NotConfigured));
    }
}
