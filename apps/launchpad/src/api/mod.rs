//! # Launchpad HTTP API Module
//!
//! The REST surface over the registry, built with axum.
//!
//! ## Endpoints
//!
//! Public:
//! - `GET /health` - Health check
//! - `GET /roles`, `GET /stages` - Role and workflow metadata
//! - `GET /endpoints` - Backend endpoint table
//! - `POST /geocoding` - Geocoding proxy (`{action, query | lat, lng}`)
//!
//! Authenticated (`Authorization: Bearer <token>`):
//! - `GET /access?path=` - Access decision for a page
//! - `GET /session`, `POST /session/refresh`
//! - `GET|POST /sites`, `GET /sites/{id}`, `POST /sites/{id}/status`
//! - `PUT /sites/{id}/stages/{stage}` - Immediate stage write
//! - `GET /sites/{id}/sections`, `PUT|DELETE /sites/{id}/sections/{section}`,
//!   `POST /sites/{id}/sections/flush` - Auto-saved forms
//! - `GET|POST /approvals`, `GET /approvals/{id}`,
//!   `POST /approvals/{id}/{decision}`, `GET /approvals/{id}/history`
//! - `GET /alerts`, `POST /alerts/{id}/dismiss`, `POST /alerts/{id}/read`
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `LAUNCHPAD_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `LAUNCHPAD_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod types;

pub use auth::{Principal, UserDirectory};
pub use error::{ApiError, ApiResult};
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};

use crate::autosave::DraftStore;
use crate::config::{ApiConfig, BackendKind, Config};
use crate::geocoding::Geocoder;
use crate::monitor::SessionMonitor;
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post, put},
};
use launchpad_core::{AlertBoard, AlertPolicy, LaunchpadError, Registry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RwLock<Registry>>,
    pub alerts: Arc<RwLock<AlertBoard>>,
    pub drafts: DraftStore,
    pub sessions: SessionMonitor,
    pub users: Arc<UserDirectory>,
    pub geocoder: Geocoder,
    pub api: ApiConfig,
    pub alert_policy: AlertPolicy,
}

impl AppState {
    /// Wire the services around `registry` as `config` describes them.
    pub fn new(registry: Registry, config: &Config) -> Result<Self, LaunchpadError> {
        let registry = Arc::new(RwLock::new(registry));
        Ok(Self {
            drafts: DraftStore::new(Arc::clone(&registry), config.autosave.policy()),
            registry,
            alerts: Arc::new(RwLock::new(AlertBoard::new())),
            sessions: SessionMonitor::new(Duration::from_secs(config.session.ttl_secs)),
            users: Arc::new(UserDirectory::new(config.users.clone())),
            geocoder: Geocoder::new(&config.geocoding)?,
            api: config.api.clone(),
            alert_policy: AlertPolicy::default(),
        })
    }
}

/// Open the registry on the configured backend.
pub fn open_registry(config: &Config) -> Result<Registry, LaunchpadError> {
    match config.storage.backend {
        BackendKind::Memory => Ok(Registry::new()),
        BackendKind::Redb => Registry::with_redb(&config.storage.path),
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer for the authenticated API.
///
/// Reads `LAUNCHPAD_CORS_ORIGINS`:
/// - "*": any origin
/// - unset or no valid entry: localhost only
/// - otherwise a comma-separated list of origins
fn build_cors_layer() -> CorsLayer {
    cors_for(std::env::var("LAUNCHPAD_CORS_ORIGINS").ok().as_deref())
}

fn cors_for(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins (LAUNCHPAD_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) if !trimmed.is_empty() => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Ok(_) => None,
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();
            if allowed.is_empty() {
                tracing::warn!("CORS: No valid origins in LAUNCHPAD_CORS_ORIGINS, using localhost");
                api_cors(localhost_origins())
            } else {
                api_cors(allowed)
            }
        }
        None => {
            tracing::info!("CORS: No LAUNCHPAD_CORS_ORIGINS set, defaulting to localhost only");
            api_cors(localhost_origins())
        }
    }
}

fn localhost_origins() -> Vec<HeaderValue> {
    [
        "http://localhost:3000",
        "http://localhost:5173",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect()
}

fn api_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(auth::ROLE_HEADER),
        ])
}

/// The geocoding proxy answers browsers on any origin.
fn geocoding_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing
/// 2. Body limit
/// 3. Rate limiting (if enabled)
/// 4. CORS (per route group)
/// 5. Authentication (the `Principal` extractor, per handler)
pub fn create_router(state: AppState) -> Router {
    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = create_rate_limiter(rate_limit);
    if rate_limiter.is_some() {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
    } else {
        tracing::info!("Rate limiting disabled");
    }
    if state.users.is_empty() {
        tracing::warn!("No users configured: every authenticated endpoint will answer 401");
    }

    let api = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/roles", get(handlers::roles_handler))
        .route("/stages", get(handlers::stages_handler))
        .route("/endpoints", get(handlers::endpoints_handler))
        .route("/access", get(handlers::access_handler))
        .route("/session", get(handlers::session_handler))
        .route("/session/refresh", post(handlers::refresh_session_handler))
        .route(
            "/sites",
            get(handlers::list_sites_handler).post(handlers::create_site_handler),
        )
        .route("/sites/{id}", get(handlers::get_site_handler))
        .route("/sites/{id}/status", post(handlers::transition_site_handler))
        .route("/sites/{id}/stages/{stage}", put(handlers::write_stage_handler))
        .route("/sites/{id}/sections", get(handlers::list_sections_handler))
        .route(
            "/sites/{id}/sections/flush",
            post(handlers::flush_sections_handler),
        )
        .route(
            "/sites/{id}/sections/{section}",
            put(handlers::update_section_handler).delete(handlers::discard_section_handler),
        )
        .route(
            "/approvals",
            get(handlers::list_approvals_handler).post(handlers::submit_approval_handler),
        )
        .route("/approvals/{id}", get(handlers::get_approval_handler))
        .route(
            "/approvals/{id}/history",
            get(handlers::approval_history_handler),
        )
        .route(
            "/approvals/{id}/{decision}",
            post(handlers::review_approval_handler),
        )
        .route("/alerts", get(handlers::alerts_handler))
        .route("/alerts/{id}/{action}", post(handlers::alert_action_handler))
        .layer(build_cors_layer());

    let geocoding = Router::new()
        .route("/geocoding", post(handlers::geocoding_handler))
        .layer(geocoding_cors());

    let mut router = api.merge(geocoding);
    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and its background services.
///
/// On shutdown the server stops accepting requests, the auto-save driver
/// flushes every unsaved section once and the session monitor stops.
pub async fn run_server(config: Config) -> Result<(), LaunchpadError> {
    let registry = open_registry(&config)?;
    let state = AppState::new(registry, &config)?;

    // Nothing is spawned until the port is ours.
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LaunchpadError::IoError(format!("Bind failed: {}", e)))?;

    let cancel = CancellationToken::new();
    state
        .sessions
        .start(Duration::from_secs(config.session.monitor_interval_secs.max(1)));
    let driver = state.drafts.spawn(
        Duration::from_millis(config.autosave.tick_ms.max(10)),
        cancel.clone(),
    );
    let sessions = state.sessions.clone();
    let router = create_router(state);

    tracing::info!(
        %addr,
        backend = ?config.storage.backend,
        users = config.users.len(),
        "Launchpad HTTP server listening"
    );

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| LaunchpadError::IoError(format!("Server error: {}", e)));

    tracing::info!("Server stopped accepting connections, cleaning up");
    cancel.cancel();
    match driver.await {
        Ok(report) if report.failed > 0 => {
            tracing::error!(failed = report.failed, "Unsaved sections lost at shutdown");
        }
        Ok(report) => tracing::info!(saved = report.saved, "Auto-save drained"),
        Err(e) => tracing::error!(error = %e, "Auto-save driver ended abnormally"),
    }
    sessions.stop().await;
    tracing::info!("Graceful shutdown complete");
    served
}

/// Wait for Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState::new(Registry::new(), &Config::default()).unwrap()
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let response = create_router(state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn geocoding_preflight_allows_any_origin() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/geocoding")
            .header(header::ORIGIN, "https://maps.example.org")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "apikey")
            .body(Body::empty())
            .unwrap();
        let response = create_router(state()).oneshot(request).await.unwrap();
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }

    #[test]
    fn blank_origin_list_falls_back_to_localhost() {
        // Builds without panicking for every input shape.
        let _ = cors_for(Some(" , "));
        let _ = cors_for(Some("https://ops.example.org, http://localhost:3000"));
        let _ = cors_for(None);
    }

    #[tokio::test]
    async fn occupied_port_fails_before_starting_workers() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = taken.local_addr().unwrap().port();

        let result = tokio::time::timeout(Duration::from_secs(5), run_server(config))
            .await
            .unwrap();
        match result {
            Err(LaunchpadError::IoError(message)) => assert!(message.starts_with("Bind failed")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn memory_backend_is_not_persistent() {
        let registry = open_registry(&Config::default()).unwrap();
        assert!(!registry.is_persistent());
    }
}
