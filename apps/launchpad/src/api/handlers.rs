//! # API Endpoint Handlers
//!
//! Each handler resolves the caller, takes the registry lock it needs and
//! delegates the decision to the core.

use super::{
    AppState,
    auth::Principal,
    error::{ApiError, ApiResult},
    types::{
        AccessQuery, AccessResponse, AlertsResponse, CreateSiteRequest, HealthResponse,
        RefreshResponse, ReviewDecision, ReviewRequest, RoleInfo, SessionResponse, SiteView,
        StageInfo, SubmitApprovalRequest, TransitionRequest,
    },
};
use crate::autosave::SectionView;
use crate::endpoints::{EndpointEntry, TABLE};
use crate::geocoding::GeocodeRequest;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use launchpad_core::{
    AlertId, ApprovalAction, ApprovalId, Permission, Role, RouteGuard, ScopingApproval, SiteId,
    SiteStatus, StageDocument, StageKind, has_permission, tab_access,
};
use serde_json::{Value, json};

fn parse_stage(raw: &str) -> ApiResult<StageKind> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("unknown stage '{}'", raw)))
}

// =============================================================================
// PUBLIC HANDLERS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let persistent = state.registry.read().await.is_persistent();
    Json(HealthResponse::new(persistent))
}

/// Every role with its display metadata and pages.
pub async fn roles_handler() -> Json<Vec<RoleInfo>> {
    Json(Role::ALL.into_iter().map(RoleInfo::for_role).collect())
}

/// Every workflow status in display order.
pub async fn stages_handler() -> Json<Vec<StageInfo>> {
    Json(SiteStatus::ALL.into_iter().map(StageInfo::for_status).collect())
}

/// The backend REST endpoint table.
pub async fn endpoints_handler(State(state): State<AppState>) -> Json<Value> {
    let table: &[EndpointEntry] = TABLE;
    Json(json!({ "base_url": state.api.url(), "endpoints": table }))
}

/// Geocoding proxy. Answers `{data}` or `{error}`.
pub async fn geocoding_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let result = match GeocodeRequest::from_slice(&body) {
        Ok(request) => state.geocoder.handle(&request).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(data) => (StatusCode::OK, Json(json!({ "data": data }))),
        Err(e) => {
            let status = if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(json!({ "error": e.to_string() })))
        }
    }
}

// =============================================================================
// ACCESS AND SESSION
// =============================================================================

/// Access decision and guard outcome for one path.
pub async fn access_handler(
    principal: Principal,
    Query(query): Query<AccessQuery>,
) -> Json<AccessResponse> {
    let tab = tab_access(principal.role, &query.path);
    let mut guard = RouteGuard::new(query.path.clone());
    let outcome = guard.resolve(principal.role, false);
    Json(AccessResponse::new(query.path, principal.role, tab, outcome))
}

pub async fn session_handler(
    State(state): State<AppState>,
    principal: Principal,
) -> Json<SessionResponse> {
    let session = state
        .sessions
        .session_info(&principal.user_id, crate::now())
        .await;
    Json(SessionResponse {
        user_id: principal.user_id.to_string(),
        name: principal.name,
        role: principal.role,
        roles: principal.roles,
        session,
    })
}

pub async fn refresh_session_handler(
    State(state): State<AppState>,
    principal: Principal,
) -> Json<RefreshResponse> {
    let now = crate::now();
    let refreshed = state.sessions.force_refresh(&principal.user_id, now).await;
    let session = state.sessions.session_info(&principal.user_id, now).await;
    Json(RefreshResponse { refreshed, session })
}

// =============================================================================
// SITES
// =============================================================================

pub async fn list_sites_handler(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<Json<Vec<SiteView>>> {
    let actor = principal.actor()?;
    let sites = state.registry.read().await.sites(&actor)?;
    Ok(Json(
        sites
            .into_iter()
            .map(|site| SiteView::new(site, actor.role))
            .collect(),
    ))
}

pub async fn create_site_handler(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CreateSiteRequest>,
) -> ApiResult<(StatusCode, Json<SiteView>)> {
    let actor = principal.actor()?;
    let site = state
        .registry
        .write()
        .await
        .create_site(&actor, request, crate::now())?;
    tracing::info!(site = %site.id, by = %actor.user_id, "Site created");
    Ok((StatusCode::CREATED, Json(SiteView::new(site, actor.role))))
}

pub async fn get_site_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> ApiResult<Json<SiteView>> {
    let actor = principal.actor()?;
    let site = state.registry.read().await.site(&actor, SiteId(id))?;
    Ok(Json(SiteView::new(site, actor.role)))
}

pub async fn transition_site_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<Json<SiteView>> {
    let actor = principal.actor()?;
    let site = state.registry.write().await.transition_site(
        &actor,
        SiteId(id),
        request.to,
        request.intent,
        request.reason,
        crate::now(),
    )?;
    tracing::info!(site = %site.id, status = %site.status, by = %actor.user_id, "Site status changed");
    Ok(Json(SiteView::new(site, actor.role)))
}

/// Write one stage sub-document immediately.
pub async fn write_stage_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, stage)): Path<(u64, String)>,
    Json(body): Json<Value>,
) -> ApiResult<Json<SiteView>> {
    let actor = principal.actor()?;
    let kind = parse_stage(&stage)?;
    let doc = StageDocument::from_json(kind, body)?;
    let site = state
        .registry
        .write()
        .await
        .write_stage(&actor, SiteId(id), doc, crate::now())?;
    Ok(Json(SiteView::new(site, actor.role)))
}

// =============================================================================
// AUTO-SAVED SECTIONS
// =============================================================================

/// Record an edit of a stage form; the save happens after the debounce.
pub async fn update_section_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, section)): Path<(u64, String)>,
    Json(body): Json<Value>,
) -> ApiResult<(StatusCode, Json<SectionView>)> {
    let actor = principal.actor()?;
    let kind = parse_stage(&section)?;
    let view = state
        .drafts
        .update(&actor, SiteId(id), kind, body, crate::now())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(view)))
}

pub async fn list_sections_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> ApiResult<Json<Vec<SectionView>>> {
    let actor = principal.actor()?;
    state.registry.read().await.site(&actor, SiteId(id))?;
    Ok(Json(state.drafts.sections(&actor.user_id, SiteId(id)).await))
}

/// Save every unsaved section of a site now.
pub async fn flush_sections_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> ApiResult<Json<Vec<SectionView>>> {
    let actor = principal.actor()?;
    state.registry.read().await.site(&actor, SiteId(id))?;
    let views = state
        .drafts
        .force_flush(&actor.user_id, SiteId(id), crate::now())
        .await;
    Ok(Json(views))
}

pub async fn discard_section_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, section)): Path<(u64, String)>,
) -> ApiResult<StatusCode> {
    let actor = principal.actor()?;
    let kind = parse_stage(&section)?;
    if state.drafts.discard(&actor.user_id, SiteId(id), kind).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("no draft of {} for site {}", kind, id)))
    }
}

// =============================================================================
// APPROVALS
// =============================================================================

pub async fn submit_approval_handler(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<SubmitApprovalRequest>,
) -> ApiResult<(StatusCode, Json<ScopingApproval>)> {
    let actor = principal.actor()?;
    let approval = state.registry.write().await.submit_approval(
        &actor,
        SiteId(request.site_id),
        crate::now(),
    )?;
    tracing::info!(approval = %approval.id, site = %approval.site_id, "Scoping submitted for approval");
    Ok((StatusCode::CREATED, Json(approval)))
}

pub async fn list_approvals_handler(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<Json<Vec<ScopingApproval>>> {
    let actor = principal.actor()?;
    Ok(Json(state.registry.read().await.approvals(&actor)?))
}

pub async fn get_approval_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> ApiResult<Json<ScopingApproval>> {
    let actor = principal.actor()?;
    Ok(Json(
        state.registry.read().await.approval(&actor, ApprovalId(id))?,
    ))
}

/// approve, reject, request-changes or resubmit.
pub async fn review_approval_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, decision)): Path<(u64, String)>,
    body: Bytes,
) -> ApiResult<Json<ScopingApproval>> {
    let actor = principal.actor()?;
    let decision: ReviewDecision = decision
        .parse()
        .map_err(|_| ApiError::NotFound(format!("no such decision '{}'", decision)))?;
    // The body is optional.
    let request: ReviewRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ReviewRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid review body: {}", e)))?
    };
    let id = ApprovalId(id);
    let now = crate::now();

    let mut registry = state.registry.write().await;
    let approval = match decision {
        ReviewDecision::Approve => registry.approve(&actor, id, request.text(false), now)?,
        ReviewDecision::Reject => registry.reject(&actor, id, request.text(true), now)?,
        ReviewDecision::RequestChanges => {
            registry.request_changes(&actor, id, request.text(false), now)?
        }
        ReviewDecision::Resubmit => registry.resubmit(&actor, id, request.scoping, now)?,
    };
    tracing::info!(
        approval = %approval.id,
        status = approval.status.as_str(),
        by = %actor.user_id,
        "Approval updated"
    );
    Ok(Json(approval))
}

pub async fn approval_history_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> ApiResult<Json<Vec<ApprovalAction>>> {
    let actor = principal.actor()?;
    Ok(Json(
        state
            .registry
            .read()
            .await
            .approval_history(&actor, ApprovalId(id))?,
    ))
}

// =============================================================================
// ALERTS
// =============================================================================

/// Re-derive alerts from the records, then list the live ones.
pub async fn alerts_handler(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<Json<AlertsResponse>> {
    let actor = principal.actor()?;
    if !has_permission(actor.role, Permission::ViewDashboard) {
        return Err(ApiError::Core(launchpad_core::LaunchpadError::Forbidden(
            "dashboard access required".to_string(),
        )));
    }
    let now = crate::now();
    let (viewer, drafts) = {
        let registry = state.registry.read().await;
        (
            registry.alert_viewer(&actor)?,
            registry.alert_drafts(&actor, now, &state.alert_policy)?,
        )
    };

    let mut board = state.alerts.write().await;
    board.purge_expired(now);
    let filed = board.sync(drafts, now);
    if !filed.is_empty() {
        tracing::info!(count = filed.len(), "New alerts filed");
    }
    Ok(Json(AlertsResponse {
        alerts: board.active(&viewer, now),
        unread: board.unread_count(&viewer, now),
    }))
}

/// dismiss or read, for the calling user only.
pub async fn alert_action_handler(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, action)): Path<(u64, String)>,
) -> ApiResult<StatusCode> {
    let actor = principal.actor()?;
    let viewer = state.registry.read().await.alert_viewer(&actor)?;
    let mut board = state.alerts.write().await;
    let found = match action.as_str() {
        "dismiss" => board.dismiss(&viewer, AlertId(id)),
        "read" => board.mark_read(&viewer, AlertId(id)),
        other => return Err(ApiError::NotFound(format!("no such alert action '{}'", other))),
    };
    if found {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("alert {} not found", id)))
    }
}
