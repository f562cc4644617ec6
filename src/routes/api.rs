// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes behind a launch session: score passback, scoreboard,
//! launch-data introspection.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::session::LaunchSession;
use crate::models::LaunchClaims;
use crate::services::ags::{LineItem, ResultRecord, Score};
use crate::services::nrps::Member;
use crate::services::token::scopes;
use crate::services::StoredLaunch;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

/// Every score lands on a 0..=100 scale, like the original gradebook
/// column.
const SCORE_MAXIMUM: f64 = 100.0;
const LINE_ITEM_TAG: &str = "score";
const LINE_ITEM_LABEL: &str = "Score";

/// API routes (require a launch session via JWT).
/// The session middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/score/{launch_id}", post(set_score))
        .route("/api/scoreboard/{launch_id}", get(scoreboard))
        .route("/api/launch/{launch_id}", get(launch_data))
}

/// Resolve the cached launch for a session-bound request.
fn require_launch(
    state: &AppState,
    session: &LaunchSession,
    launch_id: &str,
) -> Result<Arc<StoredLaunch>> {
    if session.launch_id != launch_id {
        return Err(AppError::Unauthorized);
    }

    state
        .launches
        .get(launch_id)
        .ok_or_else(|| AppError::NotFound(format!("Launch {}", launch_id)))
}

// ─── Score Passback ──────────────────────────────────────────

/// Score submission payload.
#[derive(Debug, Deserialize, Validate)]
pub struct ScoreRequest {
    #[validate(range(min = 0.0, max = 100.0))]
    pub score: f64,
    #[serde(default = "default_activity_progress")]
    pub activity_progress: String,
    #[serde(default = "default_grading_progress")]
    pub grading_progress: String,
}

fn default_activity_progress() -> String {
    "Completed".to_string()
}

fn default_grading_progress() -> String {
    "FullyGraded".to_string()
}

/// Score submission outcome. `success: false` carries the platform's
/// rejection instead of failing the request, so the page can show it.
#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub success: bool,
    pub result: serde_json::Value,
}

/// Report a score back to the platform's assignments and grades service.
async fn set_score(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<LaunchSession>,
    Path(launch_id): Path<String>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let launch = require_launch(&state, &session, &launch_id)?;

    let Some(endpoint) = launch.claims.ags_endpoint.clone() else {
        return Err(AppError::Forbidden(
            "This launch doesn't provide a grades service".to_string(),
        ));
    };

    let registration = state
        .store
        .get_registration(&launch.issuer, &launch.client_id)?
        .ok_or_else(|| AppError::NotFound(format!("Registration for {}", launch.issuer)))?;

    let granted_scopes: Vec<&str> = endpoint.scope.iter().map(String::as_str).collect();
    let access_token = state
        .tokens
        .access_token(&registration, &granted_scopes)
        .await?;

    let lineitem_url = resolve_lineitem_url(&state, &launch, &endpoint, &access_token).await?;

    let score = Score {
        user_id: launch.claims.sub.clone(),
        score_given: request.score,
        score_maximum: SCORE_MAXIMUM,
        activity_progress: request.activity_progress,
        grading_progress: request.grading_progress,
        timestamp: format_utc_rfc3339(chrono::Utc::now()),
    };

    tracing::info!(
        launch_id = %launch_id,
        score = request.score,
        "Publishing score"
    );

    // A platform-side rejection is reported, not propagated; the page
    // shows the outcome either way.
    match state
        .ags
        .put_score(&access_token, &lineitem_url, &score)
        .await
    {
        Ok(result) => Ok(Json(ScoreResponse {
            success: true,
            result,
        })),
        Err(AppError::PlatformApi(msg)) => Ok(Json(ScoreResponse {
            success: false,
            result: serde_json::Value::String(msg),
        })),
        Err(e) => Err(e),
    }
}

/// Pick the line item URL for this launch: manage our own column when the
/// scope allows it, otherwise use the one coupled to the resource link.
async fn resolve_lineitem_url(
    state: &AppState,
    launch: &StoredLaunch,
    endpoint: &crate::models::launch::AgsEndpointClaim,
    access_token: &str,
) -> Result<String> {
    if let (true, Some(lineitems_url)) =
        (endpoint.can_create_lineitem(), endpoint.lineitems.as_deref())
    {
        let template = LineItem {
            id: None,
            score_maximum: SCORE_MAXIMUM,
            label: LINE_ITEM_LABEL.to_string(),
            tag: Some(LINE_ITEM_TAG.to_string()),
            resource_id: launch.claims.resource_link_id().map(str::to_string),
        };

        let line_item = state
            .ags
            .find_or_create_line_item(access_token, lineitems_url, &template)
            .await?;

        return line_item.id.ok_or_else(|| {
            AppError::PlatformApi("platform returned a line item without an id".to_string())
        });
    }

    if let Some(lineitem) = endpoint.lineitem.as_deref() {
        return Ok(lineitem.to_string());
    }

    Err(AppError::Forbidden(
        "Launch provides no line item and no scope to create one".to_string(),
    ))
}

// ─── Scoreboard ──────────────────────────────────────────────

/// One scoreboard row: a context member with their stored result.
#[derive(Debug, Serialize)]
pub struct ScoreboardEntry {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub instructor: bool,
    pub student: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_maximum: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ScoreboardResponse {
    pub members: Vec<ScoreboardEntry>,
}

/// Show roles and scores for every member of this launch's context.
async fn scoreboard(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<LaunchSession>,
    Path(launch_id): Path<String>,
) -> Result<Json<ScoreboardResponse>> {
    let launch = require_launch(&state, &session, &launch_id)?;

    let Some(nrps) = launch.claims.names_role_service.clone() else {
        return Err(AppError::Forbidden(
            "This launch doesn't provide a membership service".to_string(),
        ));
    };
    let Some(endpoint) = launch.claims.ags_endpoint.clone() else {
        return Err(AppError::Forbidden(
            "This launch doesn't provide a grades service".to_string(),
        ));
    };

    let registration = state
        .store
        .get_registration(&launch.issuer, &launch.client_id)?
        .ok_or_else(|| AppError::NotFound(format!("Registration for {}", launch.issuer)))?;

    let nrps_token = state
        .tokens
        .access_token(&registration, &[scopes::NRPS_MEMBERSHIP_READONLY])
        .await?;
    let members = state
        .nrps
        .get_members(&nrps_token, &nrps.context_memberships_url)
        .await?;

    let granted_scopes: Vec<&str> = endpoint.scope.iter().map(String::as_str).collect();
    let ags_token = state
        .tokens
        .access_token(&registration, &granted_scopes)
        .await?;

    let results = match resolve_lineitem_url(&state, &launch, &endpoint, &ags_token).await {
        Ok(lineitem_url) => state.ags.get_results(&ags_token, &lineitem_url).await?,
        // No line item yet means no scores yet, not a broken scoreboard.
        Err(AppError::Forbidden(_)) => Vec::new(),
        Err(e) => return Err(e),
    };

    tracing::debug!(
        launch_id = %launch_id,
        members = members.len(),
        results = results.len(),
        "Scoreboard assembled"
    );

    Ok(Json(ScoreboardResponse {
        members: join_members_results(members, results),
    }))
}

/// Join stored results onto context members by user id.
fn join_members_results(members: Vec<Member>, results: Vec<ResultRecord>) -> Vec<ScoreboardEntry> {
    let mut result_by_user: HashMap<String, ResultRecord> = results
        .into_iter()
        .map(|r| (r.user_id.clone(), r))
        .collect();

    members
        .into_iter()
        .map(|m| {
            let result = result_by_user.remove(&m.user_id);
            ScoreboardEntry {
                instructor: m.is_instructor(),
                student: m.is_student(),
                score: result.as_ref().and_then(|r| r.result_score),
                score_maximum: result.as_ref().and_then(|r| r.result_maximum),
                user_id: m.user_id,
                name: m.name,
                email: m.email,
            }
        })
        .collect()
}

// ─── Launch Data ─────────────────────────────────────────────

/// Full launch data, for poking at real claims while learning the
/// protocol. A production tool wouldn't expose this.
#[derive(Debug, Serialize)]
pub struct LaunchDataResponse {
    pub launch_id: String,
    pub custom: HashMap<String, serde_json::Value>,
    pub claims: LaunchClaims,
}

/// Show all the launch data.
async fn launch_data(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<LaunchSession>,
    Path(launch_id): Path<String>,
) -> Result<Json<LaunchDataResponse>> {
    let launch = require_launch(&state, &session, &launch_id)?;

    Ok(Json(LaunchDataResponse {
        launch_id,
        custom: launch.claims.custom.clone(),
        claims: launch.claims.clone(),
    }))
}
