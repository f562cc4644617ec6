// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Deep-link completion.
//!
//! The instructor picked what the new link should carry; answer the
//! platform with a signed content-item JWT wrapped in an auto-submitting
//! form.

use axum::{
    extract::{Path, State},
    response::Html,
    routing::post,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::session::LaunchSession;
use crate::services::deep_linking::{build_response_jwt, response_form, ContentItem};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/deep-link/{launch_id}", post(complete_deep_link))
}

/// What the instructor chose for the new link.
#[derive(Debug, Deserialize)]
pub struct DeepLinkRequest {
    #[serde(default)]
    pub title: Option<String>,
    /// Custom launch parameters baked into the link (e.g. a special word,
    /// a chapter id).
    #[serde(default)]
    pub custom: HashMap<String, String>,
}

/// Finish a deep-link launch by returning the content-item response form.
async fn complete_deep_link(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<LaunchSession>,
    Path(launch_id): Path<String>,
    Json(request): Json<DeepLinkRequest>,
) -> Result<Html<String>> {
    if session.launch_id != launch_id {
        return Err(AppError::Unauthorized);
    }

    let launch = state
        .launches
        .get(&launch_id)
        .ok_or_else(|| AppError::NotFound(format!("Launch {}", launch_id)))?;

    if !launch.claims.is_deep_link_launch() {
        return Err(AppError::Forbidden("Must be a deep link".to_string()));
    }

    let Some(settings) = launch.claims.deep_linking_settings.as_ref() else {
        return Err(AppError::BadRequest(
            "Launch carries no deep linking settings".to_string(),
        ));
    };

    let title = request
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "New activity".to_string());

    let item = ContentItem::resource_link(&state.config.launch_url(), title, request.custom);

    let jwt = build_response_jwt(
        &state.keys,
        &launch.client_id,
        &launch.issuer,
        &launch.claims.deployment_id,
        settings.data.as_deref(),
        vec![item],
    )?;

    tracing::info!(
        launch_id = %launch_id,
        return_url = %settings.deep_link_return_url,
        "Deep link completed"
    );

    Ok(Html(response_form(&settings.deep_link_return_url, &jwt)))
}
