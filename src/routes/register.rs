// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dynamic registration endpoint.
//!
//! This is the URL an administrator pastes into the platform's
//! tool-registration UI. The platform opens it with a pointer to its
//! OpenID configuration; the handshake itself lives in
//! `services::registration`.

use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::error::Result;
use crate::services::registration::{complete_html, RegisterParams};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/register", get(register))
}

/// Run the dynamic registration handshake.
///
/// On success the platform gets a page that posts the close message back
/// to its registration UI.
async fn register(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RegisterParams>,
) -> Result<Html<String>> {
    let registration = state
        .registrations
        .register(
            &state.config,
            &params.openid_configuration,
            params.registration_token.as_deref(),
        )
        .await?;

    tracing::info!(
        issuer = %registration.issuer,
        client_id = %registration.client_id,
        "Dynamic registration complete"
    );

    Ok(Html(complete_html(&state.config.tool_name)))
}
