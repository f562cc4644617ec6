// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tool public key set endpoint.

use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use crate::services::keys::Jwks;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/jwks", get(jwks))
}

/// Return the tool's JSON Web Key Set.
///
/// Platforms fetch this to verify client assertions and deep-linking
/// response JWTs.
async fn jwks(State(state): State<Arc<AppState>>) -> Json<Jwks> {
    Json(state.keys.jwks())
}
