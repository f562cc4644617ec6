// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Launch session JWT middleware.
//!
//! A successful launch mints a short-lived HS256 token binding the
//! platform user (`sub`) to a launch id. Follow-up API requests must carry
//! it: the launch id alone is a guessable URL component, the session
//! token is not.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "chalkline_session";

/// Session lifetime. Matches the launch cache TTL.
const SESSION_LIFETIME_SECS: usize = 6 * 60 * 60;

/// Session JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Subject (platform user id)
    pub sub: String,
    /// Launch id this session is bound to
    pub lid: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated launch session extracted from the JWT.
#[derive(Debug, Clone)]
pub struct LaunchSession {
    pub sub: String,
    pub launch_id: String,
}

/// Middleware that requires a valid launch session.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header {
            Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
            _ => return Err(StatusCode::UNAUTHORIZED),
        }
    };

    let key = DecodingKey::from_secret(&state.config.session_signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data =
        decode::<SessionClaims>(&token, &key, &validation).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let session = LaunchSession {
        sub: token_data.claims.sub,
        launch_id: token_data.claims.lid,
    };
    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

/// Create a session JWT for a validated launch.
pub fn create_session_jwt(
    sub: &str,
    launch_id: &str,
    signing_key: &[u8],
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = SessionClaims {
        sub: sub.to_string(),
        lid: launch_id.to_string(),
        iat: now,
        exp: now + SESSION_LIFETIME_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
