// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Message launch handling.
//!
//! The platform POSTs the `id_token` here after the login redirect. The
//! token is validated against the platform's key set, the nonce is
//! consumed, and the launch data is cached under a fresh launch id for
//! follow-up API calls.

use axum::{
    extract::State,
    routing::post,
    Form, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::session::{create_session_jwt, SESSION_COOKIE};
use crate::models::launch::{LaunchClaims, MessageType, LTI_VERSION};
use crate::models::PlatformRegistration;
use crate::routes::login::{verify_state, STATE_COOKIE, STATE_MAX_AGE_MS};
use crate::services::platform_jwks::peek_token_issuer;
use crate::services::StoredLaunch;
use crate::AppState;

/// The IMS reference implementation sends broken nonces on deep-link
/// launches; its issuer is exempted from the nonce check.
const IMS_REFERENCE_ISSUER: &str = "http://imsglobal.org";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/launch", post(launch))
}

/// The form body the platform POSTs back.
#[derive(Debug, Deserialize)]
pub struct LaunchForm {
    id_token: String,
    state: String,
}

/// JSON summary of a successful launch.
#[derive(Debug, Serialize)]
pub struct LaunchResponse {
    pub launch_id: String,
    pub message_type: String,
    /// Which experience to render: "instructor", "student" or "deep_link"
    pub view: String,
    pub user_name: Option<String>,
    pub context_title: Option<String>,
    pub custom: HashMap<String, serde_json::Value>,
    /// Session token, also set as a cookie. Iframe setups where the
    /// cookie is dropped use this as a bearer token.
    pub session_token: String,
}

async fn launch(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LaunchForm>,
) -> Result<(CookieJar, Json<LaunchResponse>)> {
    // State must verify before anything in the token is looked at.
    if verify_state(&form.state, &state.config.state_signing_key, STATE_MAX_AGE_MS).is_none() {
        tracing::warn!("Rejected launch with invalid or expired state");
        return Err(AppError::Unauthorized);
    }

    match jar.get(STATE_COOKIE) {
        Some(cookie) if cookie.value() != form.state => {
            tracing::warn!("Rejected launch: state cookie mismatch");
            return Err(AppError::Unauthorized);
        }
        Some(_) => {}
        None => {
            // Third-party-cookie blocking inside platform iframes makes a
            // lost cookie the common case, not an attack signal.
            tracing::warn!("Launch without state cookie; continuing on signed state only");
        }
    }

    let registration = resolve_registration(&state, &form.id_token)?;

    let claims = state
        .platform_keys
        .verify_id_token(&form.id_token, &registration)
        .await?;

    if claims.version != LTI_VERSION {
        tracing::warn!(version = %claims.version, "Rejected launch with wrong LTI version");
        return Err(AppError::InvalidToken);
    }

    check_nonce(&state, &claims)?;
    check_deployment(&state, &registration, &claims)?;

    let Some(message_type) = claims.message_type() else {
        return Err(AppError::BadRequest(format!(
            "Unsupported message type: {}",
            claims.message_type
        )));
    };

    let view = select_view(&claims, message_type)?;

    let launch = StoredLaunch {
        issuer: registration.issuer.clone(),
        client_id: registration.client_id.clone(),
        claims: claims.clone(),
    };
    let launch_id = state.launches.insert(launch);

    let session_token =
        create_session_jwt(&claims.sub, &launch_id, &state.config.session_signing_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Session JWT failed: {}", e)))?;

    tracing::info!(
        launch_id = %launch_id,
        issuer = %registration.issuer,
        message_type = message_type.as_str(),
        view = %view,
        "Launch validated"
    );

    let secure = state.config.public_url.starts_with("https://");
    let session_cookie = Cookie::build((SESSION_COOKIE, session_token.clone()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(if secure {
            SameSite::None
        } else {
            SameSite::Lax
        })
        .max_age(time::Duration::hours(6))
        .build();

    let jar = jar
        .add(session_cookie)
        .remove(Cookie::build((STATE_COOKIE, "")).path("/").build());

    Ok((
        jar,
        Json(LaunchResponse {
            launch_id,
            message_type: message_type.as_str().to_string(),
            view: view.to_string(),
            user_name: claims.name.clone(),
            context_title: claims.context.as_ref().and_then(|c| c.title.clone()),
            custom: claims.custom,
            session_token,
        }),
    ))
}

/// Find the registration the token claims to be for. Nothing in the token
/// is trusted yet; a wrong guess just means validation fails.
fn resolve_registration(state: &AppState, id_token: &str) -> Result<PlatformRegistration> {
    let info = peek_token_issuer(id_token)?;

    let candidates: Vec<String> = match &info.aud {
        crate::models::launch::Audience::One(aud) => vec![aud.clone()],
        crate::models::launch::Audience::Many(auds) => auds.clone(),
    };

    for client_id in &candidates {
        if let Some(registration) = state.store.get_registration(&info.iss, client_id)? {
            return Ok(registration);
        }
    }

    tracing::warn!(issuer = %info.iss, "Launch from unregistered platform");
    Err(AppError::InvalidToken)
}

/// Enforce single-use nonces, with the reference-implementation carve-out.
fn check_nonce(state: &AppState, claims: &LaunchClaims) -> Result<()> {
    if claims.iss == IMS_REFERENCE_ISSUER && claims.is_deep_link_launch() {
        tracing::warn!("Skipping nonce validation for IMS reference deep link");
        return Ok(());
    }

    let Some(nonce) = claims.nonce.as_deref() else {
        tracing::warn!("Rejected launch without nonce");
        return Err(AppError::InvalidToken);
    };

    if !state.nonces.consume(nonce) {
        tracing::warn!("Rejected launch with unknown or replayed nonce");
        return Err(AppError::InvalidToken);
    }

    Ok(())
}

/// A launch must name a deployment we know. The first launch after a
/// registration that reported no deployment records it instead.
fn check_deployment(
    state: &AppState,
    registration: &PlatformRegistration,
    claims: &LaunchClaims,
) -> Result<()> {
    if registration.has_deployment(&claims.deployment_id) {
        return Ok(());
    }

    if registration.deployment_ids.is_empty() {
        tracing::info!(
            deployment_id = %claims.deployment_id,
            "Recording first deployment for registration"
        );
        state.store.add_deployment(
            &registration.issuer,
            &registration.client_id,
            &claims.deployment_id,
        )?;
        return Ok(());
    }

    tracing::warn!(
        deployment_id = %claims.deployment_id,
        "Rejected launch with unknown deployment"
    );
    Err(AppError::InvalidToken)
}

/// Choose which experience to render based on the launch type and the
/// user's roles.
fn select_view(claims: &LaunchClaims, message_type: MessageType) -> Result<&'static str> {
    if claims.is_instructor() || claims.is_teaching_assistant() {
        if message_type == MessageType::DeepLinking {
            Ok("deep_link")
        } else {
            Ok("instructor")
        }
    } else if claims.is_student() {
        Ok("student")
    } else {
        Err(AppError::Forbidden("You have an unknown role".to_string()))
    }
}
