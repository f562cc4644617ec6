// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OIDC third-party-initiated login.
//!
//! The platform sends the browser here first; we answer with a redirect to
//! the platform's authorization endpoint carrying a signed `state` and a
//! single-use `nonce`. The id_token comes back at `/launch`.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Form, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::models::PlatformRegistration;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Cookie echoing the login state, to tie launch and login to one browser.
pub const STATE_COOKIE: &str = "chalkline_state";

/// Maximum age of a login state before the launch must be rejected.
pub const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/login", get(login_get).post(login_post))
}

/// Login initiation parameters, per the OIDC third-party login profile.
#[derive(Debug, Deserialize)]
pub struct LoginParams {
    iss: String,
    /// Where the platform wants the launch to land.
    target_link_uri: Option<String>,
    #[serde(default)]
    login_hint: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    lti_message_hint: Option<String>,
    #[serde(default)]
    lti_deployment_id: Option<String>,
}

/// Platforms may initiate login with either verb.
async fn login_get(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<LoginParams>,
) -> Result<(CookieJar, Redirect)> {
    initiate_login(state, jar, params).await
}

async fn login_post(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(params): Form<LoginParams>,
) -> Result<(CookieJar, Redirect)> {
    initiate_login(state, jar, params).await
}

async fn initiate_login(
    state: Arc<AppState>,
    jar: CookieJar,
    params: LoginParams,
) -> Result<(CookieJar, Redirect)> {
    let Some(target_link_uri) = params.target_link_uri else {
        return Err(AppError::BadRequest(
            "Missing \"target_link_uri\" param".to_string(),
        ));
    };

    let registration = resolve_registration(&state, &params.iss, params.client_id.as_deref())?;

    let oauth_state = sign_state(&target_link_uri, &state.config.state_signing_key)?;
    let nonce = state.nonces.issue();

    let auth_url = build_authorize_url(
        &registration,
        &state.config.launch_url(),
        &oauth_state,
        &nonce,
        params.login_hint.as_deref(),
        params.lti_message_hint.as_deref(),
        params.lti_deployment_id.as_deref(),
    );

    tracing::info!(
        issuer = %registration.issuer,
        client_id = %registration.client_id,
        "Login initiated, redirecting to platform"
    );

    // Cross-site POST back to /launch needs SameSite=None; browsers only
    // honor that with Secure, which an http://127.0.0.1 dev setup can't
    // offer. The launch handler tolerates a missing cookie for that case.
    let secure = state.config.public_url.starts_with("https://");
    let cookie = Cookie::build((STATE_COOKIE, oauth_state.clone()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(if secure {
            SameSite::None
        } else {
            SameSite::Lax
        })
        .max_age(time::Duration::minutes(10))
        .build();

    Ok((jar.add(cookie), Redirect::temporary(&auth_url)))
}

/// Pick the registration for a login request.
fn resolve_registration(
    state: &AppState,
    iss: &str,
    client_id: Option<&str>,
) -> Result<PlatformRegistration> {
    if let Some(client_id) = client_id {
        return state
            .store
            .get_registration(iss, client_id)?
            .ok_or_else(|| AppError::NotFound(format!("Registration for {}", iss)));
    }

    let mut found = state.store.find_by_issuer(iss)?;
    match found.len() {
        0 => Err(AppError::NotFound(format!("Registration for {}", iss))),
        1 => Ok(found.remove(0)),
        _ => Err(AppError::BadRequest(
            "Multiple registrations for issuer; client_id required".to_string(),
        )),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_authorize_url(
    registration: &PlatformRegistration,
    launch_url: &str,
    oauth_state: &str,
    nonce: &str,
    login_hint: Option<&str>,
    lti_message_hint: Option<&str>,
    lti_deployment_id: Option<&str>,
) -> String {
    let mut url = format!(
        "{}?scope=openid&\
         response_type=id_token&\
         response_mode=form_post&\
         prompt=none&\
         client_id={}&\
         redirect_uri={}&\
         state={}&\
         nonce={}",
        registration.authorization_endpoint,
        urlencoding::encode(&registration.client_id),
        urlencoding::encode(launch_url),
        oauth_state,
        nonce,
    );

    if let Some(hint) = login_hint {
        url.push_str(&format!("&login_hint={}", urlencoding::encode(hint)));
    }
    if let Some(hint) = lti_message_hint {
        url.push_str(&format!("&lti_message_hint={}", urlencoding::encode(hint)));
    }
    if let Some(id) = lti_deployment_id {
        url.push_str(&format!("&lti_deployment_id={}", urlencoding::encode(id)));
    }

    url
}

/// Sign the launch target into the OAuth state parameter.
///
/// Format is `target|timestamp_hex|signature_hex`, base64url-encoded.
pub fn sign_state(target_link_uri: &str, secret: &[u8]) -> Result<String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let state_payload = format!("{}|{:x}", target_link_uri, timestamp);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(state_payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed_state = format!("{}|{}", state_payload, hex::encode(signature));

    Ok(URL_SAFE_NO_PAD.encode(signed_state.as_bytes()))
}

/// Verify the state signature and age, returning the launch target.
pub fn verify_state(state: &str, secret: &[u8], max_age_ms: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "target|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let target = parts[0];
    let timestamp_hex = parts[1];
    let signature_hex = parts[2];

    // Reconstruct payload and verify signature
    let payload = format!("{}|{}", target, timestamp_hex);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());

    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected_signature {
        tracing::error!("Login state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_at = u128::from_str_radix(timestamp_hex, 16).ok()?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()?
        .as_millis();

    if now.saturating_sub(issued_at) > max_age_ms {
        tracing::warn!("Login state expired");
        return None;
    }

    Some(target.to_string())
}
