// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth2 client-credentials access tokens for LTI Advantage services.
//!
//! Handles:
//! - RS256 client assertions signed with the tool key
//! - The client_credentials grant against the platform token endpoint
//! - In-memory token caching with an expiry margin
//! - Per-registration locking so concurrent requests trigger one grant

use crate::error::AppError;
use crate::models::PlatformRegistration;
use crate::services::keys::ToolKeys;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Margin before token expiration when we stop using a cached token.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime of a client assertion JWT.
const ASSERTION_LIFETIME_SECS: i64 = 5 * 60;

pub const CLIENT_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// LTI Advantage scope URIs this tool requests.
pub mod scopes {
    pub const AGS_LINEITEM: &str = "https://purl.imsglobal.org/spec/lti-ags/scope/lineitem";
    pub const AGS_RESULT_READONLY: &str =
        "https://purl.imsglobal.org/spec/lti-ags/scope/result.readonly";
    pub const AGS_SCORE: &str = "https://purl.imsglobal.org/spec/lti-ags/scope/score";
    pub const NRPS_MEMBERSHIP_READONLY: &str =
        "https://purl.imsglobal.org/spec/lti-nrps/scope/contextmembership.readonly";

    /// Every scope requested during dynamic registration.
    pub fn all() -> [&'static str; 4] {
        [
            NRPS_MEMBERSHIP_READONLY,
            AGS_LINEITEM,
            AGS_RESULT_READONLY,
            AGS_SCORE,
        ]
    }
}

/// Cached access token with expiry information.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Shared token cache type for use in AppState.
pub type TokenCache = Arc<DashMap<String, CachedToken>>;

type GrantLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Access-token service for platform web services (AGS, NRPS).
#[derive(Clone)]
pub struct AccessTokenService {
    http: reqwest::Client,
    keys: ToolKeys,
    token_cache: TokenCache,
    grant_locks: GrantLocks,
}

impl AccessTokenService {
    pub fn new(keys: ToolKeys) -> Self {
        Self {
            http: reqwest::Client::new(),
            keys,
            token_cache: Arc::new(DashMap::new()),
            grant_locks: Arc::new(DashMap::new()),
        }
    }

    /// Get a valid access token for the registration and scope set.
    ///
    /// Strategy, in order:
    /// 1. Check in-memory cache (fast path - no I/O)
    /// 2. Acquire per-registration lock to prevent duplicate grants
    /// 3. Re-check cache after lock (another task may have fetched)
    /// 4. Run the client_credentials grant and cache the result
    pub async fn access_token(
        &self,
        registration: &PlatformRegistration,
        requested_scopes: &[&str],
    ) -> Result<String, AppError> {
        let cache_key = format!(
            "{}|{}|{}",
            registration.issuer,
            registration.client_id,
            requested_scopes.join(" ")
        );

        if let Some(cached) = self.token_cache.get(&cache_key) {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        let lock = self
            .grant_locks
            .entry(cache_key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock().await;

        // Another task may have fetched while we were waiting.
        if let Some(cached) = self.token_cache.get(&cache_key) {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        tracing::info!(
            issuer = %registration.issuer,
            client_id = %registration.client_id,
            "Requesting service access token"
        );

        let response = self.request_grant(registration, requested_scopes).await?;

        let expires_at = Instant::now() + Duration::from_secs(response.expires_in.max(0) as u64);
        self.token_cache.insert(
            cache_key,
            CachedToken {
                access_token: response.access_token.clone(),
                expires_at,
            },
        );

        Ok(response.access_token)
    }

    async fn request_grant(
        &self,
        registration: &PlatformRegistration,
        requested_scopes: &[&str],
    ) -> Result<TokenGrantResponse, AppError> {
        let assertion = client_assertion(
            &self.keys,
            &registration.client_id,
            &registration.token_endpoint,
        )?;

        let response = self
            .http
            .post(&registration.token_endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_assertion_type", CLIENT_ASSERTION_TYPE),
                ("client_assertion", assertion.as_str()),
                ("scope", requested_scopes.join(" ").as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::PlatformApi(format!("Token grant request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::PlatformApi(format!(
                "Token grant returned HTTP {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::PlatformApi(format!("Invalid token grant JSON: {}", e)))
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenGrantResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

/// Claims of the client assertion JWT.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Build the signed client assertion for a token grant.
pub fn client_assertion(
    keys: &ToolKeys,
    client_id: &str,
    token_endpoint: &str,
) -> Result<String, AppError> {
    let now = Utc::now().timestamp();

    let claims = AssertionClaims {
        iss: client_id.to_string(),
        sub: client_id.to_string(),
        aud: token_endpoint.to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };

    keys.sign(&claims)
}
