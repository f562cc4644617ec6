// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Platform id_token verification against per-platform JWKS documents.

use crate::error::AppError;
use crate::models::{LaunchClaims, PlatformRegistration};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

#[derive(Clone)]
enum VerifierMode {
    Remote,
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for platform-issued launch id_tokens.
///
/// Caches each platform's JWKS by URL; key rotation is handled by a forced
/// refresh when an unknown kid shows up.
pub struct PlatformKeyVerifier {
    http_client: reqwest::Client,
    mode: VerifierMode,
    jwks_cache: RwLock<HashMap<String, JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl PlatformKeyVerifier {
    /// Create a production verifier that fetches and caches platform JWKS
    /// documents.
    pub fn new() -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            mode: VerifierMode::Remote,
            jwks_cache: RwLock::new(HashMap::new()),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Create a verifier with a static RSA public key.
    ///
    /// This is intended for deterministic local/integration tests.
    pub fn new_with_static_key(kid: impl Into<String>, decoding_key: DecodingKey) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            mode: VerifierMode::StaticKey {
                kid: kid.into(),
                decoding_key: Arc::new(decoding_key),
            },
            jwks_cache: RwLock::new(HashMap::new()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Fully validate a launch id_token against its registration.
    ///
    /// Checks signature (via the platform JWKS), issuer, audience, expiry
    /// with clock-skew leeway, and `azp` when the audience is multi-valued.
    /// Nonce and deployment checks live with the launch flow; they need
    /// state this verifier does not hold.
    pub async fn verify_id_token(
        &self,
        token: &str,
        registration: &PlatformRegistration,
    ) -> Result<LaunchClaims, AppError> {
        let header =
            decode_header(token).map_err(|e| {
                tracing::warn!(error = %e, "Rejected id_token with invalid header");
                AppError::InvalidToken
            })?;

        if header.alg != Algorithm::RS256 {
            tracing::warn!(alg = ?header.alg, "Rejected id_token with unexpected alg");
            return Err(AppError::InvalidToken);
        }

        let kid = header.kid.ok_or_else(|| {
            tracing::warn!("Rejected id_token without kid");
            AppError::InvalidToken
        })?;

        let decoding_key = self
            .decoding_key_for(&registration.jwks_uri, &kid)
            .await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.set_issuer(&[registration.issuer.as_str()]);
        validation.set_audience(&[registration.client_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<LaunchClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| {
                tracing::warn!(error = %e, issuer = %registration.issuer, "id_token validation failed");
                AppError::InvalidToken
            })?;

        let claims = token_data.claims;

        // With a multi-valued aud the authorized party must name us.
        if let crate::models::launch::Audience::Many(_) = claims.aud {
            match claims.azp.as_deref() {
                Some(azp) if azp == registration.client_id => {}
                other => {
                    tracing::warn!(azp = ?other, "Rejected id_token: azp mismatch");
                    return Err(AppError::InvalidToken);
                }
            }
        }

        Ok(claims)
    }

    async fn decoding_key_for(
        &self,
        jwks_uri: &str,
        kid: &str,
    ) -> Result<Arc<DecodingKey>, AppError> {
        match &self.mode {
            VerifierMode::StaticKey {
                kid: static_kid,
                decoding_key,
            } => {
                if kid == static_kid {
                    return Ok(decoding_key.clone());
                }

                tracing::warn!(kid = %kid, "Unknown kid for static verifier");
                return Err(AppError::InvalidToken);
            }
            VerifierMode::Remote => {}
        }

        if let Some(key) = self.lookup_cached_key(jwks_uri, kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(jwks_uri, force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(jwks_uri, kid).await {
                return Ok(key);
            }
        }

        tracing::warn!(kid = %kid, jwks_uri = %jwks_uri, "kid not found in JWKS after refresh");
        Err(AppError::InvalidToken)
    }

    async fn lookup_cached_key(&self, jwks_uri: &str, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .get(jwks_uri)
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, jwks_uri: &str, force_refresh: bool) -> Result<(), AppError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .get(jwks_uri)
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(jwks_uri = %jwks_uri, "Refreshing platform JWKS cache");

        let response = self
            .http_client
            .get(jwks_uri)
            .send()
            .await
            .map_err(|e| AppError::PlatformApi(format!("JWKS request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::PlatformApi(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: RemoteJwks = response
            .json()
            .await
            .map_err(|e| AppError::PlatformApi(format!("invalid JWKS JSON: {}", e)))?;

        let mut keys_by_kid: HashMap<String, Arc<DecodingKey>> = HashMap::new();

        for jwk in jwks.keys {
            if jwk.kty != "RSA" {
                continue;
            }

            if jwk.kid.trim().is_empty() {
                continue;
            }

            if let Some(alg) = &jwk.alg {
                if alg != "RS256" {
                    continue;
                }
            }

            if let Some(use_) = &jwk.use_ {
                if use_ != "sig" {
                    continue;
                }
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys_by_kid.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }

        if keys_by_kid.is_empty() {
            return Err(AppError::PlatformApi(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        let entry = JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        };

        self.jwks_cache
            .write()
            .await
            .insert(jwks_uri.to_string(), entry);

        tracing::debug!(ttl_secs = ttl.as_secs(), "Platform JWKS cache refreshed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RemoteJwks {
    keys: Vec<RemoteJwk>,
}

#[derive(Debug, Deserialize)]
struct RemoteJwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

/// The issuer and audience of a token, read WITHOUT verifying the
/// signature. Only used to pick the registration to verify against.
#[derive(Debug, Deserialize)]
pub struct UnverifiedTokenInfo {
    pub iss: String,
    pub aud: crate::models::launch::Audience,
}

/// Decode a JWT's payload segment without verification.
///
/// LTI tools must look inside the token to learn which platform sent it
/// before they can know which key set verifies it. Nothing from this
/// function is trusted beyond registration lookup.
pub fn peek_token_issuer(token: &str) -> Result<UnverifiedTokenInfo, AppError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_sig), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AppError::InvalidToken);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AppError::InvalidToken)?;

    serde_json::from_slice(&bytes).map_err(|_| AppError::InvalidToken)
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    let Some(max_age) = headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
    else {
        return fallback;
    };

    Duration::from_secs(max_age)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    for directive in value.split(',') {
        let directive = directive.trim();

        if let Some(raw) = directive.strip_prefix("max-age=") {
            let raw = raw.trim_matches('"');
            if let Ok(seconds) = raw.parse::<u64>() {
                return Some(seconds);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cache_control_max_age_valid() {
        assert_eq!(
            parse_cache_control_max_age("public, max-age=3600"),
            Some(3600)
        );
        assert_eq!(parse_cache_control_max_age("max-age=60"), Some(60));
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
    }

    #[test]
    fn parse_cache_control_max_age_invalid() {
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
        assert_eq!(parse_cache_control_max_age(""), None);
    }

    #[test]
    fn peek_token_issuer_reads_payload() {
        let payload = serde_json::json!({
            "iss": "https://lms.example.edu",
            "aud": "client-1",
        });
        let token = format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(b"{\"alg\":\"RS256\"}"),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap()),
            URL_SAFE_NO_PAD.encode(b"sig")
        );

        let info = peek_token_issuer(&token).unwrap();
        assert_eq!(info.iss, "https://lms.example.edu");
        assert!(info.aud.contains("client-1"));
    }

    #[test]
    fn peek_token_issuer_rejects_garbage() {
        assert!(peek_token_issuer("not-a-jwt").is_err());
        assert!(peek_token_issuer("a.b").is_err());
        assert!(peek_token_issuer("a.%%%.c").is_err());
    }
}
