// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for driving the router in integration tests.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chalkline::config::Config;
use chalkline::db::RegistrationStore;
use chalkline::models::PlatformRegistration;
use chalkline::routes::create_router;
use chalkline::services::{
    AccessTokenService, AgsClient, DynamicRegistrationService, LaunchCache, NonceStore,
    NrpsClient, PlatformKeyVerifier, ToolKeys,
};
use chalkline::AppState;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use std::sync::Arc;
use tower::ServiceExt; // for oneshot

#[allow(dead_code)]
pub const PLATFORM_ISSUER: &str = "https://lms.example.edu";
#[allow(dead_code)]
pub const CLIENT_ID: &str = "client-1";
#[allow(dead_code)]
pub const DEPLOYMENT_ID: &str = "dep-1";
#[allow(dead_code)]
pub const PLATFORM_KID: &str = "platform-key-1";

/// The fake platform's signing key for minting id_tokens.
pub struct PlatformKey {
    pub kid: String,
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
}

#[allow(dead_code)]
pub fn platform_key() -> PlatformKey {
    let mut rng = rand::thread_rng();
    let private = RsaPrivateKey::new(&mut rng, 2048).expect("RSA keygen");
    let pem = private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
    let public = private.to_public_key();

    let n = URL_SAFE_NO_PAD.encode(public.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(public.e().to_bytes_be());

    PlatformKey {
        kid: PLATFORM_KID.to_string(),
        encoding: EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap(),
        decoding: DecodingKey::from_rsa_components(&n, &e).unwrap(),
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: Arc<AppState>,
    #[allow(dead_code)]
    pub dir: tempfile::TempDir,
}

/// Build a test app backed by a temp store. With a `PlatformKey`, launch
/// validation runs against that static key instead of fetching JWKS.
#[allow(dead_code)]
pub fn create_test_app(platform: Option<&PlatformKey>) -> TestApp {
    create_test_app_in(tempfile::tempdir().unwrap(), platform)
}

#[allow(dead_code)]
pub fn create_test_app_in(dir: tempfile::TempDir, platform: Option<&PlatformKey>) -> TestApp {
    let mut config = Config::test_default();
    config.storage_path = dir.path().join("chalkline.redb").display().to_string();

    let store = RegistrationStore::open(&config.storage_path).unwrap();
    let keys = ToolKeys::load_or_generate(&store).unwrap();

    let platform_keys = match platform {
        Some(p) => PlatformKeyVerifier::new_with_static_key(p.kid.clone(), p.decoding.clone()),
        None => PlatformKeyVerifier::new().unwrap(),
    };

    let tokens = AccessTokenService::new(keys.clone());
    let registrations = DynamicRegistrationService::new(store.clone()).unwrap();

    let state = Arc::new(AppState {
        config,
        store,
        keys,
        platform_keys,
        launches: LaunchCache::default(),
        nonces: NonceStore::default(),
        tokens,
        ags: AgsClient::new(),
        nrps: NrpsClient::new(),
        registrations,
    });

    TestApp {
        app: create_router(state.clone()),
        state,
        dir,
    }
}

/// Store the standard test registration.
#[allow(dead_code)]
pub fn seed_registration(state: &AppState) -> PlatformRegistration {
    seed_registration_with_deployments(state, vec![DEPLOYMENT_ID.to_string()])
}

#[allow(dead_code)]
pub fn seed_registration_with_deployments(
    state: &AppState,
    deployment_ids: Vec<String>,
) -> PlatformRegistration {
    let registration = PlatformRegistration {
        issuer: PLATFORM_ISSUER.to_string(),
        client_id: CLIENT_ID.to_string(),
        authorization_endpoint: format!("{}/auth", PLATFORM_ISSUER),
        token_endpoint: format!("{}/token", PLATFORM_ISSUER),
        jwks_uri: format!("{}/jwks", PLATFORM_ISSUER),
        deployment_ids,
        registered_at: "2026-01-01T00:00:00Z".to_string(),
    };
    state.store.upsert_registration(&registration).unwrap();
    registration
}

/// Baseline resource-link launch claims for a student; tests override what
/// they need.
#[allow(dead_code)]
pub fn base_launch_claims(nonce: &str) -> serde_json::Value {
    let now = chrono::Utc::now().timestamp();
    serde_json::json!({
        "iss": PLATFORM_ISSUER,
        "aud": CLIENT_ID,
        "sub": "user-42",
        "exp": now + 300,
        "iat": now,
        "nonce": nonce,
        "name": "Ada Lovelace",
        "https://purl.imsglobal.org/spec/lti/claim/message_type": "LtiResourceLinkRequest",
        "https://purl.imsglobal.org/spec/lti/claim/version": "1.3.0",
        "https://purl.imsglobal.org/spec/lti/claim/deployment_id": DEPLOYMENT_ID,
        "https://purl.imsglobal.org/spec/lti/claim/roles": [
            "http://purl.imsglobal.org/vocab/lis/v2/membership#Learner"
        ],
        "https://purl.imsglobal.org/spec/lti/claim/resource_link": {"id": "rl-9"},
        "https://purl.imsglobal.org/spec/lti/claim/context": {"id": "c-1", "title": "Geometry 101"},
    })
}

#[allow(dead_code)]
pub fn sign_id_token(platform: &PlatformKey, claims: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(platform.kid.clone());
    jsonwebtoken::encode(&header, claims, &platform.encoding).unwrap()
}

/// What a login redirect hands the follow-up launch.
pub struct LoginArtifacts {
    pub state: String,
    pub nonce: String,
    pub cookie: String,
    pub location: String,
}

/// Drive `/login` and pull state, nonce, and cookie out of the redirect.
#[allow(dead_code)]
pub async fn do_login(app: &Router) -> LoginArtifacts {
    let body = format!(
        "iss={}&target_link_uri={}&login_hint=42",
        urlencoding::encode(PLATFORM_ISSUER),
        urlencoding::encode("http://127.0.0.1:9001/launch"),
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|h| h.to_str().ok())
        .expect("login must redirect")
        .to_string();

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|c| c.split(';').next())
        .expect("login must set the state cookie")
        .to_string();

    LoginArtifacts {
        state: query_param(&location, "state").expect("state in redirect"),
        nonce: query_param(&location, "nonce").expect("nonce in redirect"),
        cookie,
        location,
    }
}

/// POST an id_token + state to `/launch` with the state cookie attached.
#[allow(dead_code)]
pub async fn do_launch(
    app: &Router,
    id_token: &str,
    state: &str,
    cookie: Option<&str>,
) -> axum::http::Response<Body> {
    let body = format!(
        "id_token={}&state={}",
        urlencoding::encode(id_token),
        urlencoding::encode(state),
    );

    let mut builder = Request::builder()
        .method("POST")
        .uri("/launch")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");

    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    app.clone()
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// Pull a raw query parameter out of a URL.
#[allow(dead_code)]
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    for pair in query.split('&') {
        if let Some((k, v)) = pair.split_once('=') {
            if k == name {
                return Some(v.to_string());
            }
        }
    }
    None
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read a response body as a string.
#[allow(dead_code)]
pub async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
