// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Launch session authentication tests.
//!
//! These verify that the session JWT minted at launch is the only thing
//! that opens the API routes, and that it only opens its own launch.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chalkline::middleware::session::{create_session_jwt, SessionClaims};
use common::*;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use tower::ServiceExt;

/// Run a real login + launch and hand back (launch_id, session_token).
async fn launched_session(app: &common::TestApp, platform: &PlatformKey) -> (String, String) {
    seed_registration(&app.state);

    let login = do_login(&app.app).await;
    let claims = base_launch_claims(&login.nonce);
    let id_token = sign_id_token(platform, &claims);

    let response = do_launch(&app.app, &id_token, &login.state, Some(&login.cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    (
        json["launch_id"].as_str().unwrap().to_string(),
        json["session_token"].as_str().unwrap().to_string(),
    )
}

async fn get_launch_data(
    app: &axum::Router,
    launch_id: &str,
    auth: Option<(&str, &str)>,
) -> axum::http::Response<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri(format!("/api/launch/{}", launch_id));

    if let Some((name, value)) = auth {
        builder = builder.header(name, value);
    }

    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let platform = platform_key();
    let app = create_test_app(Some(&platform));
    let (launch_id, _) = launched_session(&app, &platform).await;

    let response = get_launch_data(&app.app, &launch_id, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_garbage_token() {
    let platform = platform_key();
    let app = create_test_app(Some(&platform));
    let (launch_id, _) = launched_session(&app, &platform).await;

    let response = get_launch_data(
        &app.app,
        &launch_id,
        Some((header::AUTHORIZATION.as_str(), "Bearer not.a.jwt")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_wrong_key_token() {
    let platform = platform_key();
    let app = create_test_app(Some(&platform));
    let (launch_id, _) = launched_session(&app, &platform).await;

    let forged = create_session_jwt("user-42", &launch_id, b"not_the_server_signing_key!!!!!!")
        .unwrap();

    let auth = format!("Bearer {}", forged);
    let response = get_launch_data(
        &app.app,
        &launch_id,
        Some((header::AUTHORIZATION.as_str(), &auth)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_expired_token() {
    let platform = platform_key();
    let app = create_test_app(Some(&platform));
    let (launch_id, _) = launched_session(&app, &platform).await;

    let past = (chrono::Utc::now().timestamp() - 3600) as usize;
    let claims = SessionClaims {
        sub: "user-42".to_string(),
        lid: launch_id.clone(),
        iat: past - 60,
        exp: past,
    };
    let expired = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(&app.state.config.session_signing_key),
    )
    .unwrap();

    let auth = format!("Bearer {}", expired);
    let response = get_launch_data(
        &app.app,
        &launch_id,
        Some((header::AUTHORIZATION.as_str(), &auth)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_token_opens_launch_data() {
    let platform = platform_key();
    let app = create_test_app(Some(&platform));
    let (launch_id, session_token) = launched_session(&app, &platform).await;

    let auth = format!("Bearer {}", session_token);
    let response = get_launch_data(
        &app.app,
        &launch_id,
        Some((header::AUTHORIZATION.as_str(), &auth)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["launch_id"], launch_id.as_str());
    assert_eq!(json["claims"]["sub"], "user-42");
}

#[tokio::test]
async fn test_session_cookie_opens_launch_data() {
    let platform = platform_key();
    let app = create_test_app(Some(&platform));
    let (launch_id, session_token) = launched_session(&app, &platform).await;

    let cookie = format!("chalkline_session={}", session_token);
    let response = get_launch_data(
        &app.app,
        &launch_id,
        Some((header::COOKIE.as_str(), &cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_session_is_bound_to_its_launch() {
    let platform = platform_key();
    let app = create_test_app(Some(&platform));
    let (_, session_token) = launched_session(&app, &platform).await;

    // A valid session for launch A opens nothing under launch B.
    let auth = format!("Bearer {}", session_token);
    let response = get_launch_data(
        &app.app,
        "some-other-launch-id",
        Some((header::AUTHORIZATION.as_str(), &auth)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
