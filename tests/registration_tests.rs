// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration endpoint and public tool surface tests.
//!
//! The full handshake needs a live platform on the other end; these cover
//! the request validation in front of it plus the key set the platform
//! fetches afterwards.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use tower::ServiceExt;

#[tokio::test]
async fn test_register_requires_openid_configuration() {
    let app = create_test_app(None);

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/register")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_rejects_plain_http_configuration() {
    let app = create_test_app(None);

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/register?openid_configuration=http%3A%2F%2Flms.example.edu%2Fconf")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn test_jwks_serves_the_tool_key() {
    let app = create_test_app(None);
    let kid = app.state.keys.kid().to_string();

    let response = app
        .app
        .clone()
        .oneshot(Request::builder().uri("/jwks").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    let keys = json["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["kty"], "RSA");
    assert_eq!(keys[0]["alg"], "RS256");
    assert_eq!(keys[0]["use"], "sig");
    assert_eq!(keys[0]["kid"], kid.as_str());
    assert_eq!(keys[0]["e"], "AQAB");
    assert!(!keys[0]["n"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_jwks_is_stable_across_restart() {
    let platform_dir = tempfile::tempdir().unwrap();

    let first = create_test_app_in(platform_dir, None);
    let kid = first.state.keys.kid().to_string();
    let n = first.state.keys.jwks().keys[0].n.clone();

    // Release the store's file lock, then reopen it as a process restart
    // would.
    let common::TestApp { app, state, dir } = first;
    drop(app);
    drop(state);
    let reopened = create_test_app_in(dir, None);
    assert_eq!(reopened.state.keys.kid(), kid);
    assert_eq!(reopened.state.keys.jwks().keys[0].n, n);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(None);

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_responses_are_frameable() {
    let app = create_test_app(None);

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert!(headers.get("X-Frame-Options").is_none());
    let csp = headers
        .get("Content-Security-Policy")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(csp.contains("frame-ancestors *"));
}
