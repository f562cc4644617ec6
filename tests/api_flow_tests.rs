// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Score and scoreboard route tests.
//!
//! The happy paths end in calls against a live platform; what can be
//! verified hermetically is everything up to that boundary: claim gating,
//! payload validation, and session checks.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::*;
use tower::ServiceExt;

/// Launch as a student whose id_token carries no service claims.
async fn plain_launch(app: &common::TestApp, platform: &PlatformKey) -> (String, String) {
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

async fn post_score(
    app: &axum::Router,
    launch_id: &str,
    session_token: &str,
    body: serde_json::Value,
) -> axum::http::Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/score/{}", launch_id))
                .header(header::AUTHORIZATION, format!("Bearer {}", session_token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_score_without_ags_claim_is_forbidden() {
    let platform = platform_key();
    let app = create_test_app(Some(&platform));
    let (launch_id, session_token) = plain_launch(&app, &platform).await;

    let response = post_score(
        &app.app,
        &launch_id,
        &session_token,
        serde_json::json!({"score": 87.0}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error"], "forbidden");
    assert!(json["details"]
        .as_str()
        .unwrap()
        .contains("grades service"));
}

#[tokio::test]
async fn test_score_out_of_range_is_rejected() {
    let platform = platform_key();
    let app = create_test_app(Some(&platform));
    let (launch_id, session_token) = plain_launch(&app, &platform).await;

    for bad in [140.0, -5.0] {
        let response = post_score(
            &app.app,
            &launch_id,
            &session_token,
            serde_json::json!({"score": bad}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_score_for_unknown_launch() {
    let platform = platform_key();
    let app = create_test_app(Some(&platform));
    let (_, session_token) = plain_launch(&app, &platform).await;

    let response = post_score(
        &app.app,
        "expired-launch-id",
        &session_token,
        serde_json::json!({"score": 50.0}),
    )
    .await;

    // The session names a different launch id, so this dies at the
    // session check rather than the cache lookup.
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_scoreboard_without_nrps_claim_is_forbidden() {
    let platform = platform_key();
    let app = create_test_app(Some(&platform));
    let (launch_id, session_token) = plain_launch(&app, &platform).await;

    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/api/scoreboard/{}", launch_id))
                .header(header::AUTHORIZATION, format!("Bearer {}", session_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert!(json["details"]
        .as_str()
        .unwrap()
        .contains("membership service"));
}
