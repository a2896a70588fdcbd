// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication, credential status and CORS tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without a valid session
//! 2. `/api/me` reports credential status and the authorization path
//! 3. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

mod common;
use common::{body_json, create_test_app, credentials, session_cookie, test_config, FakeNetatmo};

/// Create a test JWT with an explicit expiry offset.
fn create_test_jwt(uid: &str, signing_key: &[u8], exp_offset: i64) -> String {
    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
        iat: usize,
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: uid.to_string(),
        exp: (now + exp_offset) as usize,
        iat: now as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}

#[tokio::test]
async fn test_protected_routes_without_token() {
    let fake = FakeNetatmo::start().await;
    let (app, _) = create_test_app(test_config(&fake));

    for uri in ["/api/me", "/api/dashboard/daily", "/api/measures/boiler"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let fake = FakeNetatmo::start().await;
    let (app, _) = create_test_app(test_config(&fake));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(header::AUTHORIZATION, "Bearer invalid.token.here")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_expired_token() {
    let fake = FakeNetatmo::start().await;
    let config = test_config(&fake);
    let (app, _) = create_test_app(config.clone());
    let token = create_test_jwt("uid-old", &config.jwt_signing_key, -3600);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_without_credentials_points_to_authorization() {
    let fake = FakeNetatmo::start().await;
    let config = test_config(&fake);
    let (app, _) = create_test_app(config.clone());
    let token = create_test_jwt("uid-fresh", &config.jwt_signing_key, 86400);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["uid"], "uid-fresh");
    assert_eq!(body["authorized"], false);
    assert_eq!(body["authorize_path"], "/auth/netatmo");
}

#[tokio::test]
async fn test_me_with_valid_credentials() {
    let fake = FakeNetatmo::start().await;
    let config = test_config(&fake);
    let (app, state) = create_test_app(config.clone());
    state
        .db
        .merge_credentials("uid-ok", &credentials("uid-ok", 3_600_000, Some("r")))
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(header::COOKIE, session_cookie("uid-ok", &config))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["authorized"], true);
    assert_eq!(body["enabled"], true);
    assert!(body["expires_at"].as_str().unwrap().ends_with('Z'));
    assert!(body.get("authorize_path").is_none());
}

#[tokio::test]
async fn test_me_with_unrefreshable_credentials() {
    let fake = FakeNetatmo::start().await;
    let config = test_config(&fake);
    let (app, state) = create_test_app(config.clone());
    state
        .db
        .merge_credentials("uid-stuck", &credentials("uid-stuck", -1_000, None))
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(header::COOKIE, session_cookie("uid-stuck", &config))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["authorized"], false);
    assert_eq!(body["enabled"], true);
    assert_eq!(body["authorize_path"], "/auth/netatmo");
}

#[tokio::test]
async fn test_cors_preflight() {
    let fake = FakeNetatmo::start().await;
    let (app, _) = create_test_app(test_config(&fake));

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/dashboard/daily")
                .header(header::ORIGIN, "http://localhost:4200")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // OPTIONS should return 200 (CORS preflight success)
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:4200"
    );
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_health_is_public() {
    let fake = FakeNetatmo::start().await;
    let (app, _) = create_test_app(test_config(&fake));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "offline");
}
