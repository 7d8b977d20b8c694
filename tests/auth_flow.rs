// tests/auth_flow.rs
//
// Accounts end to end: registration, both login forms, bearer-protected
// routes, saved analyses and the password reset round trip.

mod common;

use axum::http::{header, StatusCode};
use serde_json::json;
use tower::ServiceExt as _;

use common::{
    form_request, get_request, json_request, register_and_login, send, test_app, ARTICLE_URL,
};

#[tokio::test]
async fn register_then_token_then_me() {
    let t = test_app();
    let (status, user) = send(
        &t.app,
        json_request(
            "POST",
            "/register",
            &json!({ "email": "ana@example.com", "username": "ana", "password": "pw-123456", "full_name": "Ana K" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["email"], "ana@example.com");
    assert_eq!(user["is_admin"], false);
    assert!(user.get("hashed_password").is_none());

    let (status, tok) = send(
        &t.app,
        form_request("/token", "username=ana%40example.com&password=pw-123456"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tok["token_type"], "bearer");
    let token = tok["access_token"].as_str().unwrap();

    let (status, me) = send(&t.app, get_request("/users/me", Some(token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "ana");
    assert_eq!(me["full_name"], "Ana K");
    assert!(me["last_login"].is_string());
}

#[tokio::test]
async fn duplicate_and_invalid_registrations_are_400() {
    let t = test_app();
    register_and_login(&t.app, "dup@example.com", "dup").await;

    let (status, v) = send(
        &t.app,
        json_request(
            "POST",
            "/register",
            &json!({ "email": "DUP@example.com", "username": "dup2", "password": "x" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["detail"], "Email already registered");

    let (status, _) = send(
        &t.app,
        json_request(
            "POST",
            "/register",
            &json!({ "email": "not-an-email", "username": "x", "password": "x" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bad_credentials_are_401_with_bearer_challenge() {
    let t = test_app();
    register_and_login(&t.app, "bo@example.com", "bo").await;

    let resp = t
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/login",
            &json!({ "email": "bo@example.com", "password": "wrong" }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");

    let (status, v) = send(&t.app, get_request("/users/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(v["detail"], "Could not validate credentials");

    let (status, _) = send(&t.app, get_request("/users/me", Some("garbage.token.here"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn authenticated_analyses_are_saved_and_private() {
    let t = test_app();
    let owner = register_and_login(&t.app, "own@example.com", "owner").await;
    let other = register_and_login(&t.app, "oth@example.com", "other").await;

    let (status, scored) = send(
        &t.app,
        json_request(
            "POST",
            "/trust-score",
            &json!({ "text": "Officials reported the figures according to the ministry." }),
            Some(&owner),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = scored["analysis_id"].as_str().expect("analysis_id").to_string();

    let (status, _) = send(
        &t.app,
        json_request("POST", "/analyze-url", &json!({ "url": ARTICLE_URL }), Some(&owner)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, list) = send(&t.app, get_request("/users/me/analyses", Some(&owner))).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert!(list.iter().any(|a| a["content_type"] == "url" && a["url"] == ARTICLE_URL));

    let (status, one) = send(&t.app, get_request(&format!("/analyses/{id}"), Some(&owner))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(one["trust_score"], scored["score"]);

    let (status, v) = send(&t.app, get_request(&format!("/analyses/{id}"), Some(&other))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(v["detail"], "Not authorized to access this analysis");

    let (status, v) = send(&t.app, get_request("/analyses/missing", Some(&owner))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(v["detail"], "Analysis not found");

    let (status, profile) = send(&t.app, get_request("/users/me/profile", Some(&owner))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["analysis_count"], 2);
    assert_eq!(profile["user"]["email"], "own@example.com");

    let (_, others) = send(&t.app, get_request("/users/me/analyses", Some(&other))).await;
    assert!(others.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn password_reset_is_single_use() {
    let t = test_app();
    register_and_login(&t.app, "rp@example.com", "rp").await;

    let (status, v) = send(
        &t.app,
        json_request("POST", "/forgot-password", &json!({ "email": "nobody@example.com" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"], true);
    assert!(v.get("reset_link").is_none());
    assert_eq!(
        v["message"],
        "If your email is registered, you will receive a password reset link"
    );

    let (status, v) = send(
        &t.app,
        json_request("POST", "/forgot-password", &json!({ "email": "rp@example.com" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"], true);
    let link = v["reset_link"].as_str().expect("reset_link without mailer");
    let token = link.split("token=").nth(1).unwrap().to_string();

    let reset = json!({ "token": token, "new_password": "brand-new-pw" });
    let (status, v) = send(&t.app, json_request("POST", "/reset-password", &reset, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"], true);
    assert_eq!(v["message"], "Password reset successfully");

    let (status, v) = send(&t.app, json_request("POST", "/reset-password", &reset, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["detail"], "Invalid or expired token");

    let (status, _) = send(
        &t.app,
        json_request(
            "POST",
            "/login",
            &json!({ "email": "rp@example.com", "password": "brand-new-pw" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &t.app,
        json_request(
            "POST",
            "/login",
            &json!({ "email": "rp@example.com", "password": "secret-pw" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
