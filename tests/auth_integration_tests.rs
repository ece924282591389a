mod common;

use axum::http::StatusCode;
use common::{PASSWORD, TestHarness};
use serde_json::json;

#[tokio::test]
async fn test_register_returns_profile_without_secrets() {
    let harness = TestHarness::new().await;

    let response = harness.register("ana", "ana@example.com").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["message"], "User registered successfully");

    let user = &response.body["data"];
    assert_eq!(user["username"], "ana");
    assert_eq!(user["email"], "ana@example.com");
    assert_eq!(user["fullName"], "ana Example");
    assert_eq!(user["isEnabled"], true);
    assert!(user["lastLoginAt"].is_null());
    assert!(user.get("passwordHash").is_none());
    assert!(!response.body.to_string().contains(PASSWORD));
}

#[tokio::test]
async fn test_register_duplicates_rejected() {
    let harness = TestHarness::new().await;
    assert_eq!(
        harness.register("ana", "ana@example.com").await.status,
        StatusCode::OK
    );

    let response = harness.register("other", "ana@example.com").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["message"], "Email is already registered");

    let response = harness.register("ana", "other@example.com").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Username is already taken");
}

#[tokio::test]
async fn test_validation_errors_use_envelope() {
    let harness = TestHarness::new().await;

    let response = harness
        .post(
            "/auth/register",
            json!({ "username": "a", "email": "nope", "password": "123" }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["message"], "Invalid request data");
    assert_eq!(response.body["errors"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let harness = TestHarness::new().await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = harness.send(request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn test_login_issues_token_pair() {
    let harness = TestHarness::new().await;
    harness.register("ana", "ana@example.com").await;

    let response = harness.login("ana@example.com", PASSWORD).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Login successful");

    let data = &response.body["data"];
    assert!(!data["accessToken"].as_str().unwrap().is_empty());
    assert!(!data["refreshToken"].as_str().unwrap().is_empty());
    assert!(data["expiresAt"].is_string());
    assert_eq!(data["user"]["email"], "ana@example.com");
    assert!(data["user"]["lastLoginAt"].is_string());
}

#[tokio::test]
async fn test_login_failures_do_not_reveal_which_part_was_wrong() {
    let harness = TestHarness::new().await;
    harness.register("ana", "ana@example.com").await;

    let unknown = harness.login("nobody@example.com", PASSWORD).await;
    let wrong = harness.login("ana@example.com", "wrong-pass").await;

    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.body["message"], wrong.body["message"]);
}

#[tokio::test]
async fn test_lockout_after_repeated_failures() {
    let harness = TestHarness::new().await;
    harness.register("ana", "ana@example.com").await;

    for _ in 0..5 {
        let response = harness.login("ana@example.com", "wrong-pass").await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.body["message"], "Invalid email or password");
    }

    let response = harness.login("ana@example.com", PASSWORD).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.body["message"],
        "Too many failed login attempts. Please try again later"
    );
}

#[tokio::test]
async fn test_refresh_rotates_token() {
    let harness = TestHarness::new().await;
    let (_, refresh_token) = harness.signed_in("ana", "ana@example.com").await;

    let response = harness
        .post(
            "/auth/refresh-token",
            json!({ "refreshToken": refresh_token }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Token refreshed successfully");
    let rotated = response.body["data"]["refreshToken"].as_str().unwrap();
    assert_ne!(rotated, refresh_token);

    // The presented token is spent
    let replay = harness
        .post(
            "/auth/refresh-token",
            json!({ "refreshToken": refresh_token }),
            None,
        )
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
    assert_eq!(replay.body["message"], "Invalid or expired refresh token");
}

#[tokio::test]
async fn test_refresh_requires_token() {
    let harness = TestHarness::new().await;

    let response = harness
        .post("/auth/refresh-token", json!({ "refreshToken": "" }), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["errors"][0], "Refresh token is required");
}

#[tokio::test]
async fn test_protected_routes_require_bearer_token() {
    let harness = TestHarness::new().await;

    let response = harness.post("/auth/logout", json!({}), None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = harness
        .post("/auth/logout", json!({}), Some("not-a-jwt"))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = harness
        .post(
            "/auth/revoke-token",
            json!({ "refreshToken": "abc" }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_revoke_token() {
    let harness = TestHarness::new().await;
    let (access_token, refresh_token) = harness.signed_in("ana", "ana@example.com").await;

    let response = harness
        .post(
            "/auth/revoke-token",
            json!({ "refreshToken": refresh_token }),
            Some(&access_token),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"], true);

    // Second revoke finds nothing active
    let response = harness
        .post(
            "/auth/revoke-token",
            json!({ "refreshToken": refresh_token }),
            Some(&access_token),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"], false);

    let response = harness
        .post(
            "/auth/refresh-token",
            json!({ "refreshToken": refresh_token }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_all_sessions() {
    let harness = TestHarness::new().await;
    let (access_token, first_refresh) = harness.signed_in("ana", "ana@example.com").await;

    let second = harness.login("ana@example.com", PASSWORD).await;
    let second_refresh = second.body["data"]["refreshToken"]
        .as_str()
        .unwrap()
        .to_string();

    let response = harness
        .post("/auth/logout", json!({}), Some(&access_token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Logged out successfully");

    for token in [first_refresh, second_refresh] {
        let response = harness
            .post("/auth/refresh-token", json!({ "refreshToken": token }), None)
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    // Access tokens stay valid until they expire
    let response = harness
        .post("/auth/logout", json!({}), Some(&access_token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_header() {
    let harness = TestHarness::new().await;

    let response = harness.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");

    let request_id = response.request_id.unwrap();
    assert!(uuid::Uuid::parse_str(&request_id).is_ok());

    let response = harness.login("nobody@example.com", PASSWORD).await;
    assert!(response.request_id.is_some());
}
