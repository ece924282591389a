use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use login_service::{Server, test_utils::TestServerBuilder};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const PASSWORD: &str = "secret-pass";

/// Full application router over an in-memory database
pub struct TestHarness {
    #[allow(dead_code)]
    pub server: Server,
    pub app: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub request_id: Option<String>,
    pub body: Value,
}

impl TestHarness {
    pub async fn new() -> Self {
        let server = TestServerBuilder::new().build().await;
        let app = server.create_app();
        Self { server, app }
    }

    pub async fn post(&self, uri: &str, body: Value, bearer: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, "integration-test/1.0")
            .header("x-forwarded-for", "198.51.100.23");
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            request_id,
            body,
        }
    }

    pub async fn register(&self, username: &str, email: &str) -> TestResponse {
        self.post(
            "/auth/register",
            json!({
                "username": username,
                "email": email,
                "password": PASSWORD,
                "fullName": format!("{username} Example"),
            }),
            None,
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.post(
            "/auth/login",
            json!({ "email": email, "password": password }),
            None,
        )
        .await
    }

    /// Register and log in, returning `(access_token, refresh_token)`
    #[allow(dead_code)]
    pub async fn signed_in(&self, username: &str, email: &str) -> (String, String) {
        assert_eq!(self.register(username, email).await.status, StatusCode::OK);
        let response = self.login(email, PASSWORD).await;
        assert_eq!(response.status, StatusCode::OK);
        let data = &response.body["data"];
        (
            data["accessToken"].as_str().unwrap().to_string(),
            data["refreshToken"].as_str().unwrap().to_string(),
        )
    }
}
