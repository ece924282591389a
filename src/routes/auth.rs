use crate::{
    auth::{AuthenticatedUser, LoginResponse, Registration, RequestContext},
    database::entities::UserProfile,
    error::AppError,
    routes::response::{ApiResponse, json_body},
    server::Server,
};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::info;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("valid email regex"));

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

fn check_email(email: &str, errors: &mut Vec<String>) {
    if email.is_empty() {
        errors.push("Email is required".to_string());
    } else if !EMAIL_RE.is_match(email) {
        errors.push("Email is not valid".to_string());
    }
}

fn check_password(password: &str, errors: &mut Vec<String>) {
    if password.is_empty() {
        errors.push("Password is required".to_string());
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
}

fn into_result(errors: Vec<String>) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();

        if self.username.is_empty() {
            errors.push("Username is required".to_string());
        } else if self.username.chars().count() < MIN_USERNAME_LEN {
            errors.push(format!(
                "Username must be at least {MIN_USERNAME_LEN} characters"
            ));
        }
        check_email(&self.email, &mut errors);
        check_password(&self.password, &mut errors);
        if self.full_name.trim().is_empty() {
            errors.push("Full name is required".to_string());
        }

        into_result(errors)
    }
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        check_email(&self.email, &mut errors);
        check_password(&self.password, &mut errors);
        into_result(errors)
    }
}

impl RefreshTokenRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.refresh_token.trim().is_empty() {
            return Err(AppError::Validation(vec![
                "Refresh token is required".to_string(),
            ]));
        }
        Ok(())
    }
}

/// Public authentication endpoints
pub fn create_auth_routes() -> Router<Server> {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/refresh-token", post(refresh_token_handler))
}

/// Endpoints that require a bearer access token
pub fn create_protected_auth_routes() -> Router<Server> {
    Router::new()
        .route("/revoke-token", post(revoke_token_handler))
        .route("/logout", post(logout_handler))
}

pub async fn register_handler(
    State(server): State<Server>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let request = json_body(payload)?;
    request.validate()?;

    let profile = server
        .auth_service
        .register(Registration {
            username: request.username,
            email: request.email,
            password: request.password,
            full_name: request.full_name,
        })
        .await?;

    Ok(ApiResponse::ok("User registered successfully", profile))
}

pub async fn login_handler(
    State(server): State<Server>,
    context: RequestContext,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<ApiResponse<LoginResponse>, AppError> {
    let request = json_body(payload)?;
    request.validate()?;

    let response = server
        .auth_service
        .login(&request.email, &request.password, &context)
        .await?;

    Ok(ApiResponse::ok("Login successful", response))
}

pub async fn refresh_token_handler(
    State(server): State<Server>,
    context: RequestContext,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<ApiResponse<LoginResponse>, AppError> {
    let request = json_body(payload)?;
    request.validate()?;

    let response = server
        .auth_service
        .refresh_token(&request.refresh_token, &context.ip_address)
        .await?;

    Ok(ApiResponse::ok("Token refreshed successfully", response))
}

pub async fn revoke_token_handler(
    State(server): State<Server>,
    auth: AuthenticatedUser,
    context: RequestContext,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<ApiResponse<bool>, AppError> {
    let request = json_body(payload)?;
    request.validate()?;

    let revoked = server
        .auth_service
        .revoke_token(&request.refresh_token, &context.ip_address)
        .await?;

    info!(user_id = auth.user.id, revoked, "Revoke token requested");
    let message = if revoked {
        "Token revoked successfully"
    } else {
        "Token was not found or is no longer active"
    };
    Ok(ApiResponse::ok(message, revoked))
}

pub async fn logout_handler(
    State(server): State<Server>,
    auth: AuthenticatedUser,
    context: RequestContext,
) -> Result<ApiResponse<bool>, AppError> {
    server
        .auth_service
        .logout(auth.user.id, &context.ip_address)
        .await?;

    Ok(ApiResponse::ok("Logged out successfully", true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validation_errors(result: Result<(), AppError>) -> Vec<String> {
        match result {
            Err(AppError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_register_request() {
        let request = RegisterRequest {
            username: "ana".to_string(),
            email: "ana@example.com".to_string(),
            password: "secret1".to_string(),
            full_name: "Ana Perez".to_string(),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_register_request_collects_all_errors() {
        let request = RegisterRequest {
            username: "an".to_string(),
            email: "not-an-email".to_string(),
            password: "12345".to_string(),
            full_name: "  ".to_string(),
        };
        let errors = validation_errors(request.validate());
        assert_eq!(
            errors,
            vec![
                "Username must be at least 3 characters",
                "Email is not valid",
                "Password must be at least 6 characters",
                "Full name is required",
            ]
        );
    }

    #[test]
    fn test_missing_fields_are_required() {
        let errors = validation_errors(RegisterRequest::default().validate());
        assert!(errors.contains(&"Username is required".to_string()));
        assert!(errors.contains(&"Email is required".to_string()));
        assert!(errors.contains(&"Password is required".to_string()));

        let errors = validation_errors(LoginRequest::default().validate());
        assert_eq!(errors.len(), 2);

        let errors = validation_errors(RefreshTokenRequest::default().validate());
        assert_eq!(errors, vec!["Refresh token is required"]);
    }

    #[test]
    fn test_length_counts_characters() {
        // Three characters, six bytes
        let request = RegisterRequest {
            username: "ñña".to_string(),
            email: "n@example.com".to_string(),
            password: "pässwd".to_string(),
            full_name: "Ñ".to_string(),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_email_shapes() {
        assert!(EMAIL_RE.is_match("ana@example.com"));
        assert!(EMAIL_RE.is_match("first.last+tag@sub.example.org"));
        assert!(!EMAIL_RE.is_match("ana.example.com"));
        assert!(!EMAIL_RE.is_match("ana@"));
        assert!(!EMAIL_RE.is_match("@example.com"));
        assert!(!EMAIL_RE.is_match("ana@exa mple.com"));
        assert!(!EMAIL_RE.is_match("a@b@c"));
    }

    #[test]
    fn test_request_field_names() {
        let request: RegisterRequest = serde_json::from_str(
            r#"{"username":"ana","email":"ana@example.com","password":"secret1","fullName":"Ana"}"#,
        )
        .unwrap();
        assert_eq!(request.full_name, "Ana");

        let request: RefreshTokenRequest =
            serde_json::from_str(r#"{"refreshToken":"abc"}"#).unwrap();
        assert_eq!(request.refresh_token, "abc");
    }
}
