use crate::auth::jwt::AccessClaims;
use crate::database::entities::UserRecord;
use crate::error::AppError;
use crate::middleware::RequestIdExt;
use crate::server::Server;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, trace, warn};

/// Bearer access token authentication for protected `/auth` routes.
///
/// On success the validated [`AccessClaims`] and the owning [`UserRecord`]
/// are placed in the request extensions.
pub async fn jwt_auth_middleware(
    State(server): State<Server>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let request_id = request.extensions().request_id();
    let token = bearer_token(&request)?;

    let claims = server
        .jwt_service
        .validate_access_token(token)
        .map_err(|e| {
            debug!(error = %e, request_id = %request_id, "Access token rejected");
            AppError::Unauthorized("Invalid or expired token".to_string())
        })?;

    let user = server
        .database
        .users()
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| {
            warn!(user_id = claims.sub, request_id = %request_id, "Token for unknown user");
            AppError::Unauthorized("User not found".to_string())
        })?;

    trace!(user_id = user.id, request_id = %request_id, "Access token accepted");

    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Result<&str, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization format".to_string()))
}

/// The caller authenticated by [`jwt_auth_middleware`]
pub struct AuthenticatedUser {
    pub claims: AccessClaims,
    pub user: UserRecord,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<AccessClaims>().cloned();
        let user = parts.extensions.get::<UserRecord>().cloned();

        match (claims, user) {
            (Some(claims), Some(user)) => Ok(Self { claims, user }),
            _ => Err(AppError::Unauthorized(
                "Missing user authentication".to_string(),
            )),
        }
    }
}
