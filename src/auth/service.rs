//! Authentication engine: login, registration, refresh token rotation,
//! revocation and logout over the credential store, the attempt ledger and the
//! refresh token store.

use crate::auth::jwt::{AccessClaims, JwtService};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::request_context::RequestContext;
use crate::config::Config;
use crate::database::entities::{
    NewLoginAttempt, NewUser, UserProfile, UserRecord,
    login_attempts::FAILURE_INCORRECT_PASSWORD, refresh_tokens::generate_refresh_token,
};
use crate::database::dao::RefreshTokensDao;
use crate::database::{DatabaseError, DatabaseManager};
use chrono::{DateTime, Duration, Utc};
use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account is disabled")]
    AccountDisabled,
    #[error("Too many failed login attempts. Please try again later")]
    TooManyAttempts,
    #[error("Email is already registered")]
    DuplicateEmail,
    #[error("Username is already taken")]
    DuplicateUsername,
    #[error("Invalid or expired refresh token")]
    InvalidToken,
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Token signing error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("Password hashing error: {0}")]
    Hashing(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Engine policy, fixed at construction
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub max_failed_attempts: u64,
    pub lockout_window: Duration,
    pub refresh_token_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl AuthSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_failed_attempts: config.lockout.max_failed_attempts,
            lockout_window: Duration::seconds(config.lockout.window_seconds as i64),
            refresh_token_ttl: Duration::seconds(config.jwt.refresh_token_ttl as i64),
            bcrypt_cost: config.password.bcrypt_cost,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Input for [`AuthService::register`]
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Token pair handed out by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of the access token
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

pub struct AuthService {
    database: Arc<dyn DatabaseManager>,
    jwt_service: Arc<dyn JwtService>,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(
        database: Arc<dyn DatabaseManager>,
        jwt_service: Arc<dyn JwtService>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            database,
            jwt_service,
            settings,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Authenticate by email and password and issue a token pair.
    ///
    /// Wrong passwords are recorded in the attempt ledger. Once a user has
    /// `max_failed_attempts` failures inside the lockout window, even a correct
    /// password is refused until the window slides past them.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        context: &RequestContext,
    ) -> AuthResult<LoginResponse> {
        let Some(user) = self.database.users().find_by_email(email).await? else {
            debug!(ip = %context.ip_address, "Login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash).await? {
            self.database
                .login_attempts()
                .create(&NewLoginAttempt::failure(
                    user.id,
                    &context.ip_address,
                    &context.user_agent,
                    FAILURE_INCORRECT_PASSWORD,
                ))
                .await?;
            warn!(user_id = user.id, ip = %context.ip_address, "Login failed: incorrect password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_enabled {
            warn!(user_id = user.id, ip = %context.ip_address, "Login refused: account disabled");
            return Err(AuthError::AccountDisabled);
        }

        let now = Utc::now();
        let failed = self
            .database
            .login_attempts()
            .count_failed_since(user.id, now - self.settings.lockout_window)
            .await?;
        if failed >= self.settings.max_failed_attempts {
            warn!(
                user_id = user.id,
                failed_attempts = failed,
                ip = %context.ip_address,
                "Login refused: too many failed attempts"
            );
            return Err(AuthError::TooManyAttempts);
        }

        self.database
            .login_attempts()
            .create(&NewLoginAttempt::success(
                user.id,
                &context.ip_address,
                &context.user_agent,
            ))
            .await?;

        let user = self.database.users().update_last_login(user.id, now).await?;
        let response = self.issue_tokens(&user, &context.ip_address).await?;

        info!(user_id = user.id, ip = %context.ip_address, "User logged in");
        Ok(response)
    }

    /// Create an enabled account. Does not log the user in.
    pub async fn register(&self, registration: Registration) -> AuthResult<UserProfile> {
        let users = self.database.users();

        if users.email_exists(&registration.email).await? {
            return Err(AuthError::DuplicateEmail);
        }
        if users.username_exists(&registration.username).await? {
            return Err(AuthError::DuplicateUsername);
        }

        let password_hash = hash_password(&registration.password, self.settings.bcrypt_cost).await?;

        let user = users
            .create(&NewUser {
                username: registration.username,
                email: registration.email,
                password_hash,
                full_name: registration.full_name,
            })
            .await
            .map_err(map_registration_conflict)?;

        info!(user_id = user.id, "User registered");
        Ok(user.profile())
    }

    /// Rotate a refresh token: the presented token is revoked and a fresh
    /// pair is issued. Of two concurrent refreshes of the same token exactly
    /// one succeeds.
    pub async fn refresh_token(&self, token: &str, ip_address: &str) -> AuthResult<LoginResponse> {
        let refresh_tokens = self.database.refresh_tokens();

        let record = match refresh_tokens.find_by_token(token).await? {
            Some(record) if record.is_active() => record,
            _ => return Err(AuthError::InvalidToken),
        };

        let user = match self.database.users().find_by_id(record.user_id).await? {
            Some(user) if user.is_enabled => user,
            _ => {
                warn!(user_id = record.user_id, "Refresh for missing or disabled user");
                return Err(AuthError::InvalidToken);
            }
        };

        // Sign first so a signing failure leaves the presented token usable
        let now = Utc::now();
        let (claims, access_token) = self.sign_access_token(&user, now)?;
        let new_refresh_token = generate_refresh_token();

        // Revocation of the old token and insertion of the new one commit together
        let txn = self
            .database
            .connection()
            .begin()
            .await
            .map_err(DatabaseError::from_db_err)?;

        if !RefreshTokensDao::revoke_with(&txn, record.id, ip_address, now).await? {
            txn.rollback().await.map_err(DatabaseError::from_db_err)?;
            warn!(user_id = user.id, token_id = record.id, "Refresh token already rotated");
            return Err(AuthError::InvalidToken);
        }
        RefreshTokensDao::create_with(
            &txn,
            user.id,
            &new_refresh_token,
            now,
            now + self.settings.refresh_token_ttl,
            ip_address,
        )
        .await?;

        txn.commit().await.map_err(DatabaseError::from_db_err)?;

        debug!(user_id = user.id, ip = %ip_address, "Refresh token rotated");
        Ok(LoginResponse {
            access_token,
            refresh_token: new_refresh_token,
            expires_at: claims.expires_at(),
            user: user.profile(),
        })
    }

    /// Revoke a single refresh token. `false` when it was unknown, already
    /// revoked or expired.
    pub async fn revoke_token(&self, token: &str, ip_address: &str) -> AuthResult<bool> {
        let refresh_tokens = self.database.refresh_tokens();

        let record = match refresh_tokens.find_by_token(token).await? {
            Some(record) if record.is_active() => record,
            _ => return Ok(false),
        };

        let revoked = refresh_tokens.revoke(record.id, ip_address, Utc::now()).await?;
        if revoked {
            info!(user_id = record.user_id, token_id = record.id, "Refresh token revoked");
        }
        Ok(revoked)
    }

    /// Revoke every active refresh token of the user
    pub async fn logout(&self, user_id: i32, ip_address: &str) -> AuthResult<()> {
        let revoked = self
            .database
            .refresh_tokens()
            .revoke_all_active_for_user(user_id, ip_address)
            .await?;

        info!(user_id, revoked, "User logged out");
        Ok(())
    }

    fn sign_access_token(
        &self,
        user: &UserRecord,
        now: DateTime<Utc>,
    ) -> AuthResult<(AccessClaims, String)> {
        let claims = self.jwt_service.claims_for(user, now);
        let access_token = self.jwt_service.create_access_token(&claims)?;
        Ok((claims, access_token))
    }

    async fn issue_tokens(&self, user: &UserRecord, ip_address: &str) -> AuthResult<LoginResponse> {
        let now = Utc::now();

        let (claims, access_token) = self.sign_access_token(user, now)?;

        let refresh_token = generate_refresh_token();
        self.database
            .refresh_tokens()
            .create(
                user.id,
                &refresh_token,
                now,
                now + self.settings.refresh_token_ttl,
                ip_address,
            )
            .await?;

        Ok(LoginResponse {
            access_token,
            refresh_token,
            expires_at: claims.expires_at(),
            user: user.profile(),
        })
    }
}

/// A registration racing past the existence checks trips a unique index
fn map_registration_conflict(err: DatabaseError) -> AuthError {
    match err {
        DatabaseError::Constraint(ref msg) if msg.contains("email") => AuthError::DuplicateEmail,
        DatabaseError::Constraint(ref msg) if msg.contains("username") => {
            AuthError::DuplicateUsername
        }
        other => AuthError::Database(other),
    }
}
