use crate::{
    auth::{
        Registration,
        jwt::{AccessClaims, JwtService},
    },
    config::Config,
    database::{
        DatabaseConfig, DatabaseManager, DatabaseManagerImpl,
        entities::{UserProfile, UserRecord},
    },
    server::Server,
};
use chrono::{Duration, Utc};
use std::sync::Arc;

pub const TEST_JWT_SECRET: &str = "test-secret";
pub const TEST_PASSWORD: &str = "correct-horse";

/// A migrated in-memory SQLite database.
///
/// Each SQLite in-memory connection is its own database, so the pool is pinned to one connection.
pub async fn memory_database() -> DatabaseManagerImpl {
    let db = DatabaseManagerImpl::new_from_config(&memory_database_config())
        .await
        .unwrap();
    db.migrate().await.unwrap();
    db
}

fn memory_database_config() -> DatabaseConfig {
    DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        migration_on_startup: true,
    }
}

/// Test server builder backed by in-memory SQLite and a fixed JWT secret
pub struct TestServerBuilder {
    config: Config,
    jwt_secret: Option<String>,
}

impl TestServerBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            jwt_secret: Some(TEST_JWT_SECRET.to_string()),
        }
    }

    /// Set a custom JWT secret for testing
    pub fn with_jwt_secret(mut self, secret: String) -> Self {
        self.jwt_secret = Some(secret);
        self
    }

    /// Set a custom configuration. Its JWT secret is kept when no explicit one is given.
    pub fn with_config(mut self, config: Config) -> Self {
        if !config.jwt.secret.is_empty() {
            self.jwt_secret = None;
        }
        self.config = config;
        self
    }

    pub async fn build(self) -> Server {
        let mut config = self.config;

        config.database = memory_database_config();
        if let Some(secret) = self.jwt_secret {
            config.jwt.secret = secret;
        }
        // Minimum bcrypt cost keeps password hashing fast
        config.password.bcrypt_cost = 4;

        let server = Server::new(config).await.unwrap();
        server.database.migrate().await.unwrap();
        server
    }
}

impl Default for TestServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Register a user through the auth service with [`TEST_PASSWORD`]
pub async fn register_test_user(server: &Server, username: &str, email: &str) -> UserProfile {
    server
        .auth_service
        .register(Registration {
            username: username.to_string(),
            email: email.to_string(),
            password: TEST_PASSWORD.to_string(),
            full_name: format!("{username} Test"),
        })
        .await
        .unwrap()
}

/// Look up a user record by id
pub async fn find_user(database: &Arc<dyn DatabaseManager>, user_id: i32) -> UserRecord {
    database
        .users()
        .find_by_id(user_id)
        .await
        .unwrap()
        .unwrap()
}

/// Access token for the given user, valid from now
pub fn create_test_jwt(jwt_service: &Arc<dyn JwtService>, user: &UserRecord) -> String {
    let claims = jwt_service.claims_for(user, Utc::now());
    jwt_service.create_access_token(&claims).unwrap()
}

/// Access token for the given user issued two days ago, past the default TTL
pub fn create_expired_jwt(jwt_service: &Arc<dyn JwtService>, user: &UserRecord) -> String {
    let issued = Utc::now() - Duration::days(2);
    let claims: AccessClaims = jwt_service.claims_for(user, issued);
    jwt_service.create_access_token(&claims).unwrap()
}
