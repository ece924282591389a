//! Persistence for the credential store, the login-attempt ledger and the
//! refresh token store.
//!
//! Each store has its own DAO; [`DatabaseManager`] hands them out over a
//! shared connection pool.

use std::time::Duration;

use crate::health::{HealthCheckResult, HealthChecker};
use async_trait::async_trait;
use sea_orm::{ConnectOptions, DatabaseConnection, DbErr, SqlErr};
use thiserror::Error;

pub mod config;
pub mod dao;
pub mod entities;
pub mod migration;

pub use config::DatabaseConfig;
pub use dao::{LoginAttemptsDao, RefreshTokensDao, UsersDao};

/// Database error types
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Record not found")]
    NotFound,
    #[error("Constraint violation: {0}")]
    Constraint(String),
    #[error("Migration error: {0}")]
    Migration(String),
}

impl DatabaseError {
    /// Map a driver error, keeping unique-index violations distinguishable
    pub fn from_db_err(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => DatabaseError::Constraint(msg),
            _ => DatabaseError::Database(err.to_string()),
        }
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Database manager trait for dependency injection and testing
#[async_trait]
pub trait DatabaseManager: Send + Sync {
    /// Run database migrations
    async fn migrate(&self) -> DatabaseResult<()>;

    /// Health check for database connection
    async fn health_check(&self) -> DatabaseResult<()>;

    /// Get users DAO
    fn users(&self) -> UsersDao;

    /// Get login attempts DAO
    fn login_attempts(&self) -> LoginAttemptsDao;

    /// Get refresh tokens DAO
    fn refresh_tokens(&self) -> RefreshTokensDao;

    /// Get direct database connection (for migrations and admin operations)
    fn connection(&self) -> &DatabaseConnection;
}

/// Database connection manager implementation
pub struct DatabaseManagerImpl {
    pub connection: DatabaseConnection,
}

impl DatabaseManagerImpl {
    /// Create database manager from configuration
    pub async fn new_from_config(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let mut options = ConnectOptions::new(config.url.clone());
        options
            .max_connections(config.max_connections)
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        let connection = sea_orm::Database::connect(options)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl DatabaseManager for DatabaseManagerImpl {
    async fn migrate(&self) -> DatabaseResult<()> {
        use crate::database::migration::Migrator;
        use sea_orm_migration::MigratorTrait;

        tracing::info!("Running database migrations");

        Migrator::up(&self.connection, None)
            .await
            .map_err(|e| DatabaseError::Migration(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("Successfully completed all migrations");
        Ok(())
    }

    async fn health_check(&self) -> DatabaseResult<()> {
        self.connection
            .ping()
            .await
            .map_err(|e| DatabaseError::Database(format!("db error: {}", e)))
    }

    fn users(&self) -> UsersDao {
        UsersDao::new(self.connection.clone())
    }

    fn login_attempts(&self) -> LoginAttemptsDao {
        LoginAttemptsDao::new(self.connection.clone())
    }

    fn refresh_tokens(&self) -> RefreshTokensDao {
        RefreshTokensDao::new(self.connection.clone())
    }

    fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

#[async_trait]
impl HealthChecker for DatabaseManagerImpl {
    fn name(&self) -> &str {
        "database"
    }

    async fn check(&self) -> HealthCheckResult {
        match self.health_check().await {
            Ok(_) => HealthCheckResult::healthy_with_details(serde_json::json!({
                "connection": "ok"
            })),
            Err(err) => HealthCheckResult::unhealthy_with_details(
                "DB health check failed".to_string(),
                serde_json::json!({ "error": err.to_string() }),
            ),
        }
    }
}

/// Fresh, migrated in-memory database. A single pooled connection keeps every
/// query on the same SQLite memory instance.
#[cfg(test)]
pub(crate) async fn test_database() -> std::sync::Arc<dyn DatabaseManager> {
    std::sync::Arc::new(crate::test_utils::memory_database().await)
}
