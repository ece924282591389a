use sea_orm_migration::prelude::*;

pub use sea_orm_migration::MigratorTrait;

mod m20250101_000001_create_users_table;
mod m20250101_000002_create_login_attempts_table;
mod m20250101_000003_create_refresh_tokens_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users_table::Migration),
            Box::new(m20250101_000002_create_login_attempts_table::Migration),
            Box::new(m20250101_000003_create_refresh_tokens_table::Migration),
        ]
    }
}

/// Common table and column identifiers
#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    Username,
    Email,
    PasswordHash,
    FullName,
    IsEnabled,
    CreatedAt,
    LastLoginAt,
}

#[derive(Iden)]
pub enum LoginAttempts {
    Table,
    Id,
    UserId,
    IsSuccessful,
    IpAddress,
    UserAgent,
    AttemptedAt,
    FailureReason,
}

#[derive(Iden)]
pub enum RefreshTokens {
    Table,
    Id,
    UserId,
    TokenHash,
    ExpiresAt,
    CreatedAt,
    CreatedByIp,
    RevokedAt,
    RevokedByIp,
    IsRevoked,
}
