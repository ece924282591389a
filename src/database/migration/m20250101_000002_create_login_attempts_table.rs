use super::{LoginAttempts, Users};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LoginAttempts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LoginAttempts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LoginAttempts::UserId).integer().not_null())
                    .col(
                        ColumnDef::new(LoginAttempts::IsSuccessful)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LoginAttempts::IpAddress)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LoginAttempts::UserAgent)
                            .string_len(500)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LoginAttempts::AttemptedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LoginAttempts::FailureReason)
                            .string_len(200)
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_login_attempts_user_id")
                            .from(LoginAttempts::Table, LoginAttempts::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Lockout window lookups
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_login_attempts_user_attempted_at")
                    .table(LoginAttempts::Table)
                    .col(LoginAttempts::UserId)
                    .col(LoginAttempts::AttemptedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LoginAttempts::Table).to_owned())
            .await
    }
}
