use crate::database::entities::{LoginAttemptRecord, NewLoginAttempt, login_attempts};
use crate::database::{DatabaseError, DatabaseResult};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

/// Login attempts DAO: the append-only attempt ledger
#[derive(Clone)]
pub struct LoginAttemptsDao {
    db: DatabaseConnection,
}

impl LoginAttemptsDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Append an attempt stamped with the current time
    pub async fn create(&self, attempt: &NewLoginAttempt) -> DatabaseResult<LoginAttemptRecord> {
        let active_model = login_attempts::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: Set(attempt.user_id),
            is_successful: Set(attempt.is_successful),
            ip_address: Set(attempt.ip_address.clone()),
            user_agent: Set(attempt.user_agent.clone()),
            attempted_at: Set(Utc::now()),
            failure_reason: Set(attempt.failure_reason.clone()),
        };

        active_model
            .insert(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    /// Count failed attempts for a user at or after `since`
    pub async fn count_failed_since(
        &self,
        user_id: i32,
        since: DateTime<Utc>,
    ) -> DatabaseResult<u64> {
        let count = login_attempts::Entity::find()
            .filter(login_attempts::Column::UserId.eq(user_id))
            .filter(login_attempts::Column::IsSuccessful.eq(false))
            .filter(login_attempts::Column::AttemptedAt.gte(since))
            .count(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Most recent attempts for a user, newest first
    pub async fn find_by_user(
        &self,
        user_id: i32,
        limit: u64,
    ) -> DatabaseResult<Vec<LoginAttemptRecord>> {
        let attempts = login_attempts::Entity::find()
            .filter(login_attempts::Column::UserId.eq(user_id))
            .order_by_desc(login_attempts::Column::AttemptedAt)
            .order_by_desc(login_attempts::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(attempts)
    }
}
