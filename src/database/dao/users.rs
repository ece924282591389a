use crate::database::entities::{NewUser, UserRecord, users};
use crate::database::{DatabaseError, DatabaseResult};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set, sea_query::Expr,
};

/// Users DAO: the credential store
#[derive(Clone)]
pub struct UsersDao {
    db: DatabaseConnection,
}

impl UsersDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a new enabled user. A unique-index violation surfaces as
    /// [`DatabaseError::Constraint`] naming the offending column.
    pub async fn create(&self, user: &NewUser) -> DatabaseResult<UserRecord> {
        let active_model = users::ActiveModel {
            id: ActiveValue::NotSet,
            username: Set(user.username.clone()),
            email: Set(user.email.clone()),
            password_hash: Set(user.password_hash.clone()),
            full_name: Set(user.full_name.clone()),
            is_enabled: Set(true),
            created_at: Set(Utc::now()),
            last_login_at: Set(None),
        };

        active_model
            .insert(&self.db)
            .await
            .map_err(DatabaseError::from_db_err)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, user_id: i32) -> DatabaseResult<Option<UserRecord>> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(user)
    }

    /// Find user by email (exact, case-sensitive match)
    pub async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<UserRecord>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(user)
    }

    pub async fn email_exists(&self, email: &str) -> DatabaseResult<bool> {
        let count = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .count(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    pub async fn username_exists(&self, username: &str) -> DatabaseResult<bool> {
        let count = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .count(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    /// Move `last_login_at` forward to `at`. Older timestamps never overwrite
    /// newer ones.
    pub async fn update_last_login(
        &self,
        user_id: i32,
        at: DateTime<Utc>,
    ) -> DatabaseResult<UserRecord> {
        users::Entity::update_many()
            .col_expr(users::Column::LastLoginAt, Expr::value(at))
            .filter(users::Column::Id.eq(user_id))
            .filter(
                Condition::any()
                    .add(users::Column::LastLoginAt.is_null())
                    .add(users::Column::LastLoginAt.lt(at)),
            )
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        self.find_by_id(user_id)
            .await?
            .ok_or(DatabaseError::NotFound)
    }

    /// Enable or disable an account
    pub async fn set_enabled(&self, user_id: i32, enabled: bool) -> DatabaseResult<UserRecord> {
        let active_model = users::ActiveModel {
            id: Set(user_id),
            is_enabled: Set(enabled),
            ..Default::default()
        };

        active_model.update(&self.db).await.map_err(|e| match e {
            sea_orm::DbErr::RecordNotUpdated => DatabaseError::NotFound,
            other => DatabaseError::Database(other.to_string()),
        })
    }
}
