use crate::database::entities::{
    RefreshTokenRecord,
    refresh_tokens::{self, hash_refresh_token},
};
use crate::database::{DatabaseError, DatabaseResult};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, sea_query::Expr,
};

/// Refresh tokens DAO for database operations
#[derive(Clone)]
pub struct RefreshTokensDao {
    db: DatabaseConnection,
}

impl RefreshTokensDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Persist a freshly issued token. `token` is the opaque value handed to
    /// the client; only its digest is written.
    pub async fn create(
        &self,
        user_id: i32,
        token: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        created_by_ip: &str,
    ) -> DatabaseResult<RefreshTokenRecord> {
        Self::create_with(&self.db, user_id, token, created_at, expires_at, created_by_ip).await
    }

    /// [`Self::create`] on an explicit connection or transaction
    pub async fn create_with<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
        token: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        created_by_ip: &str,
    ) -> DatabaseResult<RefreshTokenRecord> {
        let active_model = refresh_tokens::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: Set(user_id),
            token_hash: Set(hash_refresh_token(token)),
            expires_at: Set(expires_at),
            created_at: Set(created_at),
            created_by_ip: Set(created_by_ip.to_string()),
            revoked_at: Set(None),
            revoked_by_ip: Set(None),
            is_revoked: Set(false),
        };

        active_model
            .insert(conn)
            .await
            .map_err(DatabaseError::from_db_err)
    }

    /// Look up a token by its opaque value
    pub async fn find_by_token(&self, token: &str) -> DatabaseResult<Option<RefreshTokenRecord>> {
        let record = refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::TokenHash.eq(hash_refresh_token(token)))
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(record)
    }

    /// Revoke a single token if, and only if, it is still active at `at`.
    ///
    /// Returns `false` when another caller revoked it first or it expired,
    /// which makes rotation safe under concurrent refreshes.
    pub async fn revoke(
        &self,
        token_id: i32,
        revoked_by_ip: &str,
        at: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        Self::revoke_with(&self.db, token_id, revoked_by_ip, at).await
    }

    /// [`Self::revoke`] on an explicit connection or transaction
    pub async fn revoke_with<C: ConnectionTrait>(
        conn: &C,
        token_id: i32,
        revoked_by_ip: &str,
        at: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        let result = refresh_tokens::Entity::update_many()
            .col_expr(refresh_tokens::Column::IsRevoked, Expr::value(true))
            .col_expr(refresh_tokens::Column::RevokedAt, Expr::value(at))
            .col_expr(
                refresh_tokens::Column::RevokedByIp,
                Expr::value(revoked_by_ip.to_string()),
            )
            .filter(refresh_tokens::Column::Id.eq(token_id))
            .filter(refresh_tokens::Column::IsRevoked.eq(false))
            .filter(refresh_tokens::Column::ExpiresAt.gt(at))
            .exec(conn)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }

    /// Revoke every active token of a user with one shared timestamp
    pub async fn revoke_all_active_for_user(
        &self,
        user_id: i32,
        revoked_by_ip: &str,
    ) -> DatabaseResult<u64> {
        let now = Utc::now();
        let result = refresh_tokens::Entity::update_many()
            .col_expr(refresh_tokens::Column::IsRevoked, Expr::value(true))
            .col_expr(refresh_tokens::Column::RevokedAt, Expr::value(now))
            .col_expr(
                refresh_tokens::Column::RevokedByIp,
                Expr::value(revoked_by_ip.to_string()),
            )
            .filter(refresh_tokens::Column::UserId.eq(user_id))
            .filter(refresh_tokens::Column::IsRevoked.eq(false))
            .filter(refresh_tokens::Column::ExpiresAt.gt(now))
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Active tokens of a user, newest first
    pub async fn find_active_by_user(
        &self,
        user_id: i32,
    ) -> DatabaseResult<Vec<RefreshTokenRecord>> {
        let tokens = refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::UserId.eq(user_id))
            .filter(refresh_tokens::Column::IsRevoked.eq(false))
            .filter(refresh_tokens::Column::ExpiresAt.gt(Utc::now()))
            .order_by_desc(refresh_tokens::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities::{NewUser, refresh_tokens::generate_refresh_token};
    use crate::database::{DatabaseManager, test_database};
    use chrono::Duration;

    async fn create_user(db: &dyn DatabaseManager, name: &str) -> i32 {
        db.users()
            .create(&NewUser {
                username: name.to_string(),
                email: format!("{name}@example.com"),
                password_hash: "hash".to_string(),
                full_name: name.to_string(),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_create_and_find_by_token() {
        let db = test_database().await;
        let user_id = create_user(db.as_ref(), "ana").await;
        let dao = db.refresh_tokens();

        let token = generate_refresh_token();
        let now = Utc::now();
        let created = dao
            .create(user_id, &token, now, now + Duration::days(7), "10.0.0.1")
            .await
            .unwrap();
        assert_ne!(created.token_hash, token);

        let found = dao.find_by_token(&token).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(found.is_active());
        assert_eq!(found.created_by_ip, "10.0.0.1");

        assert!(dao.find_by_token("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_is_conditional() {
        let db = test_database().await;
        let user_id = create_user(db.as_ref(), "ana").await;
        let dao = db.refresh_tokens();

        let token = generate_refresh_token();
        let now = Utc::now();
        let record = dao
            .create(user_id, &token, now, now + Duration::days(7), "10.0.0.1")
            .await
            .unwrap();

        assert!(dao.revoke(record.id, "10.0.0.2", Utc::now()).await.unwrap());
        // Second revoke loses: the token is no longer active
        assert!(!dao.revoke(record.id, "10.0.0.3", Utc::now()).await.unwrap());

        let revoked = dao.find_by_token(&token).await.unwrap().unwrap();
        assert!(revoked.is_revoked);
        assert!(revoked.revoked_at.is_some());
        assert_eq!(revoked.revoked_by_ip.as_deref(), Some("10.0.0.2"));
    }

    #[tokio::test]
    async fn test_revoke_in_rolled_back_transaction_is_undone() {
        use sea_orm::TransactionTrait;

        let db = test_database().await;
        let user_id = create_user(db.as_ref(), "ana").await;
        let dao = db.refresh_tokens();

        let token = generate_refresh_token();
        let now = Utc::now();
        let record = dao
            .create(user_id, &token, now, now + Duration::days(7), "10.0.0.1")
            .await
            .unwrap();

        let txn = db.connection().begin().await.unwrap();
        assert!(
            RefreshTokensDao::revoke_with(&txn, record.id, "10.0.0.2", Utc::now())
                .await
                .unwrap()
        );
        let replacement = generate_refresh_token();
        RefreshTokensDao::create_with(&txn, user_id, &replacement, now, now + Duration::days(7), "10.0.0.2")
            .await
            .unwrap();
        txn.rollback().await.unwrap();

        let stored = dao.find_by_token(&token).await.unwrap().unwrap();
        assert!(stored.is_active());
        assert!(dao.find_by_token(&replacement).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_skips_expired() {
        let db = test_database().await;
        let user_id = create_user(db.as_ref(), "ana").await;
        let dao = db.refresh_tokens();

        let token = generate_refresh_token();
        let created_at = Utc::now() - Duration::days(8);
        let record = dao
            .create(user_id, &token, created_at, created_at + Duration::days(7), "10.0.0.1")
            .await
            .unwrap();

        assert!(!dao.revoke(record.id, "10.0.0.2", Utc::now()).await.unwrap());
        let stored = dao.find_by_token(&token).await.unwrap().unwrap();
        assert!(!stored.is_revoked);
    }

    #[tokio::test]
    async fn test_revoke_all_active_for_user() {
        let db = test_database().await;
        let ana = create_user(db.as_ref(), "ana").await;
        let bob = create_user(db.as_ref(), "bob").await;
        let dao = db.refresh_tokens();

        let now = Utc::now();
        for _ in 0..3 {
            dao.create(ana, &generate_refresh_token(), now, now + Duration::days(7), "1.1.1.1")
                .await
                .unwrap();
        }
        dao.create(bob, &generate_refresh_token(), now, now + Duration::days(7), "2.2.2.2")
            .await
            .unwrap();

        assert_eq!(dao.find_active_by_user(ana).await.unwrap().len(), 3);
        assert_eq!(dao.revoke_all_active_for_user(ana, "1.1.1.1").await.unwrap(), 3);
        assert!(dao.find_active_by_user(ana).await.unwrap().is_empty());
        assert_eq!(dao.find_active_by_user(bob).await.unwrap().len(), 1);

        // Idempotent
        assert_eq!(dao.revoke_all_active_for_user(ana, "1.1.1.1").await.unwrap(), 0);
    }
}
