use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Failure reason stored when the password does not match
pub const FAILURE_INCORRECT_PASSWORD: &str = "incorrect password";

/// Append-only audit record of a single authentication attempt
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "login_attempts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub is_successful: bool,
    pub ip_address: String,
    pub user_agent: String,
    pub attempted_at: DateTime<Utc>,
    pub failure_reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone)]
pub struct NewLoginAttempt {
    pub user_id: i32,
    pub is_successful: bool,
    pub ip_address: String,
    pub user_agent: String,
    pub failure_reason: Option<String>,
}

impl NewLoginAttempt {
    pub fn success(user_id: i32, ip_address: &str, user_agent: &str) -> Self {
        Self {
            user_id,
            is_successful: true,
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
            failure_reason: None,
        }
    }

    pub fn failure(user_id: i32, ip_address: &str, user_agent: &str, reason: &str) -> Self {
        Self {
            user_id,
            is_successful: false,
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
            failure_reason: Some(reason.to_string()),
        }
    }
}
