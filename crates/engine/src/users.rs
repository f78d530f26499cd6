//! Users table (minimal entity).
//!
//! The engine stores memberships by `user_id`, which is the username.
//! Profile fields (`email`, `avatar_url`) are passed through opaquely in
//! balance responses.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Public profile of a user, without credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub username: String,
    pub password: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for UserProfile {
    fn from(model: Model) -> Self {
        Self {
            username: model.username,
            email: model.email,
            avatar_url: model.avatar_url,
        }
    }
}
