use sea_orm::{
    ActiveValue, Condition, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
    sea_query::Expr,
};

use crate::{EngineError, ResultEngine, UserProfile, users};

use super::{Engine, normalize_optional_text, normalize_required_name, with_tx};

/// Maximum number of rows returned by a user search.
const SEARCH_LIMIT: u64 = 20;

impl Engine {
    /// Registers a new user.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        email: &str,
        avatar_url: Option<&str>,
    ) -> ResultEngine<UserProfile> {
        let username = normalize_required_name(username, "user")?;
        if password.is_empty() {
            return Err(EngineError::InvalidInput(
                "password must not be empty".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            let exists = users::Entity::find_by_id(username.clone())
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(username));
            }

            let model = users::ActiveModel {
                username: ActiveValue::Set(username),
                password: ActiveValue::Set(password.to_string()),
                email: ActiveValue::Set(email.trim().to_string()),
                avatar_url: ActiveValue::Set(normalize_optional_text(avatar_url)),
            };
            let inserted = model.insert(&db_tx).await?;
            Ok(UserProfile::from(inserted))
        })
    }

    /// Verifies a username/password pair.
    pub async fn authenticate(&self, username: &str, password: &str) -> ResultEngine<()> {
        let model = users::Entity::find_by_id(username.to_string())
            .one(&self.database)
            .await?;
        match model {
            Some(user) if user.password == password => Ok(()),
            _ => Err(EngineError::Forbidden("invalid credentials".to_string())),
        }
    }

    /// Updates the caller's profile fields. `None` leaves a field unchanged.
    pub async fn update_profile(
        &self,
        username: &str,
        email: Option<&str>,
        avatar_url: Option<&str>,
    ) -> ResultEngine<UserProfile> {
        with_tx!(self, |db_tx| {
            let model = users::Entity::find_by_id(username.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))?;

            let mut active: users::ActiveModel = model.into();
            if let Some(email) = email {
                active.email = ActiveValue::Set(email.trim().to_string());
            }
            if let Some(avatar_url) = avatar_url {
                active.avatar_url = ActiveValue::Set(normalize_optional_text(Some(avatar_url)));
            }
            let updated = active.update(&db_tx).await?;
            Ok(UserProfile::from(updated))
        })
    }

    /// Searches users by username or email substring, case-insensitive.
    ///
    /// Queries shorter than two characters return no results rather than an
    /// error, and the caller is never part of the result set.
    pub async fn search_users(&self, query: &str, user_id: &str) -> ResultEngine<Vec<UserProfile>> {
        let query = query.trim().to_lowercase();
        if query.chars().count() < 2 {
            return Ok(Vec::new());
        }

        let pattern = format!("%{query}%");
        let models: Vec<users::Model> = users::Entity::find()
            .filter(
                Condition::any()
                    .add(Expr::cust("LOWER(username)").like(pattern.clone()))
                    .add(Expr::cust("LOWER(email)").like(pattern)),
            )
            .filter(users::Column::Username.ne(user_id.to_string()))
            .order_by_asc(users::Column::Username)
            .limit(SEARCH_LIMIT)
            .all(&self.database)
            .await?;

        Ok(models.into_iter().map(UserProfile::from).collect())
    }
}
