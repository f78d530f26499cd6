use std::collections::HashMap;

use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};

use crate::{
    EngineError, GroupRole, ResultEngine, group_memberships, groups, groups::GroupMember, users,
};

use super::Engine;

impl Engine {
    pub(super) async fn find_group_by_id(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
    ) -> ResultEngine<Option<groups::Model>> {
        groups::Entity::find_by_id(group_id.to_string())
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn group_role(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        user_id: &str,
    ) -> ResultEngine<Option<GroupRole>> {
        let row =
            group_memberships::Entity::find_by_id((group_id.to_string(), user_id.to_string()))
                .one(db)
                .await?;
        row.as_ref()
            .map(|m| GroupRole::try_from(m.role.as_str()))
            .transpose()
    }

    /// Requires the caller to belong to the group.
    ///
    /// A group the caller cannot see is reported as missing, not as
    /// forbidden, so membership cannot be probed by id.
    pub(super) async fn require_group_member(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        user_id: &str,
    ) -> ResultEngine<(groups::Model, GroupRole)> {
        let model = self
            .find_group_by_id(db, group_id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("group not exists".to_string()))?;
        let role = self
            .group_role(db, group_id, user_id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("group not exists".to_string()))?;
        Ok((model, role))
    }

    pub(super) async fn require_group_admin(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        user_id: &str,
    ) -> ResultEngine<groups::Model> {
        let (model, role) = self.require_group_member(db, group_id, user_id).await?;
        if !role.is_admin() {
            return Err(EngineError::Forbidden(
                "admin role required".to_string(),
            ));
        }
        Ok(model)
    }

    pub(super) async fn require_user_exists(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultEngine<()> {
        let exists = users::Entity::find_by_id(username.to_string())
            .one(db)
            .await?
            .is_some();
        if !exists {
            return Err(EngineError::KeyNotFound("user not exists".to_string()));
        }
        Ok(())
    }

    /// Loads the full member list of a group with profile fields, ordered
    /// by username.
    pub(super) async fn load_group_members(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
    ) -> ResultEngine<Vec<GroupMember>> {
        let membership_models: Vec<group_memberships::Model> = group_memberships::Entity::find()
            .filter(group_memberships::Column::GroupId.eq(group_id.to_string()))
            .order_by_asc(group_memberships::Column::UserId)
            .all(db)
            .await?;

        let usernames: Vec<String> = membership_models
            .iter()
            .map(|m| m.user_id.clone())
            .collect();
        let user_models: Vec<users::Model> = users::Entity::find()
            .filter(users::Column::Username.is_in(usernames))
            .all(db)
            .await?;
        let mut profiles: HashMap<String, users::Model> = user_models
            .into_iter()
            .map(|m| (m.username.clone(), m))
            .collect();

        let mut members = Vec::with_capacity(membership_models.len());
        for membership in membership_models {
            let role = GroupRole::try_from(membership.role.as_str())?;
            // A membership without a users row means referential breakage.
            let profile = profiles.remove(&membership.user_id).ok_or_else(|| {
                EngineError::InvalidReference(format!(
                    "membership references unknown user {}",
                    membership.user_id
                ))
            })?;
            members.push(GroupMember {
                username: profile.username,
                email: profile.email,
                avatar_url: profile.avatar_url,
                role,
            });
        }
        Ok(members)
    }
}
