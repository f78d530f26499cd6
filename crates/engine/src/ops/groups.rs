use sea_orm::{
    ActiveValue, JoinType, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
};

use crate::{
    EngineError, Group, GroupRole, ResultEngine, group_memberships, groups, groups::GroupMember,
};

use super::{Engine, normalize_optional_text, normalize_required_name, with_tx};

impl Engine {
    /// Creates a group and enrolls the creator as its first admin.
    pub async fn create_group(
        &self,
        name: &str,
        description: Option<&str>,
        user_id: &str,
    ) -> ResultEngine<Group> {
        let name = normalize_required_name(name, "group")?;
        let description = normalize_optional_text(description);

        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_id).await?;

            let group = Group::new(name, description, user_id);
            groups::ActiveModel::from(&group).insert(&db_tx).await?;

            let membership = group_memberships::ActiveModel {
                group_id: ActiveValue::Set(group.id.clone()),
                user_id: ActiveValue::Set(user_id.to_string()),
                role: ActiveValue::Set(GroupRole::Admin.as_str().to_string()),
            };
            membership.insert(&db_tx).await?;

            Ok(group)
        })
    }

    /// Renames a group and/or replaces its description. Admin only.
    pub async fn update_group(
        &self,
        group_id: &str,
        user_id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> ResultEngine<Group> {
        with_tx!(self, |db_tx| {
            let model = self.require_group_admin(&db_tx, group_id, user_id).await?;

            let mut active: groups::ActiveModel = model.into();
            if let Some(name) = name {
                active.name = ActiveValue::Set(normalize_required_name(name, "group")?);
            }
            if let Some(description) = description {
                active.description = ActiveValue::Set(normalize_optional_text(Some(description)));
            }
            let updated = active.update(&db_tx).await?;
            Group::try_from(updated)
        })
    }

    /// Deletes a group with all its expenses, splits, settlements and
    /// memberships. Admin only.
    pub async fn delete_group(&self, group_id: &str, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_group_admin(&db_tx, group_id, user_id).await?;
            let active: groups::ActiveModel = model.into();
            active.delete(&db_tx).await?;
            Ok(())
        })
    }

    /// Lists the groups the user belongs to, ordered by name.
    pub async fn list_groups(&self, user_id: &str) -> ResultEngine<Vec<Group>> {
        let models: Vec<groups::Model> = groups::Entity::find()
            .join(JoinType::InnerJoin, groups::Relation::GroupMemberships.def())
            .filter(group_memberships::Column::UserId.eq(user_id.to_string()))
            .order_by_asc(groups::Column::Name)
            .all(&self.database)
            .await?;

        models.into_iter().map(Group::try_from).collect()
    }

    /// Returns a group with its full member list. Members only.
    pub async fn group_detail(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> ResultEngine<(Group, Vec<GroupMember>)> {
        with_tx!(self, |db_tx| {
            let (model, _) = self.require_group_member(&db_tx, group_id, user_id).await?;
            let members = self.load_group_members(&db_tx, group_id).await?;
            Ok((Group::try_from(model)?, members))
        })
    }

    /// Adds a user to a group or changes their role. Admin only.
    ///
    /// Demoting the last admin is rejected: a group must always keep at
    /// least one admin.
    pub async fn upsert_member(
        &self,
        group_id: &str,
        user_id: &str,
        username: &str,
        role: GroupRole,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_group_admin(&db_tx, group_id, user_id).await?;
            self.require_user_exists(&db_tx, username).await?;

            let existing = group_memberships::Entity::find_by_id((
                group_id.to_string(),
                username.to_string(),
            ))
            .one(&db_tx)
            .await?;

            match existing {
                Some(model) => {
                    let was_admin = GroupRole::try_from(model.role.as_str())?.is_admin();
                    if was_admin
                        && !role.is_admin()
                        && self.admin_count(&db_tx, group_id).await? <= 1
                    {
                        return Err(EngineError::Forbidden(
                            "a group must keep at least one admin".to_string(),
                        ));
                    }
                    let mut active: group_memberships::ActiveModel = model.into();
                    active.role = ActiveValue::Set(role.as_str().to_string());
                    active.update(&db_tx).await?;
                }
                None => {
                    let membership = group_memberships::ActiveModel {
                        group_id: ActiveValue::Set(group_id.to_string()),
                        user_id: ActiveValue::Set(username.to_string()),
                        role: ActiveValue::Set(role.as_str().to_string()),
                    };
                    membership.insert(&db_tx).await?;
                }
            }
            Ok(())
        })
    }

    /// Removes a member from a group.
    ///
    /// Admins can remove anyone; a member can remove themself (leave). The
    /// last admin cannot be removed.
    pub async fn remove_member(
        &self,
        group_id: &str,
        user_id: &str,
        username: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let (_, role) = self.require_group_member(&db_tx, group_id, user_id).await?;
            if user_id != username && !role.is_admin() {
                return Err(EngineError::Forbidden("admin role required".to_string()));
            }

            let model = group_memberships::Entity::find_by_id((
                group_id.to_string(),
                username.to_string(),
            ))
            .one(&db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))?;

            if GroupRole::try_from(model.role.as_str())?.is_admin()
                && self.admin_count(&db_tx, group_id).await? <= 1
            {
                return Err(EngineError::Forbidden(
                    "a group must keep at least one admin".to_string(),
                ));
            }

            let active: group_memberships::ActiveModel = model.into();
            active.delete(&db_tx).await?;
            Ok(())
        })
    }

    async fn admin_count(
        &self,
        db: &sea_orm::DatabaseTransaction,
        group_id: &str,
    ) -> ResultEngine<u64> {
        group_memberships::Entity::find()
            .filter(group_memberships::Column::GroupId.eq(group_id.to_string()))
            .filter(group_memberships::Column::Role.eq(GroupRole::Admin.as_str()))
            .count(db)
            .await
            .map_err(Into::into)
    }
}
