use chrono::{DateTime, Utc};
use uuid::Uuid;

use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};

use crate::{Currency, EngineError, MoneyCents, ResultEngine, Settlement, settlements};

use super::{Engine, expenses::EventCursor, normalize_optional_text, with_tx};

impl Engine {
    /// Records a direct repayment between two members.
    ///
    /// Both parties must be members of the group; the amount must be
    /// positive and payer and receiver must differ (validated by
    /// [`Settlement::new`]).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_settlement(
        &self,
        group_id: &str,
        user_id: &str,
        paid_by: &str,
        received_by: &str,
        amount: MoneyCents,
        note: Option<&str>,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Settlement> {
        with_tx!(self, |db_tx| {
            let (group_model, _) = self.require_group_member(&db_tx, group_id, user_id).await?;
            let currency = Currency::try_from(group_model.currency.as_str())?;

            self.require_member_referenced(&db_tx, group_id, paid_by)
                .await?;
            self.require_member_referenced(&db_tx, group_id, received_by)
                .await?;

            let settlement = Settlement::new(
                group_id.to_string(),
                paid_by.to_string(),
                received_by.to_string(),
                amount,
                currency,
                normalize_optional_text(note),
                user_id.to_string(),
                occurred_at,
            )?;

            settlements::ActiveModel::from(&settlement)
                .insert(&db_tx)
                .await?;

            Ok(settlement)
        })
    }

    /// Deletes a settlement. Allowed for the member who recorded it, the
    /// payer, or a group admin.
    pub async fn delete_settlement(
        &self,
        group_id: &str,
        settlement_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let (_, role) = self.require_group_member(&db_tx, group_id, user_id).await?;

            let model = self
                .require_settlement_in_group(&db_tx, group_id, settlement_id)
                .await?;
            if model.created_by != user_id && model.paid_by != user_id && !role.is_admin() {
                return Err(EngineError::Forbidden(
                    "only the author, the payer or an admin can delete a settlement".to_string(),
                ));
            }

            let active: settlements::ActiveModel = model.into();
            active.delete(&db_tx).await?;
            Ok(())
        })
    }

    /// Lists a group's settlements, with cursor-based pagination.
    ///
    /// Pagination is newest → older by `(occurred_at DESC, id DESC)`.
    pub async fn list_settlements_page(
        &self,
        group_id: &str,
        user_id: &str,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<(Vec<Settlement>, Option<String>)> {
        with_tx!(self, |db_tx| {
            self.require_group_member(&db_tx, group_id, user_id).await?;

            let limit_plus_one = limit.saturating_add(1);
            let mut query = settlements::Entity::find()
                .filter(settlements::Column::GroupId.eq(group_id.to_string()))
                .order_by_desc(settlements::Column::OccurredAt)
                .order_by_desc(settlements::Column::Id)
                .limit(limit_plus_one);

            if let Some(cursor) = cursor {
                let cursor = EventCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(settlements::Column::OccurredAt.lt(cursor.occurred_at))
                        .add(
                            Condition::all()
                                .add(settlements::Column::OccurredAt.eq(cursor.occurred_at))
                                .add(settlements::Column::Id.lt(cursor.id)),
                        ),
                );
            }

            let rows: Vec<settlements::Model> = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;

            let mut out: Vec<Settlement> = Vec::with_capacity(rows.len().min(limit as usize));
            for model in rows.into_iter().take(limit as usize) {
                out.push(Settlement::try_from(model)?);
            }

            let next_cursor = out.last().map(|settlement| EventCursor {
                occurred_at: settlement.occurred_at,
                id: settlement.id.to_string(),
            });
            let next_cursor = if has_more {
                next_cursor.map(|c| c.encode()).transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }

    async fn require_settlement_in_group(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        settlement_id: Uuid,
    ) -> ResultEngine<settlements::Model> {
        settlements::Entity::find_by_id(settlement_id.to_string())
            .filter(settlements::Column::GroupId.eq(group_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("settlement not exists".to_string()))
    }
}
