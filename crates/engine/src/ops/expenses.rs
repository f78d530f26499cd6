use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::{
    ActiveValue, Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*,
};

use crate::{Currency, EngineError, Expense, MoneyCents, ResultEngine, Split, expenses, splits};

use super::{Engine, normalize_optional_text, with_tx};

/// Filters for listing expenses.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
#[derive(Clone, Debug, Default)]
pub struct ExpenseListFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// If present, only expenses paid by this user.
    pub paid_by: Option<String>,
}

fn validate_list_filter(filter: &ExpenseListFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(EngineError::InvalidAmount(
            "invalid range: from must be < to".to_string(),
        ));
    }
    Ok(())
}

/// Opaque pagination cursor for group event lists, newest to older by
/// `(occurred_at DESC, id DESC)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(super) struct EventCursor {
    pub(super) occurred_at: DateTime<Utc>,
    pub(super) id: String,
}

impl EventCursor {
    pub(super) fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidCursor("invalid list cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    pub(super) fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid list cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid list cursor".to_string()))
    }
}

impl Engine {
    /// Records a new expense with its splits.
    ///
    /// The payer and every split user must be members of the group; amounts
    /// are validated by [`Expense::new`] (positive total, splits summing to
    /// it).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_expense(
        &self,
        group_id: &str,
        user_id: &str,
        description: Option<&str>,
        amount: MoneyCents,
        paid_by: &str,
        occurred_at: DateTime<Utc>,
        splits: Vec<Split>,
    ) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            let (group_model, _) = self.require_group_member(&db_tx, group_id, user_id).await?;
            let currency = Currency::try_from(group_model.currency.as_str())?;

            self.require_member_referenced(&db_tx, group_id, paid_by)
                .await?;
            for split in &splits {
                self.require_member_referenced(&db_tx, group_id, &split.user_id)
                    .await?;
            }

            let expense = Expense::new(
                group_id.to_string(),
                normalize_optional_text(description),
                amount,
                currency,
                paid_by.to_string(),
                user_id.to_string(),
                occurred_at,
                splits,
            )?;

            expenses::ActiveModel::from(&expense).insert(&db_tx).await?;
            for split in expense.splits.clone() {
                split.into_active_model(expense.id).insert(&db_tx).await?;
            }

            Ok(expense)
        })
    }

    /// Deletes an expense with its splits.
    ///
    /// Allowed for the member who recorded it, the payer, or a group admin.
    pub async fn delete_expense(
        &self,
        group_id: &str,
        expense_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let (_, role) = self.require_group_member(&db_tx, group_id, user_id).await?;

            let model = self
                .require_expense_in_group(&db_tx, group_id, expense_id)
                .await?;
            if model.created_by != user_id && model.paid_by != user_id && !role.is_admin() {
                return Err(EngineError::Forbidden(
                    "only the author, the payer or an admin can delete an expense".to_string(),
                ));
            }

            let active: expenses::ActiveModel = model.into();
            active.delete(&db_tx).await?;
            Ok(())
        })
    }

    /// Marks one split of an expense as paid (or unpaid) outside the
    /// ledger. Allowed for the payer or a group admin.
    pub async fn set_split_paid(
        &self,
        group_id: &str,
        expense_id: Uuid,
        split_user: &str,
        paid: bool,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let (_, role) = self.require_group_member(&db_tx, group_id, user_id).await?;

            let expense_model = self
                .require_expense_in_group(&db_tx, group_id, expense_id)
                .await?;
            if expense_model.paid_by != user_id && !role.is_admin() {
                return Err(EngineError::Forbidden(
                    "only the payer or an admin can settle a split".to_string(),
                ));
            }

            let split_model = splits::Entity::find()
                .filter(splits::Column::ExpenseId.eq(expense_id.to_string()))
                .filter(splits::Column::UserId.eq(split_user.to_string()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("split not exists".to_string()))?;

            let mut active: splits::ActiveModel = split_model.into();
            active.paid = ActiveValue::Set(paid);
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Lists a group's expenses with their splits, with cursor-based
    /// pagination.
    ///
    /// Pagination is newest → older by `(occurred_at DESC, id DESC)`.
    pub async fn list_expenses_page(
        &self,
        group_id: &str,
        user_id: &str,
        limit: u64,
        cursor: Option<&str>,
        filter: &ExpenseListFilter,
    ) -> ResultEngine<(Vec<Expense>, Option<String>)> {
        with_tx!(self, |db_tx| {
            self.require_group_member(&db_tx, group_id, user_id).await?;
            validate_list_filter(filter)?;

            let limit_plus_one = limit.saturating_add(1);
            let mut query = expenses::Entity::find()
                .filter(expenses::Column::GroupId.eq(group_id.to_string()))
                .order_by_desc(expenses::Column::OccurredAt)
                .order_by_desc(expenses::Column::Id)
                .limit(limit_plus_one);

            if let Some(cursor) = cursor {
                let cursor = EventCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(expenses::Column::OccurredAt.lt(cursor.occurred_at))
                        .add(
                            Condition::all()
                                .add(expenses::Column::OccurredAt.eq(cursor.occurred_at))
                                .add(expenses::Column::Id.lt(cursor.id)),
                        ),
                );
            }
            if let Some(from) = filter.from {
                query = query.filter(expenses::Column::OccurredAt.gte(from));
            }
            if let Some(to) = filter.to {
                query = query.filter(expenses::Column::OccurredAt.lt(to));
            }
            if let Some(paid_by) = &filter.paid_by {
                query = query.filter(expenses::Column::PaidBy.eq(paid_by.clone()));
            }

            let rows: Vec<expenses::Model> = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;

            let mut out: Vec<Expense> = Vec::with_capacity(rows.len().min(limit as usize));
            for model in rows.into_iter().take(limit as usize) {
                out.push(self.expense_with_splits(&db_tx, model).await?);
            }

            let next_cursor = out.last().map(|expense| EventCursor {
                occurred_at: expense.occurred_at,
                id: expense.id.to_string(),
            });
            let next_cursor = if has_more {
                next_cursor.map(|c| c.encode()).transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }

    /// Checks that a referenced user is a member of the group. Unlike
    /// access checks this reports [`EngineError::InvalidReference`]: the
    /// caller is already authorized, the payload is what is wrong.
    pub(super) async fn require_member_referenced(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        username: &str,
    ) -> ResultEngine<()> {
        if self.group_role(db, group_id, username).await?.is_none() {
            return Err(EngineError::InvalidReference(format!(
                "{username} is not a member of the group"
            )));
        }
        Ok(())
    }

    pub(super) async fn require_expense_in_group(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        expense_id: Uuid,
    ) -> ResultEngine<expenses::Model> {
        expenses::Entity::find_by_id(expense_id.to_string())
            .filter(expenses::Column::GroupId.eq(group_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))
    }

    pub(super) async fn expense_with_splits(
        &self,
        db: &DatabaseTransaction,
        model: expenses::Model,
    ) -> ResultEngine<Expense> {
        let split_models: Vec<splits::Model> = splits::Entity::find()
            .filter(splits::Column::ExpenseId.eq(model.id.clone()))
            .order_by_asc(splits::Column::UserId)
            .all(db)
            .await?;

        let mut expense = Expense::try_from(model)?;
        expense.splits = split_models
            .into_iter()
            .map(Split::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        Ok(expense)
    }
}
