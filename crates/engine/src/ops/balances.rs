use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    BalanceSheet, Expense, ResultEngine, Settlement, balance, expenses, settlements,
};

use super::{Engine, with_tx};

impl Engine {
    /// Computes the group's balance sheet from a consistent snapshot.
    ///
    /// Members, expenses with their splits, and settlements are loaded
    /// inside a single transaction, then folded by
    /// [`balance::compute_balances`]. Nothing is persisted: balances are
    /// always derived, never stored.
    pub async fn group_balances(&self, group_id: &str, user_id: &str) -> ResultEngine<BalanceSheet> {
        with_tx!(self, |db_tx| {
            self.require_group_member(&db_tx, group_id, user_id).await?;

            let members = self.load_group_members(&db_tx, group_id).await?;

            let expense_models: Vec<expenses::Model> = expenses::Entity::find()
                .filter(expenses::Column::GroupId.eq(group_id.to_string()))
                .order_by_asc(expenses::Column::OccurredAt)
                .all(&db_tx)
                .await?;
            let mut group_expenses: Vec<Expense> = Vec::with_capacity(expense_models.len());
            for model in expense_models {
                group_expenses.push(self.expense_with_splits(&db_tx, model).await?);
            }

            let settlement_models: Vec<settlements::Model> = settlements::Entity::find()
                .filter(settlements::Column::GroupId.eq(group_id.to_string()))
                .order_by_asc(settlements::Column::OccurredAt)
                .all(&db_tx)
                .await?;
            let group_settlements: Vec<Settlement> = settlement_models
                .into_iter()
                .map(Settlement::try_from)
                .collect::<ResultEngine<Vec<_>>>()?;

            balance::compute_balances(&members, &group_expenses, &group_settlements)
        })
    }
}
