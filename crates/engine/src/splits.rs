//! Expense splits.
//!
//! A [`Split`] is the share of an expense attributed to one member.
//! Amounts are non-negative integer cents. A split flagged `paid` has
//! already been resolved outside the ledger and contributes nothing to
//! balances.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub user_id: String,
    pub amount: MoneyCents,
    pub paid: bool,
}

impl Split {
    pub fn new(user_id: String, amount: MoneyCents, paid: bool) -> Self {
        Self {
            user_id,
            amount,
            paid,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "splits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub expense_id: String,
    pub user_id: String,
    pub amount_minor: i64,
    pub paid: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Expenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Split {
    pub(crate) fn into_active_model(self, expense_id: Uuid) -> ActiveModel {
        ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4().to_string()),
            expense_id: ActiveValue::Set(expense_id.to_string()),
            user_id: ActiveValue::Set(self.user_id),
            amount_minor: ActiveValue::Set(self.amount.cents()),
            paid: ActiveValue::Set(self.paid),
        }
    }
}

impl TryFrom<Model> for Split {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: model.user_id,
            amount: MoneyCents::new(model.amount_minor),
            paid: model.paid,
        })
    }
}
