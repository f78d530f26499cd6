//! Expense primitives.
//!
//! An `Expense` is an amount paid by one member on behalf of the group,
//! divided into [`Split`](crate::splits::Split)s. The payer is implicitly
//! owed by every non-payer, non-settled split.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, MoneyCents, ResultEngine, splits::Split};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub group_id: String,
    pub description: Option<String>,
    pub amount: MoneyCents,
    pub currency: Currency,
    pub paid_by: String,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
    pub splits: Vec<Split>,
}

impl Expense {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        group_id: String,
        description: Option<String>,
        amount: MoneyCents,
        currency: Currency,
        paid_by: String,
        created_by: String,
        occurred_at: DateTime<Utc>,
        splits: Vec<Split>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "expense amount must be > 0".to_string(),
            ));
        }
        if splits.is_empty() {
            return Err(EngineError::InvalidAmount(
                "expense needs at least one split".to_string(),
            ));
        }
        if splits.iter().any(|split| split.amount.is_negative()) {
            return Err(EngineError::InvalidAmount(
                "split amounts must be >= 0".to_string(),
            ));
        }
        let split_sum: MoneyCents = splits.iter().map(|split| split.amount).sum();
        if split_sum != amount {
            return Err(EngineError::InvalidAmount(format!(
                "splits sum to {split_sum}, expense amount is {amount}"
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            group_id,
            description,
            amount,
            currency,
            paid_by,
            created_by,
            occurred_at,
            splits,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub description: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub paid_by: String,
    pub created_by: String,
    pub occurred_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Groups,
    #[sea_orm(has_many = "super::splits::Entity")]
    Splits,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl Related<super::splits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Splits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id.to_string()),
            group_id: ActiveValue::Set(expense.group_id.clone()),
            description: ActiveValue::Set(expense.description.clone()),
            amount_minor: ActiveValue::Set(expense.amount.cents()),
            currency: ActiveValue::Set(expense.currency.code().to_string()),
            paid_by: ActiveValue::Set(expense.paid_by.clone()),
            created_by: ActiveValue::Set(expense.created_by.clone()),
            occurred_at: ActiveValue::Set(expense.occurred_at),
        }
    }
}

impl TryFrom<Model> for Expense {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::InvalidId("invalid expense id".to_string()))?,
            group_id: model.group_id,
            description: model.description,
            amount: MoneyCents::new(model.amount_minor),
            currency: Currency::try_from(model.currency.as_str())?,
            paid_by: model.paid_by,
            created_by: model.created_by,
            occurred_at: model.occurred_at,
            splits: Vec::new(),
        })
    }
}
