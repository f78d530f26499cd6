//! Settlements.
//!
//! A [`Settlement`] is a direct repayment between two members, independent
//! of any specific expense. It improves the payer's position and reduces
//! what the payer owes the receiver in the pairwise ledger.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, MoneyCents, ResultEngine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub group_id: String,
    pub paid_by: String,
    pub received_by: String,
    pub amount: MoneyCents,
    pub currency: Currency,
    pub note: Option<String>,
    pub created_by: String,
    pub occurred_at: DateTime<Utc>,
}

impl Settlement {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        group_id: String,
        paid_by: String,
        received_by: String,
        amount: MoneyCents,
        currency: Currency,
        note: Option<String>,
        created_by: String,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "settlement amount must be > 0".to_string(),
            ));
        }
        if paid_by == received_by {
            return Err(EngineError::InvalidAmount(
                "payer and receiver must differ".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            group_id,
            paid_by,
            received_by,
            amount,
            currency,
            note,
            created_by,
            occurred_at,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub paid_by: String,
    pub received_by: String,
    pub amount_minor: i64,
    pub currency: String,
    pub note: Option<String>,
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
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Settlement> for ActiveModel {
    fn from(settlement: &Settlement) -> Self {
        Self {
            id: ActiveValue::Set(settlement.id.to_string()),
            group_id: ActiveValue::Set(settlement.group_id.clone()),
            paid_by: ActiveValue::Set(settlement.paid_by.clone()),
            received_by: ActiveValue::Set(settlement.received_by.clone()),
            amount_minor: ActiveValue::Set(settlement.amount.cents()),
            currency: ActiveValue::Set(settlement.currency.code().to_string()),
            note: ActiveValue::Set(settlement.note.clone()),
            created_by: ActiveValue::Set(settlement.created_by.clone()),
            occurred_at: ActiveValue::Set(settlement.occurred_at),
        }
    }
}

impl TryFrom<Model> for Settlement {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::InvalidId("invalid settlement id".to_string()))?,
            group_id: model.group_id,
            paid_by: model.paid_by,
            received_by: model.received_by,
            amount: MoneyCents::new(model.amount_minor),
            currency: Currency::try_from(model.currency.as_str())?,
            note: model.note,
            created_by: model.created_by,
            occurred_at: model.occurred_at,
        })
    }
}
