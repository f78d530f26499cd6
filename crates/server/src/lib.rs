use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{run, run_with_listener, spawn_with_listener};

mod balances;
mod expenses;
mod groups;
mod server;
mod settlements;
mod user;

pub mod types {
    pub mod group {
        pub use api_types::group::{GroupDetail, GroupListResponse, GroupNew, GroupUpdate, GroupView};
    }

    pub mod membership {
        pub use api_types::membership::{GroupRole, MemberUpsert, MemberView, MembersResponse};
    }

    pub mod expense {
        pub use api_types::expense::{
            ExpenseCreated, ExpenseList, ExpenseListResponse, ExpenseNew, ExpenseView, SplitNew,
            SplitPaidUpdate, SplitView,
        };
    }

    pub mod settlement {
        pub use api_types::settlement::{
            SettlementCreated, SettlementList, SettlementListResponse, SettlementNew,
            SettlementView,
        };
    }

    pub mod balance {
        pub use api_types::balance::{BalancesResponse, CreditView, DebtView, MemberBalanceView};
    }

    pub mod user {
        pub use api_types::user::{ProfileUpdate, UserNew, UserSearch, UserSearchResponse, UserView};
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

fn currency_view(currency: engine::Currency) -> api_types::Currency {
    match currency {
        engine::Currency::Eur => api_types::Currency::Eur,
    }
}

fn role_view(role: engine::GroupRole) -> api_types::membership::GroupRole {
    match role {
        engine::GroupRole::Admin => api_types::membership::GroupRole::Admin,
        engine::GroupRole::Member => api_types::membership::GroupRole::Member,
    }
}

fn member_view(member: engine::GroupMember) -> api_types::membership::MemberView {
    api_types::membership::MemberView {
        username: member.username,
        email: member.email,
        avatar_url: member.avatar_url,
        role: role_view(member.role),
    }
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_) => StatusCode::CONFLICT,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::InvalidAmount(_)
        | EngineError::InvalidInput(_)
        | EngineError::InvalidReference(_)
        | EngineError::InvalidRole(_)
        | EngineError::InvalidCursor(_)
        | EngineError::InvalidId(_)
        | EngineError::CurrencyMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
