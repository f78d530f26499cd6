//! Expense endpoints.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use api_types::expense::{
    ExpenseCreated, ExpenseList, ExpenseListResponse, ExpenseNew, ExpenseView, SplitPaidUpdate,
    SplitView,
};
use engine::{ExpenseListFilter, MoneyCents, Split};

use crate::{
    ServerError, currency_view,
    server::{AuthUser, ServerState},
};

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 200;

fn expense_view(expense: engine::Expense) -> ExpenseView {
    ExpenseView {
        id: expense.id,
        description: expense.description,
        amount_minor: expense.amount.cents(),
        currency: currency_view(expense.currency),
        paid_by: expense.paid_by,
        created_by: expense.created_by,
        occurred_at: expense.occurred_at.fixed_offset(),
        splits: expense
            .splits
            .into_iter()
            .map(|split| SplitView {
                user_id: split.user_id,
                amount_minor: split.amount.cents(),
                paid: split.paid,
            })
            .collect(),
    }
}

fn clamp_limit(limit: Option<u64>) -> u64 {
    limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
}

pub async fn create(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Json(payload): Json<ExpenseNew>,
) -> Result<(StatusCode, Json<ExpenseCreated>), ServerError> {
    let splits = payload
        .splits
        .into_iter()
        .map(|split| Split::new(split.user_id, MoneyCents::new(split.amount_minor), split.paid))
        .collect();
    let paid_by = payload.paid_by.as_deref().unwrap_or(&user.0);

    let expense = state
        .engine
        .create_expense(
            &group_id,
            &user.0,
            payload.description.as_deref(),
            MoneyCents::new(payload.amount_minor),
            paid_by,
            payload.occurred_at.with_timezone(&Utc),
            splits,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ExpenseCreated { id: expense.id })))
}

pub async fn list(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Query(payload): Query<ExpenseList>,
) -> Result<Json<ExpenseListResponse>, ServerError> {
    let filter = ExpenseListFilter {
        from: payload.from.map(|t| t.with_timezone(&Utc)),
        to: payload.to.map(|t| t.with_timezone(&Utc)),
        paid_by: payload.paid_by,
    };

    let (items, next_cursor) = state
        .engine
        .list_expenses_page(
            &group_id,
            &user.0,
            clamp_limit(payload.limit),
            payload.cursor.as_deref(),
            &filter,
        )
        .await?;

    Ok(Json(ExpenseListResponse {
        expenses: items.into_iter().map(expense_view).collect(),
        next_cursor,
    }))
}

pub async fn remove(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path((group_id, expense_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_expense(&group_id, expense_id, &user.0)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_split_paid(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path((group_id, expense_id)): Path<(String, Uuid)>,
    Json(payload): Json<SplitPaidUpdate>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .set_split_paid(&group_id, expense_id, &payload.user_id, payload.paid, &user.0)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
