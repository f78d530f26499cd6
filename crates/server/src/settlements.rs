//! Settlement endpoints.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use api_types::settlement::{
    SettlementCreated, SettlementList, SettlementListResponse, SettlementNew, SettlementView,
};
use engine::MoneyCents;

use crate::{
    ServerError, currency_view,
    server::{AuthUser, ServerState},
};

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 200;

fn settlement_view(settlement: engine::Settlement) -> SettlementView {
    SettlementView {
        id: settlement.id,
        paid_by: settlement.paid_by,
        received_by: settlement.received_by,
        amount_minor: settlement.amount.cents(),
        currency: currency_view(settlement.currency),
        note: settlement.note,
        created_by: settlement.created_by,
        occurred_at: settlement.occurred_at.fixed_offset(),
    }
}

pub async fn create(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Json(payload): Json<SettlementNew>,
) -> Result<(StatusCode, Json<SettlementCreated>), ServerError> {
    let paid_by = payload.paid_by.as_deref().unwrap_or(&user.0);

    let settlement = state
        .engine
        .create_settlement(
            &group_id,
            &user.0,
            paid_by,
            &payload.received_by,
            MoneyCents::new(payload.amount_minor),
            payload.note.as_deref(),
            payload.occurred_at.with_timezone(&Utc),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SettlementCreated { id: settlement.id }),
    ))
}

pub async fn list(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Query(payload): Query<SettlementList>,
) -> Result<Json<SettlementListResponse>, ServerError> {
    let limit = payload.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let (items, next_cursor) = state
        .engine
        .list_settlements_page(&group_id, &user.0, limit, payload.cursor.as_deref())
        .await?;

    Ok(Json(SettlementListResponse {
        settlements: items.into_iter().map(settlement_view).collect(),
        next_cursor,
    }))
}

pub async fn remove(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path((group_id, settlement_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_settlement(&group_id, settlement_id, &user.0)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
