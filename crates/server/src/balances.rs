//! Balance endpoint: derived totals and the netted pairwise ledger.

use axum::{
    Extension, Json,
    extract::{Path, State},
};

use api_types::balance::{BalancesResponse, CreditView, DebtView, MemberBalanceView};

use crate::{
    ServerError, member_view,
    server::{AuthUser, ServerState},
};

pub async fn get(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
) -> Result<Json<BalancesResponse>, ServerError> {
    let sheet = state.engine.group_balances(&group_id, &user.0).await?;

    let totals = sheet
        .totals
        .into_iter()
        .map(|(username, amount)| (username, amount.cents()))
        .collect();
    let members = sheet
        .members
        .into_iter()
        .map(|record| MemberBalanceView {
            member: member_view(record.member),
            total_balance_minor: record.total_balance.cents(),
            owes: record
                .owes
                .into_iter()
                .map(|debt| DebtView {
                    to: debt.to,
                    amount_minor: debt.amount.cents(),
                })
                .collect(),
            owed_by: record
                .owed_by
                .into_iter()
                .map(|credit| CreditView {
                    from: credit.from,
                    amount_minor: credit.amount.cents(),
                })
                .collect(),
        })
        .collect();

    Ok(Json(BalancesResponse {
        currency: api_types::Currency::Eur,
        members,
        totals,
    }))
}
