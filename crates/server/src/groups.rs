//! Group and membership endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use api_types::group::{GroupDetail, GroupListResponse, GroupNew, GroupUpdate, GroupView};
use api_types::membership::{MemberUpsert, MembersResponse};

use crate::{
    ServerError, currency_view, member_view,
    server::{AuthUser, ServerState},
};

fn group_view(group: engine::Group) -> GroupView {
    GroupView {
        id: group.id,
        name: group.name,
        description: group.description,
        created_by: group.created_by,
        currency: currency_view(group.currency),
    }
}

fn engine_role(role: api_types::membership::GroupRole) -> engine::GroupRole {
    match role {
        api_types::membership::GroupRole::Admin => engine::GroupRole::Admin,
        api_types::membership::GroupRole::Member => engine::GroupRole::Member,
    }
}

pub async fn create(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Json(payload): Json<GroupNew>,
) -> Result<(StatusCode, Json<GroupView>), ServerError> {
    let group = state
        .engine
        .create_group(&payload.name, payload.description.as_deref(), &user.0)
        .await?;
    Ok((StatusCode::CREATED, Json(group_view(group))))
}

pub async fn list(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
) -> Result<Json<GroupListResponse>, ServerError> {
    let groups = state
        .engine
        .list_groups(&user.0)
        .await?
        .into_iter()
        .map(group_view)
        .collect();
    Ok(Json(GroupListResponse { groups }))
}

pub async fn detail(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupDetail>, ServerError> {
    let (group, members) = state.engine.group_detail(&group_id, &user.0).await?;
    Ok(Json(GroupDetail {
        group: group_view(group),
        members: members.into_iter().map(member_view).collect(),
    }))
}

pub async fn update(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Json(payload): Json<GroupUpdate>,
) -> Result<Json<GroupView>, ServerError> {
    let group = state
        .engine
        .update_group(
            &group_id,
            &user.0,
            payload.name.as_deref(),
            payload.description.as_deref(),
        )
        .await?;
    Ok(Json(group_view(group)))
}

pub async fn remove(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_group(&group_id, &user.0).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
) -> Result<Json<MembersResponse>, ServerError> {
    let (_, members) = state.engine.group_detail(&group_id, &user.0).await?;
    Ok(Json(MembersResponse {
        members: members.into_iter().map(member_view).collect(),
    }))
}

pub async fn upsert_member(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Json(payload): Json<MemberUpsert>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .upsert_member(
            &group_id,
            &user.0,
            &payload.username,
            engine_role(payload.role),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_member(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path((group_id, username)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .remove_member(&group_id, &user.0, &username)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
