//! User registration, profile and search endpoints.

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};

use api_types::user::{ProfileUpdate, UserNew, UserSearch, UserSearchResponse, UserView};

use crate::{
    ServerError,
    server::{AuthUser, ServerState},
};

fn user_view(profile: engine::UserProfile) -> UserView {
    UserView {
        username: profile.username,
        email: profile.email,
        avatar_url: profile.avatar_url,
    }
}

pub async fn register(
    State(state): State<ServerState>,
    Json(payload): Json<UserNew>,
) -> Result<(StatusCode, Json<UserView>), ServerError> {
    let profile = state
        .engine
        .create_user(
            &payload.username,
            &payload.password,
            &payload.email,
            payload.avatar_url.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(user_view(profile))))
}

pub async fn update_profile(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<UserView>, ServerError> {
    let profile = state
        .engine
        .update_profile(
            &user.0,
            payload.email.as_deref(),
            payload.avatar_url.as_deref(),
        )
        .await?;
    Ok(Json(user_view(profile)))
}

pub async fn search(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Query(payload): Query<UserSearch>,
) -> Result<Json<UserSearchResponse>, ServerError> {
    let users = state
        .engine
        .search_users(&payload.query, &user.0)
        .await?
        .into_iter()
        .map(user_view)
        .collect();
    Ok(Json(UserSearchResponse { users }))
}
