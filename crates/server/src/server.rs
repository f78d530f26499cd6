use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, patch, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};

use std::sync::Arc;

use crate::{balances, expenses, groups, settlements, user};
use engine::Engine;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

/// The authenticated caller, inserted by the auth middleware.
#[derive(Clone, Debug)]
pub struct AuthUser(pub String);

async fn auth(
    auth_header: Option<TypedHeader<Authorization<Basic>>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // A missing header is 401 like bad credentials, not a malformed request.
    let Some(auth_header) = auth_header else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    if auth_header.username().is_empty() || auth_header.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    state
        .engine
        .authenticate(auth_header.username(), auth_header.password())
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    request
        .extensions_mut()
        .insert(AuthUser(auth_header.username().to_string()));
    Ok(next.run(request).await)
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route("/groups", post(groups::create).get(groups::list))
        .route(
            "/groups/{group_id}",
            get(groups::detail)
                .patch(groups::update)
                .delete(groups::remove),
        )
        .route(
            "/groups/{group_id}/members",
            get(groups::list_members).post(groups::upsert_member),
        )
        .route(
            "/groups/{group_id}/members/{username}",
            delete(groups::remove_member),
        )
        .route(
            "/groups/{group_id}/expenses",
            post(expenses::create).get(expenses::list),
        )
        .route(
            "/groups/{group_id}/expenses/{expense_id}",
            delete(expenses::remove),
        )
        .route(
            "/groups/{group_id}/expenses/{expense_id}/splits",
            patch(expenses::set_split_paid),
        )
        .route(
            "/groups/{group_id}/settlements",
            post(settlements::create).get(settlements::list),
        )
        .route(
            "/groups/{group_id}/settlements/{settlement_id}",
            delete(settlements::remove),
        )
        .route("/groups/{group_id}/balances", get(balances::get))
        .route("/user", patch(user::update_profile))
        .route("/users/search", get(user::search))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        // Registration stays outside the auth layer.
        .route("/users", post(user::register))
        .with_state(state)
}

pub async fn run(engine: Engine) {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
    };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use base64::Engine as _;
    use http_body_util::BodyExt;
    use sea_orm::Database;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use migration::MigratorTrait;

    use super::*;

    async fn test_router() -> Router {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let engine = Engine::builder().database(db).build().await.unwrap();
        router(ServerState {
            engine: Arc::new(engine),
        })
    }

    fn basic_auth(username: &str, password: &str) -> String {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{username}:{password}"));
        format!("Basic {encoded}")
    }

    fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(router: &Router, username: &str) {
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/users",
                None,
                json!({
                    "username": username,
                    "password": "password",
                    "email": format!("{username}@example.com"),
                    "avatar_url": null,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn unauthenticated_requests_are_rejected() {
        let router = test_router().await;

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/groups")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        register(&router, "anna").await;
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/groups")
                    .header(header::AUTHORIZATION, basic_auth("anna", "wrong"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn expense_flow_produces_balances() {
        let router = test_router().await;
        register(&router, "anna").await;
        register(&router, "bruno").await;
        let anna = basic_auth("anna", "password");
        let bruno = basic_auth("bruno", "password");

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/groups",
                Some(&anna),
                json!({ "name": "Flat", "description": null }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let group = json_body(response).await;
        let group_id = group["id"].as_str().unwrap().to_string();

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/groups/{group_id}/members"),
                Some(&anna),
                json!({ "username": "bruno", "role": "member" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/groups/{group_id}/expenses"),
                Some(&anna),
                json!({
                    "amount_minor": 3000,
                    "description": "groceries",
                    "paid_by": "anna",
                    "occurred_at": "2026-08-15T12:00:00+02:00",
                    "splits": [
                        { "user_id": "anna", "amount_minor": 1500 },
                        { "user_id": "bruno", "amount_minor": 1500 },
                    ],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/groups/{group_id}/balances"))
                    .header(header::AUTHORIZATION, &bruno)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let balances = json_body(response).await;
        let members = balances["members"].as_array().unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0]["member"]["username"], "anna");
        assert_eq!(members[0]["total_balance_minor"], 1500);
        assert_eq!(members[1]["member"]["username"], "bruno");
        assert_eq!(members[1]["total_balance_minor"], -1500);
        assert_eq!(members[1]["owes"][0]["to"], "anna");
        assert_eq!(members[1]["owes"][0]["amount_minor"], 1500);
        assert_eq!(balances["totals"]["anna"], 1500);
        assert_eq!(balances["totals"]["bruno"], -1500);
    }

    #[tokio::test]
    async fn non_member_split_returns_422() {
        let router = test_router().await;
        register(&router, "anna").await;
        let anna = basic_auth("anna", "password");

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/groups",
                Some(&anna),
                json!({ "name": "Solo", "description": null }),
            ))
            .await
            .unwrap();
        let group = json_body(response).await;
        let group_id = group["id"].as_str().unwrap();

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/groups/{group_id}/expenses"),
                Some(&anna),
                json!({
                    "amount_minor": 1000,
                    "description": null,
                    "paid_by": "anna",
                    "occurred_at": "2026-08-15T12:00:00+02:00",
                    "splits": [{ "user_id": "dora", "amount_minor": 1000 }],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn hidden_group_returns_404() {
        let router = test_router().await;
        register(&router, "anna").await;
        register(&router, "bruno").await;
        let anna = basic_auth("anna", "password");
        let bruno = basic_auth("bruno", "password");

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/groups",
                Some(&anna),
                json!({ "name": "Private", "description": null }),
            ))
            .await
            .unwrap();
        let group = json_body(response).await;
        let group_id = group["id"].as_str().unwrap();

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/groups/{group_id}/balances"))
                    .header(header::AUTHORIZATION, &bruno)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_registration_returns_409() {
        let router = test_router().await;
        register(&router, "anna").await;

        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/users",
                None,
                json!({
                    "username": "anna",
                    "password": "other",
                    "email": "anna@example.com",
                    "avatar_url": null,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
