pub mod admin;
pub mod auth;
pub mod conversations;
pub mod error;
pub mod middleware;
pub mod posts;
pub mod users;

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
};
use tracing::error;

use mutuals_core::{CoreResult, Engine};
use mutuals_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub engine: Engine,
    pub jwt_secret: String,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: impl Into<String>) -> AppState {
        Arc::new(Self {
            engine: Engine::new(db),
            jwt_secret: jwt_secret.into(),
        })
    }
}

/// Runs an engine call off the async runtime. Every store access goes
/// through here.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Engine) -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.engine))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::from)
}

/// All routes, without transport layers (CORS, tracing), which the server
/// adds.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/leaderboard", get(users::leaderboard));

    // Anonymous callers are allowed; a valid token personalizes the result.
    let viewer_routes = Router::new()
        .route("/users/{user}", get(users::profile))
        .route("/posts", get(posts::list_posts))
        .layer(from_fn_with_state(state.clone(), middleware::optional_auth));

    let protected_routes = Router::new()
        .route("/me", get(users::me))
        .route("/settings/profile", patch(users::update_profile))
        .route("/settings/password", patch(auth::change_password))
        .route("/users/search", get(users::search))
        .route("/users/{user}/follow", post(users::toggle_follow))
        .route("/users/{user}/report", post(users::report_user))
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/conversations/{id}/messages",
            get(conversations::list_messages).post(conversations::send_message),
        )
        .route("/posts", post(posts::create_post))
        .route("/posts/{id}/like", post(posts::toggle_like))
        .route("/posts/{id}/report", post(posts::report_post))
        .nest("/admin", admin::routes())
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(viewer_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
pub(crate) mod testutil {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    pub const SECRET: &str = "test-secret-with-enough-entropy";

    pub fn app() -> (AppState, Router) {
        let state = AppStateInner::new(Database::open_in_memory().unwrap(), SECRET);
        (state.clone(), router(state))
    }

    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Registers `name` and returns `(user_id, token)`.
    pub async fn signup(app: &Router, name: &str) -> (i64, String) {
        let body = serde_json::json!({
            "username": name,
            "email": format!("{name}@example.com"),
            "password": "correct horse battery",
        });
        let (status, json) = send(app, "POST", "/auth/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        (
            json["user_id"].as_i64().unwrap(),
            json["token"].as_str().unwrap().to_string(),
        )
    }
}
