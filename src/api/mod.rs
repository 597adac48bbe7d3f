pub mod files;
pub mod middleware;
pub mod users;

use crate::error::FsError;
use crate::utils::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{any, get, post};
use axum::{Router, middleware as axum_middleware};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(state: Arc<AppState>) -> Router {
    let fs_routes = Router::new()
        .route("/fs", any(files::dispatch_root))
        .route("/fs/{*tail}", any(files::dispatch_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1", user_router())
        .merge(fs_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn user_router() -> Router<Arc<AppState>> {
    Router::new().route("/users", post(users::create_user))
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, FsError> {
    state.ctx.ping().await?;
    Ok(StatusCode::OK)
}
