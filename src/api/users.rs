use crate::domain::User;
use crate::error::FsError;
use crate::utils::password::hash_password;
use crate::utils::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize, Debug)]
pub struct UserReq {
    username: String,
    password: String,
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserReq>,
) -> Result<impl IntoResponse, FsError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(FsError::Invalid(
            "username and password must be non-empty".to_string(),
        ));
    }
    // The Basic credential format reserves the colon.
    if req.username.contains(':') {
        return Err(FsError::Invalid("username may not contain ':'".to_string()));
    }

    let hash = hash_password(req.password).await?;
    let user = User::new(req.username.clone(), hash);
    state.users.insert_user(&user).await?;

    tracing::info!("created user: {}", req.username);
    Ok(StatusCode::CREATED)
}
