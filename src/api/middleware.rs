use crate::error::FsError;
use crate::utils::password::verify_password;
use crate::utils::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::IntoResponse;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;

/// Authenticated identity, inserted into request extensions for handlers
/// downstream of `authenticate`.
#[derive(Clone, Debug)]
pub struct AuthUser(pub String);

/// Basic authentication against the account table. Every filesystem request
/// carries credentials; there are no sessions.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, FsError> {
    let (username, password) = extract_basic(&req)?;

    let user = state
        .users
        .query_user_by_name(&username)
        .await
        .map_err(|_| FsError::Unauthorized(format!("unknown user: {username}")))?;

    if !verify_password(password, user.password).await? {
        return Err(FsError::Unauthorized(format!(
            "invalid password for: {username}"
        )));
    }

    req.extensions_mut().insert(AuthUser(user.username));
    Ok(next.run(req).await)
}

fn extract_basic(req: &Request) -> Result<(String, String), FsError> {
    let encoded = req
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Basic "))
        .ok_or_else(|| FsError::Unauthorized("missing or malformed Basic header".to_string()))?;

    let decoded = STANDARD
        .decode(encoded)
        .map_err(|_| FsError::Unauthorized("undecodable Basic header".to_string()))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| FsError::Unauthorized("non-utf8 credentials".to_string()))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| FsError::Unauthorized("credentials missing separator".to_string()))?;
    Ok((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_auth(value: &str) -> Request {
        axum::http::Request::builder()
            .uri("/fs/x")
            .header("Authorization", value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extract_basic() {
        let encoded = STANDARD.encode("alice:s3cret");
        let req = request_with_auth(&format!("Basic {encoded}"));
        let (user, pass) = extract_basic(&req).unwrap();
        assert_eq!(user, "alice");
        assert_eq!(pass, "s3cret");
    }

    #[test]
    fn test_extract_basic_rejects_bearer_and_garbage() {
        assert!(extract_basic(&request_with_auth("Bearer abc")).is_err());
        assert!(extract_basic(&request_with_auth("Basic %%%")).is_err());

        let no_sep = STANDARD.encode("alicepassword");
        assert!(extract_basic(&request_with_auth(&format!("Basic {no_sep}"))).is_err());
    }
}
