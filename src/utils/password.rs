//! Bcrypt hashing, pushed onto the blocking pool: a single verify costs tens
//! of milliseconds and must not stall the async runtime.

use crate::error::{FsError, Result};

pub async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| FsError::Io(std::io::Error::other(e)))?
        .map_err(FsError::Bcrypt)
}

pub async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| FsError::Io(std::io::Error::other(e)))?
        .map_err(FsError::Bcrypt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hash = hash_password("secret".to_string()).await.unwrap();
        assert!(hash.starts_with("$2"));
        assert!(verify_password("secret".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".to_string(), hash).await.unwrap());
    }
}
