//! Account storage backing the basic-auth middleware.

use crate::domain::User;
use crate::error::{FsError, Result};
use sqlx::SqlitePool;
use std::sync::Arc;

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<()>;

    async fn query_user_by_name(&self, username: &str) -> Result<User>;
}

pub struct SqliteUserStore {
    pool: Arc<SqlitePool>,
}

impl SqliteUserStore {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        SqliteUserStore { pool }
    }
}

#[async_trait::async_trait]
impl UserStore for SqliteUserStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query("INSERT INTO users (username, password, created) VALUES (?, ?, ?)")
            .bind(&user.username)
            .bind(&user.password)
            .bind(user.created)
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| FsError::from_sqlx(e, &format!("username: {}", user.username)))?;
        Ok(())
    }

    async fn query_user_by_name(&self, username: &str) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| FsError::NotFound(format!("user: {username}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::tests::memory_pool;

    #[tokio::test]
    async fn test_user_insert_and_lookup() {
        let store = SqliteUserStore::new(memory_pool().await);
        let user = User::new("alice".to_string(), "$2b$12$hash".to_string());
        store.insert_user(&user).await.unwrap();

        let got = store.query_user_by_name("alice").await.unwrap();
        assert_eq!(got.username, "alice");
        assert_eq!(got.password, "$2b$12$hash");

        assert!(matches!(
            store.query_user_by_name("bob").await,
            Err(FsError::NotFound(_))
        ));

        let dup = User::new("alice".to_string(), "other".to_string());
        assert!(matches!(
            store.insert_user(&dup).await,
            Err(FsError::AlreadyExists(_))
        ));
    }
}
