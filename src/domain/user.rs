use chrono::{DateTime, Utc};

/// One account row. `password` holds the bcrypt hash, never plaintext.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub username: String,
    pub password: String,
    pub created: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, password_hash: String) -> Self {
        User {
            username,
            password: password_hash,
            created: Utc::now(),
        }
    }
}
