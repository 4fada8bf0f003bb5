//! User operations.

use super::Store;
use crate::models::User;
use crate::time::DbTime;
use crate::{id, Error, Result};

impl Store {
    /// Insert-or-return-existing keyed on the GitHub ID, used by the SSO
    /// callback so repeated logins converge on one row.
    pub async fn ensure_user(&self, github_id: &str, email: &str) -> Result<User> {
        let now = DbTime::now();
        sqlx::query(
            r#"
            INSERT INTO users (id, github_id, email, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(github_id) DO NOTHING
            "#,
        )
        .bind(id::user_id())
        .bind(github_id)
        .bind(email)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.user_by_github_id(github_id).await
    }

    pub async fn user(&self, user_id: &str) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {user_id}")))
    }

    pub async fn user_by_github_id(&self, github_id: &str) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE github_id = ?")
            .bind(github_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user with github id {github_id}")))
    }
}
