//! Curation prompt operations.

use super::Store;
use crate::models::Prompt;
use crate::time::DbTime;
use crate::{id, Error, Result};

impl Store {
    /// The currently active prompt, or `None` when curation is unconfigured.
    pub async fn active_prompt(&self) -> Result<Option<Prompt>> {
        Ok(
            sqlx::query_as::<_, Prompt>("SELECT * FROM prompts WHERE active = 1 LIMIT 1")
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// Make `content` the active prompt. The previous active row is
    /// deactivated in the same transaction, keeping the active set at one.
    pub async fn set_prompt(&self, content: &str) -> Result<Prompt> {
        let prompt_id = id::prompt_id();

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE prompts SET active = 0 WHERE active = 1")
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO prompts (id, content, active, created_at) VALUES (?, ?, 1, ?)")
            .bind(&prompt_id)
            .bind(content)
            .bind(DbTime::now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        sqlx::query_as::<_, Prompt>("SELECT * FROM prompts WHERE id = ?")
            .bind(&prompt_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::Internal(format!("prompt {prompt_id} missing after insert")))
    }
}
