//! Subscription and timeline operations.

use super::Store;
use crate::models::{MissingEntry, Subscription, TimelineEntriesArgs, TimelineEntry, TimelineStatus};
use crate::time::DbTime;
use crate::{id, Result};

impl Store {
    /// Subscribe a user to a feed. Repeats are ignored, so the
    /// (user, feed) pair stays unique.
    pub async fn create_subscription(&self, user_id: &str, feed_id: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO subscriptions (id, user_id, feed_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id::subscription_id())
        .bind(user_id)
        .bind(feed_id)
        .bind(DbTime::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn user_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>> {
        Ok(
            sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    /// Entries of subscribed feeds that have no timeline row yet for the
    /// subscribing user: the anti-join that drives timeline fan-out.
    pub async fn missing_entries(&self, user_id: Option<&str>) -> Result<Vec<MissingEntry>> {
        let mut sql = String::from(
            r#"
            SELECT
                fe.id AS feed_entry_id,
                fe.feed_id AS feed_id,
                subs.user_id AS user_id
            FROM feed_entries fe
            INNER JOIN subscriptions subs ON subs.feed_id = fe.feed_id
            LEFT JOIN timeline_entries te
                ON te.feed_entry_id = fe.id AND te.user_id = subs.user_id
            WHERE te.id IS NULL
            "#,
        );
        if user_id.is_some() {
            sql.push_str(" AND subs.user_id = ?");
        }

        let mut query = sqlx::query_as::<_, MissingEntry>(&sql);
        if let Some(user_id) = user_id {
            query = query.bind(user_id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Insert a timeline entry in `requires_judgement`, ignoring the insert
    /// when the (user, feed entry) pair already has one.
    ///
    /// Returns whether a row was actually written.
    pub async fn insert_timeline_entry(
        &self,
        user_id: &str,
        feed_id: &str,
        feed_entry_id: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO timeline_entries (id, user_id, feed_id, feed_entry_id, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id::timeline_entry_id())
        .bind(user_id)
        .bind(feed_id)
        .bind(feed_entry_id)
        .bind(TimelineStatus::RequiresJudgement)
        .bind(DbTime::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn entries_needing_judgement(
        &self,
        user_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<TimelineEntry>> {
        let mut sql =
            String::from("SELECT * FROM timeline_entries WHERE status = 'requires_judgement'");
        if user_id.is_some() {
            sql.push_str(" AND user_id = ?");
        }
        sql.push_str(" ORDER BY created_at LIMIT ?");

        let mut query = sqlx::query_as::<_, TimelineEntry>(&sql);
        if let Some(user_id) = user_id {
            query = query.bind(user_id);
        }
        query = query.bind(limit);

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Move a timeline entry to a terminal status. The guard on the current
    /// status makes terminal states absorbing, so replays cannot flip an
    /// already-judged entry.
    pub async fn update_timeline_entry(&self, entry_id: &str, status: TimelineStatus) -> Result<()> {
        sqlx::query(
            "UPDATE timeline_entries SET status = ? WHERE id = ? AND status = 'requires_judgement'",
        )
        .bind(status)
        .bind(entry_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn timeline_entries(&self, args: &TimelineEntriesArgs) -> Result<Vec<TimelineEntry>> {
        let mut sql = String::from("SELECT * FROM timeline_entries WHERE 1 = 1");
        if args.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if args.feed_id.is_some() {
            sql.push_str(" AND feed_id = ?");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, TimelineEntry>(&sql);
        if let Some(status) = args.status {
            query = query.bind(status);
        }
        if let Some(feed_id) = &args.feed_id {
            query = query.bind(feed_id);
        }
        query = query.bind(args.limit).bind(args.offset);

        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn count_timeline_entries(&self, args: &TimelineEntriesArgs) -> Result<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM timeline_entries WHERE 1 = 1");
        if args.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if args.feed_id.is_some() {
            sql.push_str(" AND feed_id = ?");
        }

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(status) = args.status {
            query = query.bind(status);
        }
        if let Some(feed_id) = &args.feed_id {
            query = query.bind(feed_id);
        }

        Ok(query.fetch_one(&self.pool).await?)
    }
}
