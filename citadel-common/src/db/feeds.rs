//! Feed and feed-entry operations.

use super::{is_unique_violation, Store};
use crate::models::{Feed, FeedEntry, NewFeedEntry, UpdateFeedArgs};
use crate::time::DbTime;
use crate::{id, Error, Result};

impl Store {
    pub async fn feed(&self, feed_id: &str) -> Result<Feed> {
        sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE id = ?")
            .bind(feed_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("feed {feed_id}")))
    }

    pub async fn feeds(&self, ids: &[String]) -> Result<Vec<Feed>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT * FROM feeds WHERE id IN ({placeholders})");
        let mut query = sqlx::query_as::<_, Feed>(&sql);
        for feed_id in ids {
            query = query.bind(feed_id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn feed_by_url(&self, url: &str) -> Result<Feed> {
        sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("feed for url {url}")))
    }

    /// Insert a new feed row for `url`. A second insert for the same URL is a
    /// `Conflict`.
    pub async fn insert_feed(&self, url: &str) -> Result<Feed> {
        let feed_id = id::feed_id();
        let now = DbTime::now();

        let inserted =
            sqlx::query("INSERT INTO feeds (id, url, created_at, updated_at) VALUES (?, ?, ?, ?)")
                .bind(&feed_id)
                .bind(url)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await;

        match inserted {
            Ok(_) => self.feed(&feed_id).await,
            Err(err) if is_unique_violation(&err) => {
                Err(Error::Conflict(format!("feed already exists for {url}")))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Delete a feed; entries and timeline rows follow via cascade.
    pub async fn delete_feed(&self, feed_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn count_all_feeds(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM feeds")
            .fetch_one(&self.pool)
            .await?)
    }

    /// A stable page of feed IDs for batched syncing.
    pub async fn feed_ids(&self, offset: i64, limit: i64) -> Result<Vec<String>> {
        Ok(
            sqlx::query_scalar("SELECT id FROM feeds ORDER BY id LIMIT ? OFFSET ?")
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    /// Partial feed update; absent fields keep their current value.
    pub async fn update_feed(&self, feed_id: &str, args: UpdateFeedArgs) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE feeds SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                last_synced_at = COALESCE(?, last_synced_at),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(args.title)
        .bind(args.description)
        .bind(args.last_synced)
        .bind(DbTime::now())
        .bind(feed_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn entry(&self, entry_id: &str) -> Result<FeedEntry> {
        sqlx::query_as::<_, FeedEntry>("SELECT * FROM feed_entries WHERE id = ?")
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("feed entry {entry_id}")))
    }

    pub async fn entries(&self, ids: &[String]) -> Result<Vec<FeedEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT * FROM feed_entries WHERE id IN ({placeholders})");
        let mut query = sqlx::query_as::<_, FeedEntry>(&sql);
        for entry_id in ids {
            query = query.bind(entry_id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Upsert entries keyed by GUID. Duplicates are silently dropped; IDs are
    /// minted per row, so only rows actually inserted consume one.
    pub async fn insert_entries(&self, entries: &[NewFeedEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let now = DbTime::now();
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO feed_entries (id, feed_id, guid, title, description, link, publish_time, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(guid) DO NOTHING
                "#,
            )
            .bind(id::entry_id())
            .bind(&entry.feed_id)
            .bind(&entry.guid)
            .bind(&entry.title)
            .bind(&entry.description)
            .bind(&entry.link)
            .bind(entry.publish_time)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }
}
