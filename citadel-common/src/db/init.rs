//! Database initialization
//!
//! Opens the pool, applies the connection pragmas, and creates the schema
//! idempotently so a fresh database file is usable on first run.

use sqlx::SqlitePool;
use tracing::info;

use crate::Result;

/// Open (creating if needed) the database at `path` and ensure the schema.
pub async fn connect(path: &str) -> Result<SqlitePool> {
    let db_url = format!("sqlite://{path}?mode=rwc");
    let pool = SqlitePool::connect(&db_url).await?;

    apply_pragmas(&pool).await?;
    create_schema(&pool).await?;

    info!(database = path, "database ready");
    Ok(pool)
}

/// Connection pragmas: enforced foreign keys, a 5 second busy timeout for the
/// single-writer discipline, and WAL journaling.
pub async fn apply_pragmas(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(pool)
        .await?;
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;
    Ok(())
}

/// Create all tables and indexes if they do not exist.
///
/// Timestamps are TEXT columns holding RFC3339; writers always supply them
/// explicitly so the format stays uniform.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_feeds_table(pool).await?;
    create_feed_entries_table(pool).await?;
    create_users_table(pool).await?;
    create_subscriptions_table(pool).await?;
    create_timeline_entries_table(pool).await?;
    create_prompts_table(pool).await?;
    Ok(())
}

async fn create_feeds_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feeds (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL UNIQUE,
            title TEXT,
            description TEXT,
            last_synced_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_feed_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feed_entries (
            id TEXT PRIMARY KEY,
            feed_id TEXT NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
            guid TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            link TEXT NOT NULL,
            publish_time TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_feed_entries_feed_id ON feed_entries(feed_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            github_id TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_subscriptions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            feed_id TEXT NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            UNIQUE(user_id, feed_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_subscriptions_feed_id ON subscriptions(feed_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_timeline_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS timeline_entries (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            feed_id TEXT NOT NULL,
            feed_entry_id TEXT NOT NULL REFERENCES feed_entries(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'requires_judgement'
                CHECK (status IN ('requires_judgement', 'approved', 'rejected')),
            created_at TEXT NOT NULL,
            UNIQUE(user_id, feed_entry_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_timeline_entries_status ON timeline_entries(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_timeline_entries_user_id ON timeline_entries(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_prompts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prompts (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_prompts_active ON prompts(active)")
        .execute(pool)
        .await?;

    Ok(())
}
