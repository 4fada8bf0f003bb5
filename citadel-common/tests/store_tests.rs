//! Store integration tests against an in-memory database.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;

use citadel_common::db::{init, Store};
use citadel_common::models::{NewFeedEntry, TimelineEntriesArgs, TimelineStatus, UpdateFeedArgs};
use citadel_common::{DbTime, Error};

async fn test_store() -> Result<Store> {
    // A single connection keeps every query on the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    init::apply_pragmas(&pool).await?;
    init::create_schema(&pool).await?;
    Ok(Store::new(pool))
}

fn entry(feed_id: &str, guid: &str) -> NewFeedEntry {
    NewFeedEntry {
        feed_id: feed_id.to_string(),
        guid: guid.to_string(),
        title: format!("title for {guid}"),
        description: format!("description for {guid}"),
        link: format!("https://example.com/{guid}"),
        publish_time: Some(DbTime::now()),
    }
}

#[tokio::test]
async fn insert_feed_assigns_tagged_id() -> Result<()> {
    let store = test_store().await?;

    let feed = store.insert_feed("https://example.com/rss").await?;
    assert!(feed.id.ends_with("-fd"));
    assert_eq!(feed.url, "https://example.com/rss");
    assert!(feed.title.is_none());
    assert!(feed.last_synced_at.is_none());

    Ok(())
}

#[tokio::test]
async fn insert_feed_conflicts_on_duplicate_url() -> Result<()> {
    let store = test_store().await?;

    store.insert_feed("https://example.com/rss").await?;
    let err = store.insert_feed("https://example.com/rss").await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn feed_lookup_miss_is_not_found() -> Result<()> {
    let store = test_store().await?;

    assert!(matches!(
        store.feed("nope").await.unwrap_err(),
        Error::NotFound(_)
    ));
    assert!(matches!(
        store.feed_by_url("https://nope.example").await.unwrap_err(),
        Error::NotFound(_)
    ));

    Ok(())
}

#[tokio::test]
async fn duplicate_guids_are_stored_once() -> Result<()> {
    let store = test_store().await?;
    let feed = store.insert_feed("https://example.com/rss").await?;

    // Overlapping batches: g2 repeats within and across calls.
    store
        .insert_entries(&[entry(&feed.id, "g1"), entry(&feed.id, "g2")])
        .await?;
    store
        .insert_entries(&[entry(&feed.id, "g2"), entry(&feed.id, "g3")])
        .await?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feed_entries WHERE guid = 'g2'")
        .fetch_one(store.pool())
        .await?;
    assert_eq!(count, 1);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feed_entries")
        .fetch_one(store.pool())
        .await?;
    assert_eq!(total, 3);

    Ok(())
}

#[tokio::test]
async fn insert_entries_is_idempotent() -> Result<()> {
    let store = test_store().await?;
    let feed = store.insert_feed("https://example.com/rss").await?;

    let batch = [entry(&feed.id, "g1"), entry(&feed.id, "g2")];
    store.insert_entries(&batch).await?;
    let first_ids = store_entry_ids(&store).await?;
    store.insert_entries(&batch).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feed_entries")
        .fetch_one(store.pool())
        .await?;
    assert_eq!(total, 2);
    assert_eq!(store_entry_ids(&store).await?, first_ids);

    Ok(())
}

#[tokio::test]
async fn update_feed_leaves_absent_fields_alone() -> Result<()> {
    let store = test_store().await?;
    let feed = store.insert_feed("https://example.com/rss").await?;

    store
        .update_feed(
            &feed.id,
            UpdateFeedArgs {
                title: Some("A Blog".to_string()),
                description: Some("About things".to_string()),
                last_synced: Some(DbTime::now()),
            },
        )
        .await?;

    store
        .update_feed(
            &feed.id,
            UpdateFeedArgs {
                title: None,
                description: Some("Updated".to_string()),
                last_synced: None,
            },
        )
        .await?;

    let feed = store.feed(&feed.id).await?;
    assert_eq!(feed.title.as_deref(), Some("A Blog"));
    assert_eq!(feed.description.as_deref(), Some("Updated"));
    assert!(feed.last_synced_at.is_some());

    Ok(())
}

#[tokio::test]
async fn feed_ids_paginate() -> Result<()> {
    let store = test_store().await?;
    for i in 0..5 {
        store.insert_feed(&format!("https://example.com/{i}")).await?;
    }

    assert_eq!(store.count_all_feeds().await?, 5);
    let first = store.feed_ids(0, 2).await?;
    let second = store.feed_ids(2, 2).await?;
    let third = store.feed_ids(4, 2).await?;
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    assert_eq!(third.len(), 1);
    assert!(first.iter().all(|id| !second.contains(id)));

    Ok(())
}

#[tokio::test]
async fn delete_feed_cascades_to_entries() -> Result<()> {
    let store = test_store().await?;
    let feed = store.insert_feed("https://example.com/rss").await?;
    store
        .insert_entries(&[entry(&feed.id, "g1"), entry(&feed.id, "g2")])
        .await?;

    store.delete_feed(&feed.id).await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feed_entries")
        .fetch_one(store.pool())
        .await?;
    assert_eq!(total, 0);

    Ok(())
}

#[tokio::test]
async fn subscriptions_are_unique_per_pair() -> Result<()> {
    let store = test_store().await?;
    let user = store.ensure_user("gh-1", "one@example.com").await?;
    let feed = store.insert_feed("https://example.com/rss").await?;

    store.create_subscription(&user.id, &feed.id).await?;
    store.create_subscription(&user.id, &feed.id).await?;
    store.create_subscription(&user.id, &feed.id).await?;

    let subs = store.user_subscriptions(&user.id).await?;
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].feed_id, feed.id);

    Ok(())
}

#[tokio::test]
async fn missing_entries_is_the_per_user_anti_join() -> Result<()> {
    let store = test_store().await?;
    let alice = store.ensure_user("gh-alice", "alice@example.com").await?;
    let bob = store.ensure_user("gh-bob", "bob@example.com").await?;
    let feed = store.insert_feed("https://example.com/rss").await?;
    store
        .insert_entries(&[entry(&feed.id, "g1"), entry(&feed.id, "g2")])
        .await?;
    store.create_subscription(&alice.id, &feed.id).await?;
    store.create_subscription(&bob.id, &feed.id).await?;

    // Alice already has g1 materialized; bob has nothing.
    let entries = store.entries(&store_entry_ids(&store).await?).await?;
    let g1 = entries.iter().find(|e| e.guid == "g1").unwrap();
    store
        .insert_timeline_entry(&alice.id, &feed.id, &g1.id)
        .await?;

    let missing = store.missing_entries(None).await?;
    assert_eq!(missing.len(), 3);
    assert!(missing
        .iter()
        .any(|m| m.user_id == alice.id && m.feed_entry_id != g1.id));
    assert_eq!(missing.iter().filter(|m| m.user_id == bob.id).count(), 2);

    let missing_bob = store.missing_entries(Some(&bob.id)).await?;
    assert_eq!(missing_bob.len(), 2);

    Ok(())
}

#[tokio::test]
async fn timeline_insert_ignores_duplicates() -> Result<()> {
    let store = test_store().await?;
    let user = store.ensure_user("gh-1", "one@example.com").await?;
    let feed = store.insert_feed("https://example.com/rss").await?;
    store.insert_entries(&[entry(&feed.id, "g1")]).await?;
    let ids = store_entry_ids(&store).await?;

    assert!(store.insert_timeline_entry(&user.id, &feed.id, &ids[0]).await?);
    assert!(!store.insert_timeline_entry(&user.id, &feed.id, &ids[0]).await?);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM timeline_entries")
        .fetch_one(store.pool())
        .await?;
    assert_eq!(total, 1);

    Ok(())
}

#[tokio::test]
async fn terminal_statuses_are_absorbing() -> Result<()> {
    let store = test_store().await?;
    let user = store.ensure_user("gh-1", "one@example.com").await?;
    let feed = store.insert_feed("https://example.com/rss").await?;
    store.insert_entries(&[entry(&feed.id, "g1")]).await?;
    let ids = store_entry_ids(&store).await?;
    store.insert_timeline_entry(&user.id, &feed.id, &ids[0]).await?;

    let pending = store.entries_needing_judgement(None, 10).await?;
    assert_eq!(pending.len(), 1);
    let entry_id = pending[0].id.clone();

    store
        .update_timeline_entry(&entry_id, TimelineStatus::Approved)
        .await?;
    // A replayed judgement must not flip the entry.
    store
        .update_timeline_entry(&entry_id, TimelineStatus::Rejected)
        .await?;

    let args = TimelineEntriesArgs {
        status: Some(TimelineStatus::Approved),
        feed_id: None,
        limit: 10,
        offset: 0,
    };
    assert_eq!(store.count_timeline_entries(&args).await?, 1);
    assert!(store.entries_needing_judgement(None, 10).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn timeline_entries_filter_by_status_and_feed() -> Result<()> {
    let store = test_store().await?;
    let user = store.ensure_user("gh-1", "one@example.com").await?;
    let feed_a = store.insert_feed("https://a.example.com/rss").await?;
    let feed_b = store.insert_feed("https://b.example.com/rss").await?;
    store
        .insert_entries(&[entry(&feed_a.id, "a1"), entry(&feed_b.id, "b1")])
        .await?;

    for fe in store.entries(&store_entry_ids(&store).await?).await? {
        store
            .insert_timeline_entry(&user.id, &fe.feed_id, &fe.id)
            .await?;
    }
    let pending = store.entries_needing_judgement(None, 10).await?;
    store
        .update_timeline_entry(&pending[0].id, TimelineStatus::Approved)
        .await?;

    let approved = store
        .timeline_entries(&TimelineEntriesArgs {
            status: Some(TimelineStatus::Approved),
            feed_id: None,
            limit: 10,
            offset: 0,
        })
        .await?;
    assert_eq!(approved.len(), 1);

    let by_feed = store
        .timeline_entries(&TimelineEntriesArgs {
            status: None,
            feed_id: Some(feed_a.id.clone()),
            limit: 10,
            offset: 0,
        })
        .await?;
    assert_eq!(by_feed.len(), 1);
    assert_eq!(by_feed[0].feed_id, feed_a.id);

    Ok(())
}

#[tokio::test]
async fn set_prompt_keeps_one_active_row() -> Result<()> {
    let store = test_store().await?;

    assert!(store.active_prompt().await?.is_none());

    let first = store.set_prompt("only rust posts").await?;
    assert!(first.active);
    assert!(first.id.ends_with("-prompt"));

    let second = store.set_prompt("only go posts").await?;
    let active_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM prompts WHERE active = 1")
        .fetch_one(store.pool())
        .await?;
    assert_eq!(active_count, 1);

    let active = store.active_prompt().await?.unwrap();
    assert_eq!(active.id, second.id);
    assert_eq!(active.content, "only go posts");

    Ok(())
}

#[tokio::test]
async fn ensure_user_converges_on_one_row() -> Result<()> {
    let store = test_store().await?;

    let first = store.ensure_user("gh-7", "seven@example.com").await?;
    let second = store.ensure_user("gh-7", "seven@example.com").await?;
    assert_eq!(first.id, second.id);
    assert!(first.id.ends_with("-usr"));

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(store.pool())
        .await?;
    assert_eq!(total, 1);

    Ok(())
}

#[tokio::test]
async fn connect_creates_database_file() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("citadel.db");

    let pool = init::connect(path.to_str().unwrap()).await?;
    let store = Store::new(pool);
    store.insert_feed("https://example.com/rss").await?;

    assert!(path.exists());
    assert_eq!(store.count_all_feeds().await?, 1);

    Ok(())
}

async fn store_entry_ids(store: &Store) -> Result<Vec<String>> {
    Ok(sqlx::query_scalar("SELECT id FROM feed_entries ORDER BY guid")
        .fetch_all(store.pool())
        .await?)
}
